use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::naming::DownloadInfo;
use super::sinks::Downloader;
use crate::blob::{Blob, ObjectUrl};
use crate::error::{RecordError, RecordResult};
use crate::handoff::HandoffRecord;

/// The result-viewing context
///
/// Previews a finished recording and saves it on request. The object URL
/// it plays from is revoked when the viewer is closed or dropped.
pub struct ViewerSession {
    record: HandoffRecord,
    url: ObjectUrl,
    blob: Blob,
    info: DownloadInfo,
    downloader: Arc<dyn Downloader>,
    extension: String,
}

impl ViewerSession {
    pub(super) fn new(
        record: HandoffRecord,
        url: ObjectUrl,
        blob: Blob,
        info: DownloadInfo,
        downloader: Arc<dyn Downloader>,
        extension: String,
    ) -> Self {
        Self {
            record,
            url,
            blob,
            info,
            downloader,
            extension,
        }
    }

    pub fn info(&self) -> &DownloadInfo {
        &self.info
    }

    pub fn record(&self) -> &HandoffRecord {
        &self.record
    }

    pub fn blob(&self) -> &Blob {
        &self.blob
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn file_name(&self) -> String {
        self.info.file_name_with_extension(&self.extension)
    }

    /// Save the previewed recording
    pub async fn download(&self) -> RecordResult<PathBuf> {
        self.downloader
            .download(&self.blob, &self.file_name())
            .await
            .map_err(|e| RecordError::Delivery(format!("{:#}", e)))
    }

    pub fn close(self) {
        info!("Closing viewer for {}", self.info.file_name);
    }
}

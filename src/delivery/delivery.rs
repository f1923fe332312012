use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::naming::DownloadInfo;
use super::sinks::{Downloader, ViewerLauncher, ViewerRequest};
use super::viewer::ViewerSession;
use crate::blob::{Blob, BlobRegistry, ObjectUrl};
use crate::capture::encoder::container_extension;
use crate::capture::EncoderOptions;
use crate::duration::{
    fallback_duration, ContainerMediaLoader, DurationResolver, MediaLoader,
    CORRECTION_EPSILON_SECONDS,
};
use crate::error::{RecordError, RecordResult};
use crate::handoff::{BlobReference, HandoffRecord};

/// How a finished recording reaches the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Download right away
    Immediate,
    /// Open the viewer and let the user save from there
    Viewer,
}

impl DeliveryMode {
    /// The "fast record" preference selects immediate download
    pub fn from_fast_rec(fast_rec: bool) -> Self {
        if fast_rec {
            Self::Immediate
        } else {
            Self::Viewer
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    Downloaded { info: DownloadInfo, path: PathBuf },
    ViewerOpened,
    /// The recording produced no data
    Empty,
}

/// Delivers finished recordings
pub struct ResultDelivery {
    mode: DeliveryMode,
    blobs: Arc<dyn BlobRegistry>,
    downloader: Arc<dyn Downloader>,
    viewer: Arc<dyn ViewerLauncher>,
    media: Arc<dyn MediaLoader>,
    resolver: DurationResolver,
    mime_type: String,
}

impl ResultDelivery {
    pub fn new(
        mode: DeliveryMode,
        blobs: Arc<dyn BlobRegistry>,
        downloader: Arc<dyn Downloader>,
        viewer: Arc<dyn ViewerLauncher>,
    ) -> Self {
        Self {
            mode,
            blobs,
            downloader,
            viewer,
            media: Arc::new(ContainerMediaLoader),
            resolver: DurationResolver::default(),
            mime_type: EncoderOptions::default().mime_type,
        }
    }

    pub fn with_media_loader(mut self, media: Arc<dyn MediaLoader>) -> Self {
        self.media = media;
        self
    }

    pub fn with_resolver(mut self, resolver: DurationResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// Deliver a finalized record
    ///
    /// Any object URL taken for the download is revoked before returning,
    /// on success and on failure.
    pub async fn deliver(&self, session_id: &str, record: &HandoffRecord) -> RecordResult<DeliveryOutcome> {
        if record.blob.is_empty() {
            warn!("Recording {} has no data, nothing to deliver", session_id);
            return Ok(DeliveryOutcome::Empty);
        }

        match self.mode {
            DeliveryMode::Viewer => {
                self.viewer
                    .open(ViewerRequest {
                        session_id: session_id.to_string(),
                    })
                    .map_err(|e| RecordError::Delivery(format!("{:#}", e)))?;
                Ok(DeliveryOutcome::ViewerOpened)
            }
            DeliveryMode::Immediate => {
                let url = self.object_url(record);
                let blob = url.fetch().ok_or(RecordError::NotFound)?;
                let info = self.describe(&blob, record).await;

                let file_name = info.file_name_with_extension(self.extension());
                let path = self
                    .downloader
                    .download(&blob, &file_name)
                    .await
                    .map_err(|e| RecordError::Delivery(format!("{:#}", e)))?;

                drop(url);
                info!("Delivered {} ({:.2}s)", file_name, info.length);

                Ok(DeliveryOutcome::Downloaded { info, path })
            }
        }
    }

    /// Open the viewer context for a record
    ///
    /// The viewer resolves the duration itself and owns its object URL
    /// until it is closed.
    pub async fn open_viewer(&self, record: HandoffRecord) -> RecordResult<ViewerSession> {
        let url = self.object_url(&record);
        let blob = url.fetch().ok_or(RecordError::NotFound)?;
        let info = self.describe(&blob, &record).await;

        info!("Viewer ready: {} ({:.2}s)", info.file_name, info.length);

        Ok(ViewerSession::new(
            record,
            url,
            blob,
            info,
            Arc::clone(&self.downloader),
            self.extension().to_string(),
        ))
    }

    /// Resolve the clip length and name it
    async fn describe(&self, blob: &Blob, record: &HandoffRecord) -> DownloadInfo {
        let length = match self.media.load(blob) {
            Ok(mut media) => {
                self.resolver
                    .resolve_or_placeholder(media.as_mut(), record)
                    .await
            }
            Err(e) => {
                warn!("Result media unreadable ({}), using wall-clock length", e);
                fallback_duration(record, CORRECTION_EPSILON_SECONDS).unwrap_or(0.0)
            }
        };

        DownloadInfo::new(record.stream_info.clone(), length)
    }

    /// A URL for the record's data in this context
    fn object_url(&self, record: &HandoffRecord) -> ObjectUrl {
        match &record.blob {
            BlobReference::Url(url) => ObjectUrl::adopt(Arc::clone(&self.blobs), url.clone()),
            BlobReference::Bytes(bytes) => ObjectUrl::create(
                Arc::clone(&self.blobs),
                Blob::new(bytes.clone(), self.mime_type.clone()),
            ),
        }
    }

    fn extension(&self) -> &str {
        container_extension(&self.mime_type)
    }
}

use serde::{Deserialize, Serialize};

use crate::session::StreamInfo;

/// What the user is offered to save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadInfo {
    pub stream_info: StreamInfo,
    /// Resolved clip length in seconds
    pub length: f64,
    /// Artifact name without extension
    pub file_name: String,
}

impl DownloadInfo {
    pub fn new(stream_info: StreamInfo, length: f64) -> Self {
        let file_name = file_name(&stream_info, length);
        Self {
            stream_info,
            length,
            file_name,
        }
    }

    pub fn file_name_with_extension(&self, extension: &str) -> String {
        format!("{}.{}", self.file_name, extension)
    }
}

/// `{streamerName}_{duration:.2}s`
pub fn file_name(stream_info: &StreamInfo, duration_seconds: f64) -> String {
    format!("{}_{:.2}s", stream_info.streamer_name, duration_seconds)
}

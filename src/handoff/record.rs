use serde::{Deserialize, Serialize};

use crate::session::StreamInfo;

/// Where the encoded result lives
#[derive(Debug, Clone, PartialEq)]
pub enum BlobReference {
    /// Object URL valid inside the producing context; empty until data exists
    Url(String),
    /// Raw encoded bytes, usable in any context
    Bytes(Vec<u8>),
}

impl BlobReference {
    pub fn empty() -> Self {
        Self::Url(String::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Url(url) => url.is_empty(),
            Self::Bytes(bytes) => bytes.is_empty(),
        }
    }
}

/// The cross-context payload of one recording
#[derive(Debug, Clone, PartialEq)]
pub struct HandoffRecord {
    pub blob: BlobReference,
    pub stream_info: StreamInfo,
    /// Epoch ms
    pub start_timestamp: i64,
    /// Epoch ms, absent while recording
    pub stop_timestamp: Option<i64>,
}

impl HandoffRecord {
    /// In-progress record written at session start
    pub fn stub(stream_info: StreamInfo, start_timestamp: i64) -> Self {
        Self {
            blob: BlobReference::empty(),
            stream_info,
            start_timestamp,
            stop_timestamp: None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.stop_timestamp.is_some()
    }

    /// Wall-clock capture length in seconds
    pub fn elapsed_seconds(&self) -> Option<f64> {
        self.stop_timestamp
            .map(|stop| (stop - self.start_timestamp) as f64 / 1000.0)
    }

    /// Metadata half of the record, for the relay
    pub fn record_info(&self) -> Option<RecordInfo> {
        Some(RecordInfo {
            stream_info: self.stream_info.clone(),
            start_date_time: self.start_timestamp,
            stop_date_time: self.stop_timestamp?,
        })
    }

    pub fn from_parts(info: RecordInfo, bytes: Vec<u8>) -> Self {
        Self {
            blob: BlobReference::Bytes(bytes),
            stream_info: info.stream_info,
            start_timestamp: info.start_date_time,
            stop_timestamp: Some(info.stop_date_time),
        }
    }
}

/// Metadata of a finalized recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInfo {
    pub stream_info: StreamInfo,
    pub start_date_time: i64,
    pub stop_date_time: i64,
}

/// Shared-storage schema of the direct strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedHandoff {
    /// Object URL, or empty while no data exists
    pub recorder_blob: String,
    pub stream_info: StreamInfo,
    pub recorder_start_time: i64,
    #[serde(default)]
    pub recorder_stop_time: Option<i64>,
}

impl PersistedHandoff {
    pub const KEYS: [&'static str; 4] = [
        "recorderBlob",
        "streamInfo",
        "recorderStartTime",
        "recorderStopTime",
    ];
}

impl From<PersistedHandoff> for HandoffRecord {
    fn from(persisted: PersistedHandoff) -> Self {
        Self {
            blob: BlobReference::Url(persisted.recorder_blob),
            stream_info: persisted.stream_info,
            start_timestamp: persisted.recorder_start_time,
            stop_timestamp: persisted.recorder_stop_time,
        }
    }
}

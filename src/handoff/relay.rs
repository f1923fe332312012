use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::record::{BlobReference, HandoffRecord, RecordInfo};
use super::store::{HandoffStore, HandoffStrategy};
use super::transport::{new_relay_id, RelayTransport};
use crate::capture::EncodedChunk;
use crate::error::{RecordError, RecordResult};

/// Messages sent from the recording context to the viewer
///
/// Every message names the recording it belongs to, so a viewer never
/// pairs halves of two different recordings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayMessage {
    /// A new recording began; earlier halves are stale from here on
    #[serde(rename = "recordStart")]
    RecordStart {
        #[serde(rename = "recordingId")]
        recording_id: String,
    },
    #[serde(rename = "recordInfo")]
    RecordInfo {
        #[serde(rename = "recordingId")]
        recording_id: String,
        #[serde(rename = "recordInfo")]
        record_info: RecordInfo,
    },
    #[serde(rename = "recordBlob")]
    RecordBlob {
        #[serde(rename = "recordingId")]
        recording_id: String,
        #[serde(rename = "resultBlob", with = "base64_bytes")]
        result_blob: Vec<u8>,
    },
}

impl RelayMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RecordStart { .. } => "recordStart",
            Self::RecordInfo { .. } => "recordInfo",
            Self::RecordBlob { .. } => "recordBlob",
        }
    }

    pub fn recording_id(&self) -> &str {
        match self {
            Self::RecordStart { recording_id }
            | Self::RecordInfo { recording_id, .. }
            | Self::RecordBlob { recording_id, .. } => recording_id,
        }
    }
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

/// Viewer-side merge of the two relay messages
///
/// Each message fills its own slot, so applying them in either order gives
/// the same result. The merge follows one recording at a time: a
/// `recordStart` for another recording starts over, and halves of any other
/// recording are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingRecord {
    recording_id: Option<String>,
    info: Option<RecordInfo>,
    blob: Option<Vec<u8>>,
}

impl PendingRecord {
    pub fn apply(&mut self, message: RelayMessage) {
        if self.recording_id.as_deref() != Some(message.recording_id()) {
            if let Some(current) = &self.recording_id {
                if !matches!(message, RelayMessage::RecordStart { .. }) {
                    debug!(
                        "Dropping {} of {}, waiting on {}",
                        message.kind(),
                        message.recording_id(),
                        current
                    );
                    return;
                }
            }
            *self = Self {
                recording_id: Some(message.recording_id().to_string()),
                ..Self::default()
            };
        }

        match message {
            RelayMessage::RecordStart { .. } => {}
            RelayMessage::RecordInfo { record_info, .. } => self.info = Some(record_info),
            RelayMessage::RecordBlob { result_blob, .. } => self.blob = Some(result_blob),
        }
    }

    /// Recording this merge follows, once any message arrived
    pub fn recording_id(&self) -> Option<&str> {
        self.recording_id.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.info.is_some() && self.blob.is_some()
    }

    pub fn record(&self) -> Option<HandoffRecord> {
        match (&self.info, &self.blob) {
            (Some(info), Some(blob)) => Some(HandoffRecord::from_parts(info.clone(), blob.clone())),
            _ => None,
        }
    }
}

/// Relay strategy, producer side
///
/// Announces each recording with `recordStart`, keeps the record in memory
/// while recording and relays it as a `recordInfo` + `recordBlob` pair when
/// saved.
pub struct RelayStore {
    transport: Arc<dyn RelayTransport>,
    current: Mutex<Option<Relayed>>,
}

struct Relayed {
    recording_id: String,
    record: HandoffRecord,
}

impl RelayStore {
    pub fn new(transport: Arc<dyn RelayTransport>) -> Self {
        Self {
            transport,
            current: Mutex::new(None),
        }
    }

    pub async fn publish(&self, message: &RelayMessage) -> RecordResult<()> {
        self.transport.publish(message).await
    }

    pub async fn subscribe(&self) -> RecordResult<mpsc::Receiver<RelayMessage>> {
        self.transport.subscribe().await
    }

    /// Id of the recording being relayed, if one began
    pub fn recording_id(&self) -> Option<String> {
        self.current
            .lock()
            .ok()
            .and_then(|current| current.as_ref().map(|relayed| relayed.recording_id.clone()))
    }

    fn update<T>(&self, f: impl FnOnce(&mut Option<Relayed>) -> T) -> RecordResult<T> {
        let mut current = self
            .current
            .lock()
            .map_err(|_| RecordError::StorageWriteFailure("relay record lock poisoned".to_string()))?;
        Ok(f(&mut current))
    }
}

#[async_trait]
impl HandoffStore for RelayStore {
    fn strategy(&self) -> HandoffStrategy {
        HandoffStrategy::Relay
    }

    async fn begin(&self, stub: &HandoffRecord) -> RecordResult<()> {
        let recording_id = new_relay_id();
        info!(
            "Relay handoff {} started for {} via {}",
            recording_id,
            stub.stream_info.streamer_name,
            self.transport.name()
        );

        self.update(|current| {
            *current = Some(Relayed {
                recording_id: recording_id.clone(),
                record: stub.clone(),
            })
        })?;

        self.publish(&RelayMessage::RecordStart { recording_id }).await
    }

    async fn put_blob(&self, chunk: &EncodedChunk) -> RecordResult<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.update(|current| {
            if let Some(relayed) = current {
                relayed.record.blob = BlobReference::Bytes(chunk.data.clone());
            }
        })
    }

    async fn save(&self, record: &HandoffRecord) -> RecordResult<()> {
        let (recording_id, announced) = self.update(|current| {
            let (recording_id, announced) = match current.as_ref() {
                Some(relayed) => (relayed.recording_id.clone(), true),
                None => (new_relay_id(), false),
            };
            *current = Some(Relayed {
                recording_id: recording_id.clone(),
                record: record.clone(),
            });
            (recording_id, announced)
        })?;

        let record_info = record.record_info().ok_or_else(|| {
            RecordError::Relay("cannot relay a record that has not stopped".to_string())
        })?;

        let result_blob = match &record.blob {
            BlobReference::Bytes(bytes) => bytes.clone(),
            BlobReference::Url(url) if url.is_empty() => Vec::new(),
            BlobReference::Url(url) => {
                return Err(RecordError::Relay(format!(
                    "object URL {} cannot cross the context boundary",
                    url
                )))
            }
        };

        if !announced {
            self.publish(&RelayMessage::RecordStart {
                recording_id: recording_id.clone(),
            })
            .await?;
        }
        self.publish(&RelayMessage::RecordInfo {
            recording_id: recording_id.clone(),
            record_info,
        })
        .await?;
        self.publish(&RelayMessage::RecordBlob {
            recording_id: recording_id.clone(),
            result_blob,
        })
        .await?;

        info!(
            "Relayed record {} of {}",
            recording_id, record.stream_info.streamer_name
        );
        Ok(())
    }

    async fn load(&self) -> RecordResult<HandoffRecord> {
        self.current
            .lock()
            .ok()
            .and_then(|current| current.as_ref().map(|relayed| relayed.record.clone()))
            .ok_or(RecordError::NotFound)
    }
}

/// Relay strategy, viewer side
///
/// Subscribes to the relay and merges messages as they arrive. The viewer
/// may open before or after the producer published; it completes with the
/// latest recording announced on the relay.
pub struct RelayInbox {
    pending: watch::Receiver<PendingRecord>,
    task: JoinHandle<()>,
}

impl RelayInbox {
    pub async fn open(transport: &dyn RelayTransport) -> RecordResult<Self> {
        let mut messages = transport.subscribe().await?;
        let (tx, pending) = watch::channel(PendingRecord::default());

        let task = tokio::spawn(async move {
            while let Some(message) = messages.recv().await {
                info!("Viewer received {} of {}", message.kind(), message.recording_id());
                tx.send_modify(|pending| pending.apply(message));
            }
        });

        Ok(Self { pending, task })
    }

    /// Merged record if both halves arrived
    pub fn load(&self) -> RecordResult<HandoffRecord> {
        self.pending.borrow().record().ok_or(RecordError::NotFound)
    }

    /// Wait until both halves arrived
    pub async fn wait(&mut self) -> RecordResult<HandoffRecord> {
        loop {
            if let Some(record) = self.pending.borrow_and_update().record() {
                return Ok(record);
            }
            if self.pending.changed().await.is_err() {
                warn!("Relay closed before the record was complete");
                return Err(RecordError::NotFound);
            }
        }
    }
}

impl Drop for RelayInbox {
    fn drop(&mut self) {
        self.task.abort();
    }
}

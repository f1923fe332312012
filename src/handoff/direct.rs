use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::record::{BlobReference, HandoffRecord, PersistedHandoff};
use super::storage::SharedStorage;
use super::store::{HandoffStore, HandoffStrategy};
use crate::blob::{Blob, BlobRegistry};
use crate::capture::EncodedChunk;
use crate::error::{RecordError, RecordResult};

/// Direct-reference strategy
///
/// The blob is registered as an object URL in the producing context and
/// the URL string is written to shared storage next to the metadata.
pub struct DirectStore {
    storage: Arc<dyn SharedStorage>,
    blobs: Arc<dyn BlobRegistry>,
    /// URL currently referenced by `recorderBlob`
    current_url: Mutex<Option<String>>,
}

impl DirectStore {
    pub fn new(storage: Arc<dyn SharedStorage>, blobs: Arc<dyn BlobRegistry>) -> Self {
        Self {
            storage,
            blobs,
            current_url: Mutex::new(None),
        }
    }

    async fn write(&self, items: Map<String, Value>) -> RecordResult<()> {
        self.storage
            .set(items)
            .await
            .map_err(|e| RecordError::StorageWriteFailure(e.to_string()))
    }

    /// Point `recorderBlob` at a new URL, revoking the one it replaces
    async fn replace_blob_url(&self, url: String) -> RecordResult<()> {
        if let Err(e) = self.write(object([("recorderBlob", json!(url))])).await {
            self.blobs.revoke(&url);
            return Err(e);
        }

        let previous = self
            .current_url
            .lock()
            .ok()
            .and_then(|mut current| current.replace(url));

        if let Some(previous) = previous {
            self.blobs.revoke(&previous);
        }
        Ok(())
    }
}

#[async_trait]
impl HandoffStore for DirectStore {
    fn strategy(&self) -> HandoffStrategy {
        HandoffStrategy::Direct
    }

    async fn begin(&self, stub: &HandoffRecord) -> RecordResult<()> {
        info!(
            "Handoff started for {} at {}",
            stub.stream_info.streamer_name, stub.start_timestamp
        );

        self.write(object([
            ("recorderBlob", json!("")),
            ("streamInfo", serde_json::to_value(&stub.stream_info)?),
            ("recorderStartTime", json!(stub.start_timestamp)),
            ("recorderStopTime", Value::Null),
        ]))
        .await
    }

    async fn put_blob(&self, chunk: &EncodedChunk) -> RecordResult<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        let url = self
            .blobs
            .create(Blob::new(chunk.data.clone(), chunk.mime_type.clone()));
        debug!("Latest chunk stored at {} ({} bytes)", url, chunk.data.len());

        self.replace_blob_url(url).await
    }

    async fn save(&self, record: &HandoffRecord) -> RecordResult<()> {
        let blob_url = match &record.blob {
            BlobReference::Url(url) => url.clone(),
            BlobReference::Bytes(bytes) if bytes.is_empty() => String::new(),
            BlobReference::Bytes(bytes) => {
                let url = self.blobs.create(Blob::new(bytes.clone(), "video/webm"));
                self.replace_blob_url(url.clone()).await?;
                url
            }
        };

        let persisted = PersistedHandoff {
            recorder_blob: blob_url,
            stream_info: record.stream_info.clone(),
            recorder_start_time: record.start_timestamp,
            recorder_stop_time: record.stop_timestamp,
        };

        match serde_json::to_value(&persisted)? {
            Value::Object(items) => self.write(items).await,
            _ => Err(RecordError::StorageWriteFailure(
                "handoff did not serialize to an object".to_string(),
            )),
        }
    }

    async fn load(&self) -> RecordResult<HandoffRecord> {
        let mut items = self.storage.get(&PersistedHandoff::KEYS).await?;

        if !items.contains_key("recorderStartTime") {
            return Err(RecordError::NotFound);
        }

        // An empty area slot reads back as null
        if items.get("recorderBlob").map_or(true, Value::is_null) {
            items.insert("recorderBlob".to_string(), json!(""));
        }

        let persisted: PersistedHandoff = serde_json::from_value(Value::Object(items))
            .map_err(|e| {
                warn!("Stored handoff is malformed: {}", e);
                RecordError::NotFound
            })?;

        Ok(persisted.into())
    }
}

fn object<const N: usize>(entries: [(&str, Value); N]) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

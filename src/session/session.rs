use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::{RecordingSlot, SessionEnv};
use super::state::{SessionState, StopReason, StreamInfo};
use crate::capture::{EncodedChunk, Encoder, VideoSource};
use crate::error::{RecordError, RecordResult};
use crate::handoff::{BlobReference, HandoffRecord, HandoffStore};

/// Volume a muted source is raised to so the capture carries audio
pub const UNMUTED_VOLUME: f64 = 0.5;

/// Upper bound on stopping the encoder and waiting for its final chunk
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to a running or finished session
pub type SessionHandle = Arc<RecordingSession>;

/// Result of a stop request
#[derive(Debug, Clone)]
pub struct StopOutcome {
    pub record: HandoffRecord,
    /// Reason of the stop that did the work
    pub reason: StopReason,
    /// True if an earlier stop already finished the session
    pub already_stopped: bool,
}

/// One capture lifecycle: start, encode, stop, hand off
pub struct RecordingSession {
    id: String,
    stream_info: StreamInfo,
    start_timestamp: i64,
    store: Arc<dyn HandoffStore>,
    slot: RecordingSlot,

    /// Parent of every listener registered for this session
    listeners: CancellationToken,

    state: watch::Sender<SessionState>,

    inner: Mutex<SessionInner>,
}

struct SessionInner {
    encoder: Option<Box<dyn Encoder>>,

    /// Forwards encoded chunks to the store, yields the latest one
    pump: Option<JoinHandle<Option<EncodedChunk>>>,

    /// Set by the first stop
    finished: Option<(HandoffRecord, StopReason)>,
}

impl RecordingSession {
    /// Start recording `source`
    ///
    /// Rejected with `AlreadyRecording` before any side effect if another
    /// session of the page is recording.
    ///
    /// A muted or silent source is unmuted and set to `UNMUTED_VOLUME` so
    /// the captured stream carries audio. This change is persistent: the
    /// source's previous audio state is not restored when the recording
    /// stops, since some platforms only capture audio from an audible
    /// element.
    pub async fn start(
        source: &dyn VideoSource,
        stream_info: StreamInfo,
        env: &SessionEnv,
    ) -> RecordResult<SessionHandle> {
        let id = format!("rec-{}", uuid::Uuid::new_v4());
        env.slot.claim(&id)?;

        match Self::open(id.clone(), source, stream_info, env).await {
            Ok(session) => Ok(session),
            Err(e) => {
                warn!("Recording {} failed to start: {}", id, e);
                env.slot.release(&id);
                Err(e)
            }
        }
    }

    async fn open(
        id: String,
        source: &dyn VideoSource,
        stream_info: StreamInfo,
        env: &SessionEnv,
    ) -> RecordResult<SessionHandle> {
        info!(
            "Starting recording {}: {} - {} ({})",
            id,
            stream_info.streamer_name,
            stream_info.stream_title,
            source.name()
        );

        ensure_audible(source);

        let stream = source
            .capture_stream()
            .map_err(|e| RecordError::EncoderUnavailable(format!("capture failed: {:#}", e)))?;

        let mut encoder = env
            .encoders
            .create(stream, &env.config.encoder)
            .map_err(|e| RecordError::EncoderUnavailable(format!("{:#}", e)))?;

        let start_timestamp = Utc::now().timestamp_millis();
        let stub = HandoffRecord::stub(stream_info.clone(), start_timestamp);
        if let Err(e) = env.store.begin(&stub).await {
            error!("Failed to persist handoff stub: {}", e);
        }

        let mut chunks = encoder
            .start()
            .await
            .map_err(|e| RecordError::EncoderUnavailable(format!("{:#}", e)))?;

        let store = Arc::clone(&env.store);
        let pump = tokio::spawn(async move {
            let mut latest: Option<EncodedChunk> = None;

            while let Some(chunk) = chunks.recv().await {
                if chunk.is_empty() {
                    continue;
                }
                if let Err(e) = store.put_blob(&chunk).await {
                    warn!("Failed to store encoded chunk: {}", e);
                }
                latest = Some(chunk);
            }

            latest
        });

        let (state, _) = watch::channel(SessionState::Recording);

        info!(
            "Recording {} started with {} encoder ({:?} handoff)",
            id,
            encoder.name(),
            env.store.strategy()
        );

        Ok(Arc::new(Self {
            id,
            stream_info,
            start_timestamp,
            store: Arc::clone(&env.store),
            slot: env.slot.clone(),
            listeners: CancellationToken::new(),
            state,
            inner: Mutex::new(SessionInner {
                encoder: Some(encoder),
                pump: Some(pump),
                finished: None,
            }),
        }))
    }

    /// Stop recording and finalize the handoff record
    ///
    /// Idempotent: only the first call does any work, later calls return
    /// the same record. Cleanup runs even when flushing or persisting fails.
    pub async fn stop(&self, reason: StopReason) -> StopOutcome {
        let mut inner = self.inner.lock().await;

        if let Some((record, first_reason)) = &inner.finished {
            debug!("Recording {} already stopped ({:?})", self.id, first_reason);
            return StopOutcome {
                record: record.clone(),
                reason: *first_reason,
                already_stopped: true,
            };
        }

        info!("Stopping recording {} ({:?})", self.id, reason);

        // Detach listeners first so no trigger races the shutdown
        self.listeners.cancel();

        // One deadline covers both the encoder stop and the final flush
        let deadline = tokio::time::Instant::now() + FLUSH_TIMEOUT;

        if let Some(mut encoder) = inner.encoder.take() {
            let name = encoder.name().to_string();
            let stopped = tokio::time::timeout_at(deadline, encoder.stop()).await;
            match stopped {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Failed to stop {} encoder: {:#}", name, e),
                Err(_) => warn!("{} encoder did not stop within {:?}", name, FLUSH_TIMEOUT),
            }
        }

        let latest = match inner.pump.take() {
            Some(pump) => {
                let abort = pump.abort_handle();
                match tokio::time::timeout_at(deadline, pump).await {
                    Ok(Ok(latest)) => latest,
                    Ok(Err(e)) => {
                        error!("Chunk pump panicked: {}", e);
                        None
                    }
                    Err(_) => {
                        warn!("Encoder did not flush within {:?}", FLUSH_TIMEOUT);
                        abort.abort();
                        None
                    }
                }
            }
            None => None,
        };

        let stop_timestamp = Utc::now()
            .timestamp_millis()
            .max(self.start_timestamp + 1);

        let blob = match self.store.load().await {
            Ok(stored) if !stored.blob.is_empty() => stored.blob,
            stored => {
                if let Err(e) = stored {
                    warn!("Handoff unreadable, using in-memory data: {}", e);
                }
                latest
                    .map(|chunk| BlobReference::Bytes(chunk.data))
                    .unwrap_or_else(BlobReference::empty)
            }
        };

        let record = HandoffRecord {
            blob,
            stream_info: self.stream_info.clone(),
            start_timestamp: self.start_timestamp,
            stop_timestamp: Some(stop_timestamp),
        };

        if let Err(e) = self.store.save(&record).await {
            error!("Failed to finalize handoff: {}", e);
        }

        inner.finished = Some((record.clone(), reason));
        self.state.send_replace(SessionState::Stopped);
        self.slot.release(&self.id);

        info!(
            "Recording {} stopped after {:.1}s",
            self.id,
            record.elapsed_seconds().unwrap_or_default()
        );

        StopOutcome {
            record,
            reason,
            already_stopped: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stream_info(&self) -> &StreamInfo {
        &self.stream_info
    }

    pub fn start_timestamp(&self) -> i64 {
        self.start_timestamp
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_recording(&self) -> bool {
        self.state() == SessionState::Recording
    }

    /// Token for a listener owned by this session, cancelled on stop
    pub fn listener_token(&self) -> CancellationToken {
        self.listeners.child_token()
    }

    /// Wait until the session has stopped
    pub async fn stopped(&self) {
        let mut state = self.state.subscribe();
        while *state.borrow_and_update() != SessionState::Stopped {
            if state.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.listeners.cancel();
        self.slot.release(&self.id);
    }
}

fn ensure_audible(source: &dyn VideoSource) {
    if source.is_muted() || source.volume() == 0.0 {
        info!(
            "Unmuting {} (muted={}, volume={}) for audio capture",
            source.name(),
            source.is_muted(),
            source.volume()
        );
        source.set_muted(false);
        source.set_volume(UNMUTED_VOLUME);
    }
}

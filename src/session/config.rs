use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

use crate::capture::{EncoderFactory, EncoderOptions};
use crate::error::{RecordError, RecordResult};
use crate::handoff::HandoffStore;

/// Configuration for recording sessions
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Fixed container, codec and bitrate
    pub encoder: EncoderOptions,

    /// How often the page location is compared against the recorded one
    /// Default: 1 second
    pub navigation_poll: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderOptions::default(),
            navigation_poll: Duration::from_secs(1),
        }
    }
}

/// The one-recording-per-page guard
///
/// Holds the id of the session currently recording, if any.
#[derive(Debug, Clone, Default)]
pub struct RecordingSlot {
    active: Arc<Mutex<Option<String>>>,
}

impl RecordingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `session_id`, failing if another session holds it
    pub fn claim(&self, session_id: &str) -> RecordResult<()> {
        let mut active = self.active.lock().map_err(|_| RecordError::AlreadyRecording)?;
        match active.as_deref() {
            Some(current) => {
                warn!("Recording {} already active, rejecting {}", current, session_id);
                Err(RecordError::AlreadyRecording)
            }
            None => {
                *active = Some(session_id.to_string());
                Ok(())
            }
        }
    }

    /// Free the slot if `session_id` holds it
    pub fn release(&self, session_id: &str) {
        if let Ok(mut active) = self.active.lock() {
            if active.as_deref() == Some(session_id) {
                *active = None;
            }
        }
    }

    pub fn active(&self) -> Option<String> {
        self.active.lock().ok().and_then(|active| active.clone())
    }
}

/// Everything a session needs from its page
#[derive(Clone)]
pub struct SessionEnv {
    pub config: SessionConfig,
    pub encoders: Arc<dyn EncoderFactory>,
    pub store: Arc<dyn HandoffStore>,
    pub slot: RecordingSlot,
}

impl SessionEnv {
    pub fn new(
        config: SessionConfig,
        encoders: Arc<dyn EncoderFactory>,
        store: Arc<dyn HandoffStore>,
    ) -> Self {
        Self {
            config,
            encoders,
            store,
            slot: RecordingSlot::new(),
        }
    }
}

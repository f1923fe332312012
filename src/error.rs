//! Error taxonomy for the recording pipeline
//!
//! Start failures (`NoVideoElement`, `EncoderUnavailable`, `AlreadyRecording`)
//! abort the start and leave the control idle. Everything raised during stop
//! or delivery is logged and never blocks cleanup.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("No capturable video element on the page")]
    NoVideoElement,

    #[error("Encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("Handoff storage write failed: {0}")]
    StorageWriteFailure(String),

    #[error("Handoff record not found")]
    NotFound,

    #[error("Relay error: {0}")]
    Relay(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Could not resolve a finite clip duration")]
    DurationUnresolvable,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using RecordError
pub type RecordResult<T> = Result<T, RecordError>;

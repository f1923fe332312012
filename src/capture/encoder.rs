use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

use super::source::MediaStream;

/// Encoded data emitted by an encoder
///
/// Every chunk is a self-contained snapshot of everything encoded so far,
/// so the latest chunk alone is a playable result.
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    pub data: Vec<u8>,
    pub mime_type: String,
    /// Emission time (epoch ms)
    pub timestamp_ms: i64,
}

impl EncodedChunk {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Fixed encoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderOptions {
    /// Target container and codec
    pub mime_type: String,
    pub video_bits_per_second: u32,
    /// Emit intermediate chunks at this interval; `None` emits only on stop
    pub timeslice: Option<Duration>,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            mime_type: "video/webm;codecs=avc1".to_string(),
            video_bits_per_second: 7_000_000,
            timeslice: None,
        }
    }
}

impl EncoderOptions {
    /// Container subtype of the mime type, used as file extension
    pub fn extension(&self) -> &str {
        container_extension(&self.mime_type)
    }
}

/// `"video/webm;codecs=avc1"` -> `"webm"`
pub fn container_extension(mime_type: &str) -> &str {
    mime_type
        .split(';')
        .next()
        .and_then(|essence| essence.split('/').nth(1))
        .map(str::trim)
        .filter(|subtype| !subtype.is_empty())
        .unwrap_or("webm")
}

/// Platform encoder driving stream-to-container encoding
///
/// Implementations:
/// - Browser: MediaRecorder behind wasm bindings
/// - File: passthrough of an already encoded file (CLI, testing)
#[async_trait::async_trait]
pub trait Encoder: Send + Sync {
    /// Start encoding
    ///
    /// Returns a channel receiver that will receive encoded chunks. The
    /// channel closes after `stop` has flushed the final chunk.
    async fn start(&mut self) -> Result<mpsc::Receiver<EncodedChunk>>;

    /// Stop encoding and flush pending data
    async fn stop(&mut self) -> Result<()>;

    /// Check if the encoder is currently running
    fn is_encoding(&self) -> bool;

    /// Get encoder name for logging
    fn name(&self) -> &str;
}

/// Constructs encoders for a captured stream
pub trait EncoderFactory: Send + Sync {
    /// Fails when the runtime cannot encode the requested codec/stream
    fn create(&self, stream: MediaStream, options: &EncoderOptions) -> Result<Box<dyn Encoder>>;
}

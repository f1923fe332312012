use anyhow::Result;
use tokio::sync::mpsc;

/// A captured media stream
///
/// Carries raw media data from the source element to the encoder. The
/// channel closes when the source stops producing.
#[derive(Debug)]
pub struct MediaStream {
    /// Stream identifier (for logging)
    pub id: String,
    /// Raw media data in capture order
    pub frames: mpsc::Receiver<Vec<u8>>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, frames: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            frames,
        }
    }
}

/// The page's live video element
///
/// Audio state setters take `&self`: the element is shared with the page,
/// implementations use interior mutability.
pub trait VideoSource: Send + Sync {
    fn is_muted(&self) -> bool;

    fn volume(&self) -> f64;

    fn set_muted(&self, muted: bool);

    fn set_volume(&self, volume: f64);

    /// Start capturing the element's output as a media stream
    fn capture_stream(&self) -> Result<MediaStream>;

    /// Source name for logging
    fn name(&self) -> &str;
}

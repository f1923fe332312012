use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Interval;
use tracing::{error, info, warn};

use super::encoder::{EncodedChunk, Encoder, EncoderFactory, EncoderOptions};
use super::source::{MediaStream, VideoSource};

/// Containers the passthrough encoder can carry
const SUPPORTED_CONTAINERS: &[&str] = &["video/webm", "video/mp4", "video/x-matroska", "audio/wav"];

/// Replays an encoded media file as a live video source
pub struct FileVideoSource {
    path: PathBuf,
    name: String,
    muted: AtomicBool,
    volume: Mutex<f64>,
    /// Bytes per captured frame
    chunk_size: usize,
    /// Delay between frames
    pace: Duration,
}

impl FileVideoSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: path.display().to_string(),
            path,
            muted: AtomicBool::new(false),
            volume: Mutex::new(1.0),
            chunk_size: 64 * 1024,
            pace: Duration::from_millis(10),
        }
    }

    /// Start in the muted state a streaming page usually loads with
    pub fn muted(self) -> Self {
        self.muted.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }
}

impl VideoSource for FileVideoSource {
    fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    fn volume(&self) -> f64 {
        self.volume.lock().map(|v| *v).unwrap_or(0.0)
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    fn set_volume(&self, volume: f64) {
        if let Ok(mut v) = self.volume.lock() {
            *v = volume.clamp(0.0, 1.0);
        }
    }

    fn capture_stream(&self) -> Result<MediaStream> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read media file: {}", self.path.display()))?;

        info!(
            "Capturing {} ({} bytes, {} byte frames)",
            self.name,
            bytes.len(),
            self.chunk_size
        );

        let (tx, rx) = mpsc::channel(32);
        let chunk_size = self.chunk_size.max(1);
        let pace = self.pace;

        tokio::spawn(async move {
            for frame in bytes.chunks(chunk_size) {
                if tx.send(frame.to_vec()).await.is_err() {
                    // Encoder went away
                    break;
                }
                tokio::time::sleep(pace).await;
            }
        });

        Ok(MediaStream::new(format!("file-{}", uuid::Uuid::new_v4()), rx))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Builds passthrough encoders for already-encoded sources
#[derive(Debug, Default, Clone)]
pub struct PassthroughEncoderFactory;

impl EncoderFactory for PassthroughEncoderFactory {
    fn create(&self, stream: MediaStream, options: &EncoderOptions) -> Result<Box<dyn Encoder>> {
        let essence = options
            .mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if !SUPPORTED_CONTAINERS.contains(&essence.as_str()) {
            bail!("Unsupported container: {}", options.mime_type);
        }

        Ok(Box::new(PassthroughEncoder::new(stream, options.clone())))
    }
}

/// Copies the captured stream into the output container unchanged
///
/// Emits cumulative snapshots every `timeslice` (if set) and a final
/// snapshot on stop.
pub struct PassthroughEncoder {
    stream: Option<MediaStream>,
    options: EncoderOptions,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    encoding: bool,
}

impl PassthroughEncoder {
    pub fn new(stream: MediaStream, options: EncoderOptions) -> Self {
        Self {
            stream: Some(stream),
            options,
            stop_tx: None,
            task: None,
            encoding: false,
        }
    }
}

#[async_trait::async_trait]
impl Encoder for PassthroughEncoder {
    async fn start(&mut self) -> Result<mpsc::Receiver<EncodedChunk>> {
        let mut stream = self.stream.take().context("Encoder already started")?;
        let (tx, rx) = mpsc::channel(16);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let mime_type = self.options.mime_type.clone();
        let mut ticker = self.options.timeslice.map(tokio::time::interval);

        info!("Passthrough encoder started on stream {}", stream.id);

        let task = tokio::spawn(async move {
            let mut buffer: Vec<u8> = Vec::new();
            let mut stream_open = true;

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    frame = stream.frames.recv(), if stream_open => match frame {
                        Some(frame) => buffer.extend_from_slice(&frame),
                        None => stream_open = false,
                    },
                    _ = next_tick(&mut ticker) => {
                        if !buffer.is_empty() && tx.send(snapshot(&buffer, &mime_type)).await.is_err() {
                            warn!("Encoded chunk receiver dropped");
                            return;
                        }
                    }
                }
            }

            // Drain whatever the source already produced
            while let Ok(frame) = stream.frames.try_recv() {
                buffer.extend_from_slice(&frame);
            }

            if let Err(e) = tx.send(snapshot(&buffer, &mime_type)).await {
                error!("Failed to flush final chunk: {}", e);
            }
        });

        self.stop_tx = Some(stop_tx);
        self.task = Some(task);
        self.encoding = true;

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            // Err means the task already finished
            let _ = stop_tx.send(());
        }

        if let Some(task) = self.task.take() {
            task.await.context("Encoder task panicked")?;
        }

        self.encoding = false;
        info!("Passthrough encoder stopped");
        Ok(())
    }

    fn is_encoding(&self) -> bool {
        self.encoding
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

fn snapshot(buffer: &[u8], mime_type: &str) -> EncodedChunk {
    EncodedChunk {
        data: buffer.to_vec(),
        mime_type: mime_type.to_string(),
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

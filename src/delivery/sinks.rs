use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::info;

use crate::blob::Blob;

/// Saves an artifact under a file name
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Returns where the artifact ended up
    async fn download(&self, blob: &Blob, file_name: &str) -> Result<PathBuf>;
}

/// Writes artifacts into a directory
#[derive(Debug, Clone)]
pub struct FileDownloader {
    output_dir: PathBuf,
}

impl FileDownloader {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Downloader for FileDownloader {
    async fn download(&self, blob: &Blob, file_name: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .context("Failed to create output directory")?;

        // Streamer names come from the page
        let safe_name: String = file_name
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        let path = self.output_dir.join(safe_name);

        tokio::fs::write(&path, blob.data.as_slice())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Downloaded {} ({} bytes)", path.display(), blob.len());
        Ok(path)
    }
}

/// Request to open the viewer for a finished recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerRequest {
    pub session_id: String,
}

/// Opens the result-viewing context
pub trait ViewerLauncher: Send + Sync {
    fn open(&self, request: ViewerRequest) -> Result<()>;
}

/// Hands viewer requests to whoever owns the viewer context
#[derive(Debug, Clone)]
pub struct ChannelViewerLauncher {
    tx: mpsc::UnboundedSender<ViewerRequest>,
}

impl ChannelViewerLauncher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ViewerRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ViewerLauncher for ChannelViewerLauncher {
    fn open(&self, request: ViewerRequest) -> Result<()> {
        info!("Opening viewer for {}", request.session_id);
        self.tx
            .send(request)
            .context("Viewer context is gone")
    }
}

use crate::delivery::ViewerSession;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone, Default)]
pub struct AppState {
    /// The recording currently open in the viewer, if any
    pub viewer: Arc<RwLock<Option<ViewerSession>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `viewer`, closing whatever was shown before
    pub async fn show(&self, viewer: ViewerSession) {
        let previous = self.viewer.write().await.replace(viewer);
        if let Some(previous) = previous {
            previous.close();
        }
    }

    /// Close the viewer, revoking its object URL
    pub async fn close(&self) {
        if let Some(viewer) = self.viewer.write().await.take() {
            viewer.close();
        }
    }
}

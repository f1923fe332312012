use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Current location of the page
pub trait PageLocation: Send + Sync {
    fn href(&self) -> String;
}

/// Detects the page leaving the location a recording started on
///
/// The page has no "stream ended" event, so the location is polled. The
/// watcher fires at most once and stops when its token is cancelled.
pub struct NavigationWatcher {
    location: Arc<dyn PageLocation>,
    origin: String,
    poll: Duration,
    cancel: CancellationToken,
}

impl NavigationWatcher {
    /// Watch for a change from the page's current location
    pub fn new(location: Arc<dyn PageLocation>, poll: Duration, cancel: CancellationToken) -> Self {
        let origin = location.href();
        Self {
            location,
            origin,
            poll,
            cancel,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Run `on_navigate` with the new location once it differs
    pub fn spawn<F, Fut>(self, on_navigate: F) -> JoinHandle<()>
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.poll);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut on_navigate = Some(on_navigate);

            debug!("Watching navigation away from {}", self.origin);

            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        debug!("Navigation watcher cancelled");
                        return;
                    }
                    _ = ticker.tick() => {
                        let current = self.location.href();
                        if current != self.origin {
                            info!("Navigated from {} to {}", self.origin, current);
                            if let Some(on_navigate) = on_navigate.take() {
                                on_navigate(current).await;
                            }
                            return;
                        }
                    }
                }
            }
        })
    }
}

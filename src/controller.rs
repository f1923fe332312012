//! Page-level record control
//!
//! Owns the record button's behavior: at most one recording per page,
//! explicit stop from the button, implicit stop when the page navigates
//! away, and delivery of the result exactly once.

use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::capture::VideoSource;
use crate::delivery::{DeliveryOutcome, ResultDelivery};
use crate::error::{RecordError, RecordResult};
use crate::session::{
    NavigationWatcher, PageLocation, RecordingSession, SessionEnv, SessionHandle, StopOutcome,
    StopReason, StreamInfo,
};

/// The live-streaming page being augmented
pub trait Page: PageLocation {
    /// The page's live video element, if it has one
    fn video_source(&self) -> Option<Arc<dyn VideoSource>>;

    fn streamer_name(&self) -> Option<String>;

    fn stream_title(&self) -> Option<String>;
}

/// What the record control currently offers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Idle,
    Recording,
}

/// Result of stopping through the controller
#[derive(Debug, Clone)]
pub struct StopReport {
    pub outcome: StopOutcome,
    /// Set only for the stop that delivered; `None` on repeats or failure
    pub delivery: Option<DeliveryOutcome>,
}

pub struct RecordController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    page: Arc<dyn Page>,
    env: SessionEnv,
    delivery: Arc<ResultDelivery>,
    active: Mutex<Option<SessionHandle>>,
    control: Mutex<ControlState>,
    /// Report of the latest delivered stop
    reports: watch::Sender<Option<StopReport>>,
}

impl RecordController {
    pub fn new(page: Arc<dyn Page>, env: SessionEnv, delivery: Arc<ResultDelivery>) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                page,
                env,
                delivery,
                active: Mutex::new(None),
                control: Mutex::new(ControlState::Idle),
                reports: watch::channel(None).0,
            }),
        }
    }

    /// Start recording the page's stream
    ///
    /// On failure the control is reset to idle and the error returned for
    /// the caller to present (or not).
    pub async fn start(&self) -> RecordResult<SessionHandle> {
        match ControllerInner::start(&self.inner).await {
            Ok(session) => Ok(session),
            Err(RecordError::AlreadyRecording) => Err(RecordError::AlreadyRecording),
            Err(e) => {
                warn!("Record start aborted: {}", e);
                self.inner.set_control(ControlState::Idle);
                Err(e)
            }
        }
    }

    /// Stop the active recording from the record control
    ///
    /// Returns `None` when nothing is recording.
    pub async fn stop(&self) -> Option<StopReport> {
        let session = self.active_session()?;
        Some(self.inner.finish(&session, StopReason::User).await)
    }

    /// Follow stop reports, including those of implicit stops
    pub fn reports(&self) -> watch::Receiver<Option<StopReport>> {
        self.inner.reports.subscribe()
    }

    pub fn active_session(&self) -> Option<SessionHandle> {
        self.inner.active.lock().ok().and_then(|active| active.clone())
    }

    pub fn control_state(&self) -> ControlState {
        self.inner
            .control
            .lock()
            .map(|control| *control)
            .unwrap_or(ControlState::Idle)
    }
}

impl ControllerInner {
    async fn start(this: &Arc<Self>) -> RecordResult<SessionHandle> {
        let source = this.page.video_source().ok_or(RecordError::NoVideoElement)?;
        let stream_info = StreamInfo::from_page(this.page.streamer_name(), this.page.stream_title());

        let session = RecordingSession::start(source.as_ref(), stream_info, &this.env).await?;

        if let Ok(mut active) = this.active.lock() {
            *active = Some(Arc::clone(&session));
        }
        this.set_control(ControlState::Recording);

        let watcher = NavigationWatcher::new(
            Arc::new(PageHref(Arc::clone(&this.page))),
            this.env.config.navigation_poll,
            session.listener_token(),
        );
        info!("Recording {} bound to {}", session.id(), watcher.origin());

        let owner: Weak<Self> = Arc::downgrade(this);
        let watched = Arc::clone(&session);
        watcher.spawn(move |_| async move {
            if let Some(owner) = owner.upgrade() {
                owner.finish(&watched, StopReason::Navigation).await;
            }
        });

        Ok(session)
    }

    /// Stop `session` and deliver its result if this call did the stopping
    async fn finish(&self, session: &SessionHandle, reason: StopReason) -> StopReport {
        let outcome = session.stop(reason).await;

        if let Ok(mut active) = self.active.lock() {
            if active.as_ref().is_some_and(|a| a.id() == session.id()) {
                *active = None;
            }
        }
        self.set_control(ControlState::Idle);

        if outcome.already_stopped {
            return StopReport {
                outcome,
                delivery: None,
            };
        }

        let delivery = match self.delivery.deliver(session.id(), &outcome.record).await {
            Ok(delivery) => Some(delivery),
            Err(e) => {
                error!("Delivery of {} failed: {}", session.id(), e);
                None
            }
        };

        let report = StopReport { outcome, delivery };
        self.reports.send_replace(Some(report.clone()));
        report
    }

    fn set_control(&self, state: ControlState) {
        if let Ok(mut control) = self.control.lock() {
            *control = state;
        }
    }
}

struct PageHref(Arc<dyn Page>);

impl PageLocation for PageHref {
    fn href(&self) -> String {
        self.0.href()
    }
}

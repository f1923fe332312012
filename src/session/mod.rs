//! Recording session management
//!
//! This module provides the `RecordingSession` abstraction that manages:
//! - Capturing the page's video source and driving the encoder
//! - Pushing encoded data into the handoff store as it arrives
//! - Exactly-once stop, whichever trigger fires first
//! - Navigation-away detection as an implicit stop trigger

mod config;
mod navigation;
mod session;
mod state;

pub use config::{RecordingSlot, SessionConfig, SessionEnv};
pub use navigation::{NavigationWatcher, PageLocation};
pub use session::{RecordingSession, SessionHandle, StopOutcome};
pub use state::{SessionState, StopReason, StreamInfo};

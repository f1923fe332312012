//! HTTP surface of the viewer context
//!
//! This module serves the recording the viewer is previewing:
//! - GET /record - Download info (streamer, length, file name)
//! - GET /record/video - The recorded media
//! - POST /record/download - Save the recording
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;

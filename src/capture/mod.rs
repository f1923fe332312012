//! Capture boundary
//!
//! The page's video element and the platform encoder are external
//! collaborators. This module defines the traits the session drives them
//! through, plus file-backed implementations used by the CLI:
//! - `VideoSource`: the live element (audio state + stream capture)
//! - `EncoderFactory` / `Encoder`: stream-to-container encoding
//! - `FileVideoSource` / `PassthroughEncoderFactory`: replay an already
//!   encoded file as if it were a live capture

pub mod encoder;
pub mod file;
pub mod source;

pub use encoder::{EncodedChunk, Encoder, EncoderFactory, EncoderOptions};
pub use file::{FileVideoSource, PassthroughEncoder, PassthroughEncoderFactory};
pub use source::{MediaStream, VideoSource};

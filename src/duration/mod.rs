//! Clip duration recovery
//!
//! Live-captured containers are written without a known length, so the
//! reported duration is often infinite. `DurationResolver` forces the media
//! element to discover the real length and falls back to wall-clock time.

pub mod container;
pub mod resolver;

pub use container::{ContainerMedia, ContainerMediaLoader};
pub use resolver::{
    fallback_duration, DurationResolver, MediaElement, MediaLoader, CORRECTION_EPSILON_SECONDS,
    EXTREME_SEEK_SECONDS,
};

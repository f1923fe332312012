use std::time::Duration;
use tracing::{debug, info, warn};

use crate::blob::Blob;
use crate::error::{RecordError, RecordResult};
use crate::handoff::HandoffRecord;

/// Seek target far past any real clip length (2^53 - 1)
pub const EXTREME_SEEK_SECONDS: f64 = 9_007_199_254_740_991.0;

/// Encoder start-up latency subtracted from wall-clock length
pub const CORRECTION_EPSILON_SECONDS: f64 = 0.1;

/// Default wait between the extreme seek and reading the duration
pub const DEFAULT_SETTLE_INTERVAL: Duration = Duration::from_millis(500);

/// A playable media element
pub trait MediaElement: Send {
    fn set_current_time(&mut self, seconds: f64);

    fn current_time(&self) -> f64;

    /// Reported duration in seconds; may be infinite or NaN
    fn duration(&self) -> f64;
}

/// Opens a media element over an encoded blob
pub trait MediaLoader: Send + Sync {
    fn load(&self, blob: &Blob) -> RecordResult<Box<dyn MediaElement>>;
}

/// Resolves a finite clip duration
#[derive(Debug, Clone)]
pub struct DurationResolver {
    settle_interval: Duration,
    correction_epsilon: f64,
}

impl Default for DurationResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_INTERVAL)
    }
}

impl DurationResolver {
    pub fn new(settle_interval: Duration) -> Self {
        Self {
            settle_interval,
            correction_epsilon: CORRECTION_EPSILON_SECONDS,
        }
    }

    pub fn settle_interval(&self) -> Duration {
        self.settle_interval
    }

    /// Probe the element, then fall back to the record's timestamps
    ///
    /// The settle wait is fixed: metadata updates after the extreme seek
    /// are not observable through events.
    pub async fn resolve(
        &self,
        media: &mut dyn MediaElement,
        record: &HandoffRecord,
    ) -> RecordResult<f64> {
        media.set_current_time(EXTREME_SEEK_SECONDS);
        tokio::time::sleep(self.settle_interval).await;
        media.set_current_time(0.0);

        let probed = media.duration();
        if is_valid(probed) {
            debug!("Probed duration: {:.3}s", probed);
            return Ok(probed);
        }

        match fallback_duration(record, self.correction_epsilon) {
            Some(fallback) => {
                info!(
                    "Media reported duration {}, using wall-clock {:.3}s",
                    probed, fallback
                );
                Ok(fallback)
            }
            None => Err(RecordError::DurationUnresolvable),
        }
    }

    /// Like `resolve`, but never fails: an unresolvable duration becomes 0
    pub async fn resolve_or_placeholder(
        &self,
        media: &mut dyn MediaElement,
        record: &HandoffRecord,
    ) -> f64 {
        match self.resolve(media, record).await {
            Ok(duration) => duration,
            Err(e) => {
                warn!("{}, using placeholder duration", e);
                0.0
            }
        }
    }
}

/// `(stop - start) - epsilon` in seconds, if that is a usable duration
pub fn fallback_duration(record: &HandoffRecord, correction_epsilon: f64) -> Option<f64> {
    let fallback = record.elapsed_seconds()? - correction_epsilon;
    is_valid(fallback).then_some(fallback)
}

fn is_valid(duration: f64) -> bool {
    duration.is_finite() && duration >= 0.0
}

use std::io::Cursor;
use std::sync::Arc;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;
use tracing::{debug, info, warn};

use super::resolver::{MediaElement, MediaLoader};
use crate::blob::Blob;
use crate::capture::encoder::container_extension;
use crate::error::{RecordError, RecordResult};

/// Media element over an encoded container
///
/// Reports the duration from the container header when it has one and
/// infinity otherwise. Seeking past the known end scans the packets to
/// find the real length, as a browser does after such a seek.
pub struct ContainerMedia {
    data: Arc<Vec<u8>>,
    extension: String,
    duration: f64,
    current_time: f64,
    scanned: bool,
}

impl ContainerMedia {
    pub fn open(data: Arc<Vec<u8>>, mime_type: &str) -> RecordResult<Self> {
        let extension = container_extension(mime_type).to_string();
        let format = probe(&data, &extension).map_err(|e| {
            RecordError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Unreadable {} container: {}", extension, e),
            ))
        })?;

        let duration = header_duration(format.as_ref()).unwrap_or(f64::INFINITY);

        info!(
            "Container loaded: {} ({} bytes, duration {})",
            extension,
            data.len(),
            duration
        );

        Ok(Self {
            data,
            extension,
            duration,
            current_time: 0.0,
            scanned: false,
        })
    }

    /// Duration from the last packet's end timestamp
    fn scan_duration(&self) -> Option<f64> {
        let mut format = probe(&self.data, &self.extension).ok()?;
        let track = format.default_track()?;
        let track_id = track.id;
        let time_base = track.codec_params.time_base?;

        let mut end_ts: u64 = 0;
        loop {
            match format.next_packet() {
                Ok(packet) if packet.track_id() == track_id => {
                    end_ts = end_ts.max(packet.ts().saturating_add(packet.dur()));
                }
                Ok(_) => {}
                Err(SymphoniaError::IoError(_)) => break,
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => {
                    warn!("Packet scan stopped early: {}", e);
                    break;
                }
            }
        }

        debug!("Scanned end timestamp {} of track {}", end_ts, track_id);
        (end_ts > 0).then(|| seconds(time_base, end_ts))
    }
}

impl MediaElement for ContainerMedia {
    fn set_current_time(&mut self, seconds: f64) {
        let past_known_end = !self.duration.is_finite() || seconds > self.duration;
        if past_known_end && !self.scanned {
            self.scanned = true;
            if let Some(duration) = self.scan_duration() {
                self.duration = duration;
            }
        }

        self.current_time = if self.duration.is_finite() {
            seconds.clamp(0.0, self.duration)
        } else {
            seconds.max(0.0)
        };
    }

    fn current_time(&self) -> f64 {
        self.current_time
    }

    fn duration(&self) -> f64 {
        self.duration
    }
}

/// Loads blobs as `ContainerMedia`
#[derive(Debug, Default, Clone)]
pub struct ContainerMediaLoader;

impl MediaLoader for ContainerMediaLoader {
    fn load(&self, blob: &Blob) -> RecordResult<Box<dyn MediaElement>> {
        Ok(Box::new(ContainerMedia::open(
            blob.data.clone(),
            &blob.mime_type,
        )?))
    }
}

fn probe(data: &[u8], extension: &str) -> Result<Box<dyn FormatReader>, SymphoniaError> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(data.to_vec())), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(extension);

    let probed = symphonia::default::get_probe().format(
        &hint,
        source,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    Ok(probed.format)
}

fn header_duration(format: &dyn FormatReader) -> Option<f64> {
    let track = format.default_track()?;
    let params = &track.codec_params;
    let n_frames = params.n_frames?;
    let time_base = params.time_base?;
    Some(seconds(time_base, n_frames))
}

fn seconds(time_base: TimeBase, ts: u64) -> f64 {
    let time = time_base.calc_time(ts);
    time.seconds as f64 + time.frac
}

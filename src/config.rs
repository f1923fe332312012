use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::capture::EncoderOptions;
use crate::duration::DurationResolver;
use crate::handoff::StrategyPreference;
use crate::session::SessionConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub recording: RecordingConfig,
    pub delivery: DeliveryConfig,
    pub handoff: HandoffConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub mime_type: String,
    pub video_bits_per_second: u32,
    /// 0 disables intermediate chunks
    pub timeslice_ms: u64,
    pub navigation_poll_ms: u64,
    pub settle_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Download immediately instead of opening the viewer
    pub fast_rec: bool,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    pub strategy: StrategyPreference,
    /// Shared storage file of the direct strategy
    pub storage_path: PathBuf,
    /// Relay over NATS when set, in-process otherwise
    pub nats_url: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "stream-clip".to_string(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        let encoder = EncoderOptions::default();
        Self {
            mime_type: encoder.mime_type,
            video_bits_per_second: encoder.video_bits_per_second,
            timeslice_ms: 0,
            navigation_poll_ms: 1000,
            settle_interval_ms: 500,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            fast_rec: false,
            output_dir: PathBuf::from("recordings"),
        }
    }
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyPreference::Auto,
            storage_path: PathBuf::from("recordings/storage.json"),
            nats_url: None,
        }
    }
}

impl Config {
    /// Load `path` (any format the `config` crate knows, optional) with
    /// `STREAM_CLIP__SECTION__KEY` environment overrides on top
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("STREAM_CLIP")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl RecordingConfig {
    pub fn encoder_options(&self) -> EncoderOptions {
        EncoderOptions {
            mime_type: self.mime_type.clone(),
            video_bits_per_second: self.video_bits_per_second,
            timeslice: (self.timeslice_ms > 0).then(|| Duration::from_millis(self.timeslice_ms)),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            encoder: self.encoder_options(),
            navigation_poll: Duration::from_millis(self.navigation_poll_ms.max(1)),
        }
    }

    pub fn duration_resolver(&self) -> DurationResolver {
        DurationResolver::new(Duration::from_millis(self.settle_interval_ms))
    }
}

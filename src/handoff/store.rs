use serde::{Deserialize, Serialize};

use super::record::HandoffRecord;
use crate::capture::EncodedChunk;
use crate::error::RecordResult;

/// How a record crosses the context boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandoffStrategy {
    Direct,
    Relay,
}

/// Configured strategy; `Auto` defers to the capability probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyPreference {
    #[default]
    Auto,
    Direct,
    Relay,
}

/// What the platform allows across contexts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformCapabilities {
    /// Object URLs written to shared storage resolve in other contexts
    pub shares_blob_references: bool,
}

impl PlatformCapabilities {
    /// Gecko-based browsers keep object URLs private to their context
    pub fn probe(user_agent: &str) -> Self {
        Self {
            shares_blob_references: !user_agent.contains("Firefox"),
        }
    }

    pub fn select(&self, preference: StrategyPreference) -> HandoffStrategy {
        match preference {
            StrategyPreference::Direct => HandoffStrategy::Direct,
            StrategyPreference::Relay => HandoffStrategy::Relay,
            StrategyPreference::Auto if self.shares_blob_references => HandoffStrategy::Direct,
            StrategyPreference::Auto => HandoffStrategy::Relay,
        }
    }
}

/// Persistence bridge between the recording and the consuming context
#[async_trait::async_trait]
pub trait HandoffStore: Send + Sync {
    fn strategy(&self) -> HandoffStrategy;

    /// Persist the in-progress stub at session start
    async fn begin(&self, stub: &HandoffRecord) -> RecordResult<()>;

    /// Replace the stored blob with the latest encoded chunk
    async fn put_blob(&self, chunk: &EncodedChunk) -> RecordResult<()>;

    /// Persist the finalized record
    async fn save(&self, record: &HandoffRecord) -> RecordResult<()>;

    /// Read back the current record; `NotFound` if none was written
    async fn load(&self) -> RecordResult<HandoffRecord>;
}

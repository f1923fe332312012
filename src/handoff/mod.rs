//! Cross-context handoff of a finished recording
//!
//! The recording context and the context that shows or downloads the result
//! are isolated from each other. Two strategies bridge them:
//! - Direct: the blob's object URL plus metadata go into shared storage
//! - Relay: metadata and raw bytes travel as two messages to the viewer,
//!   which merges them in whatever order they arrive
//!
//! The strategy is picked once per session from a platform capability probe.

pub mod direct;
pub mod record;
pub mod relay;
pub mod storage;
pub mod store;
pub mod transport;

pub use direct::DirectStore;
pub use record::{BlobReference, HandoffRecord, PersistedHandoff, RecordInfo};
pub use relay::{PendingRecord, RelayInbox, RelayMessage, RelayStore};
pub use storage::{FileStorage, MemoryStorage, SharedStorage};
pub use store::{HandoffStore, HandoffStrategy, PlatformCapabilities, StrategyPreference};
pub use transport::{new_relay_id, LocalRelay, NatsRelay, RelayTransport};

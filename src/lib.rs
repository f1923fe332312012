pub mod blob;
pub mod capture;
pub mod config;
pub mod controller;
pub mod delivery;
pub mod duration;
pub mod error;
pub mod handoff;
pub mod http;
pub mod session;

pub use blob::{Blob, BlobRegistry, MemoryBlobRegistry, ObjectUrl};
pub use capture::{
    EncodedChunk, Encoder, EncoderFactory, EncoderOptions, FileVideoSource, MediaStream,
    PassthroughEncoderFactory, VideoSource,
};
pub use config::Config;
pub use controller::{ControlState, Page, RecordController, StopReport};
pub use delivery::{
    file_name, ChannelViewerLauncher, DeliveryMode, DeliveryOutcome, DownloadInfo, Downloader,
    FileDownloader, ResultDelivery, ViewerLauncher, ViewerRequest, ViewerSession,
};
pub use duration::{ContainerMedia, ContainerMediaLoader, DurationResolver, MediaElement, MediaLoader};
pub use error::{RecordError, RecordResult};
pub use handoff::{
    BlobReference, DirectStore, FileStorage, HandoffRecord, HandoffStore, HandoffStrategy,
    LocalRelay, MemoryStorage, NatsRelay, PlatformCapabilities, RecordInfo, RelayInbox,
    RelayMessage, RelayStore, RelayTransport, SharedStorage, StrategyPreference,
};
pub use http::{create_router, AppState};
pub use session::{
    NavigationWatcher, PageLocation, RecordingSession, SessionConfig, SessionEnv, SessionHandle,
    SessionState, StopOutcome, StopReason, StreamInfo,
};

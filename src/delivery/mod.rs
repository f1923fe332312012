//! Turning a finished recording into a downloadable artifact
//!
//! - `ResultDelivery`: immediate download or hand-off to a viewer context
//! - `ViewerSession`: the viewer context, previewing before saving
//! - `Downloader` / `ViewerLauncher`: where artifacts and viewers go

mod delivery;
mod naming;
mod sinks;
mod viewer;

pub use delivery::{DeliveryMode, DeliveryOutcome, ResultDelivery};
pub use naming::{file_name, DownloadInfo};
pub use sinks::{ChannelViewerLauncher, Downloader, FileDownloader, ViewerLauncher, ViewerRequest};
pub use viewer::ViewerSession;

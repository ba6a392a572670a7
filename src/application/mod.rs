pub mod fetcher;
pub mod progress;
pub mod registry;
pub mod router;
pub mod scratch;
pub mod transfer_coordinator;
pub mod uploader;

pub use registry::PendingRegistry;
pub use router::TransportRouter;
pub use transfer_coordinator::{CallbackQuery, RelaySettings, TransferCoordinator};
pub use uploader::Uploader;

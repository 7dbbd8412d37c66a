pub mod error;
pub mod graph;
pub mod sync;
pub mod utils;
pub mod watermark;

// Re-export commonly used types
pub use error::{ComponentError, SyncError};
pub use graph::{Component, ComponentName, ComponentVersion, DependencyGraph, ResolvedGraph};
pub use sync::{clean, synchronize, CleanReport, SyncReport, SyncSpec};
pub use sync::core::registry::ProviderRegistry;
pub use sync::core::retry::{RetryLimitExceeded, RetryLogic};
pub use sync::core::traits::{DependencyProvider, DownloadOutcome, DownloadRequest, ProviderType};
pub use sync::types::{ProgressReporter, SilentProgressReporter};
pub use watermark::store::WatermarkStore;
pub use watermark::Watermark;

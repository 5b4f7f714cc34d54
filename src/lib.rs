// deskwork - background work execution engine for desktop UIs
//
// This is the library crate: off-thread work with ordered progress updates,
// single-shot completion callbacks and cooperative cancellation.
// The binary crate (main.rs) runs a console demo job.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod ui;
pub mod work;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::Metrics;
pub use models::EngineConfig;
pub use ui::{CancelPolicy, CancelableTask, EventLoop, EventLoopHandle};
pub use work::{
    AppWorker, CancellationToken, FnCallback, LoadingView, Progress, ProgressLoadingView,
    ProgressWorkManager, WorkCallback, WorkContext, WorkError, WorkRunnable, WorkRunnableListener,
    WorkerError,
};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

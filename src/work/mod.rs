// Background work engine
//
// Runs units of work off the issuing thread and reports progress and
// completion back to it through the event loop.

pub mod cancel;
pub mod contracts;
pub mod manager;
pub mod progress;
pub mod worker;

pub use cancel::CancellationToken;
pub use contracts::{
    FnCallback, LoadingView, ProgressLoadingView, WorkCallback, WorkError, WorkRunnable,
    WorkRunnableListener,
};
pub use manager::{ProgressContext, ProgressWorkManager};
pub use progress::{Progress, UNKNOWN_SIZE};
pub use worker::{AppWorker, AppWorkerBuilder, WorkContext, WorkState, WorkerError};

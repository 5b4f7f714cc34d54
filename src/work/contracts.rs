// Capability contracts between the work engine and the UI layer.
//
// Views, callbacks and listeners are implemented outside this crate (widgets,
// dialogs). The engine only ever calls them on the issuing thread, but they
// travel through the event loop mailbox, hence the `Send` bounds.

use crate::work::worker::WorkContext;
use std::any::Any;
use thiserror::Error;

/// Visual busy indicator bound to a background work.
pub trait LoadingView: Send + Sync {
    /// Returns `true` if and only if the view is in running mode.
    fn is_running(&self) -> bool;

    /// Set the view to running mode.
    fn start(&self);

    /// Finish running mode.
    fn end(&self);
}

/// Busy indicator that can also display a fraction of completed work.
pub trait ProgressLoadingView: LoadingView {
    /// Set the progress to display, a fraction in `[0, 1]`.
    fn set_progress(&self, fraction: f32);
}

/// Error raised by a work body and delivered through [`WorkCallback::work_failed`].
#[derive(Error, Debug)]
pub enum WorkError {
    #[error(transparent)]
    Failed(#[from] anyhow::Error),

    #[error("work panicked: {0}")]
    Panicked(String),
}

impl WorkError {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_string()
        };
        WorkError::Panicked(message)
    }
}

/// Completion sink of a background work.
///
/// Exactly one of the three methods is called per execution, on the issuing
/// thread, after the bound [`LoadingView`] has ended.
///
/// Only [`work_finished`](Self::work_finished) is required. The default failure
/// policy reports the error through the log; UI layers override it to show a
/// message to the user.
pub trait WorkCallback<R>: Send {
    /// The work completed and returned `result`.
    fn work_finished(&mut self, result: R);

    /// The work body returned an error or panicked.
    fn work_failed(&mut self, error: WorkError) {
        tracing::error!("Background work failed: {}", error);
    }

    /// The work was cancelled before its result was stored.
    fn work_cancelled(&mut self) {}
}

impl<R, C> WorkCallback<R> for Box<C>
where
    C: WorkCallback<R> + ?Sized,
{
    fn work_finished(&mut self, result: R) {
        (**self).work_finished(result);
    }

    fn work_failed(&mut self, error: WorkError) {
        (**self).work_failed(error);
    }

    fn work_cancelled(&mut self) {
        (**self).work_cancelled();
    }
}

/// Receives ordered batches of updates published by a running work.
pub trait WorkRunnableListener<U>: Send {
    /// `updates` holds every value published since the previous batch, oldest first.
    fn update(&mut self, updates: Vec<U>);
}

impl<U, F> WorkRunnableListener<U> for F
where
    F: FnMut(Vec<U>) + Send,
{
    fn update(&mut self, updates: Vec<U>) {
        self(updates)
    }
}

/// Unit of work executed once on a worker thread.
///
/// Any closure `FnOnce(&WorkContext<U>) -> anyhow::Result<R>` is a work runnable.
pub trait WorkRunnable<R, U>: Send + 'static {
    fn run(self, ctx: &WorkContext<U>) -> anyhow::Result<R>;
}

impl<R, U, F> WorkRunnable<R, U> for F
where
    F: FnOnce(&WorkContext<U>) -> anyhow::Result<R> + Send + 'static,
{
    fn run(self, ctx: &WorkContext<U>) -> anyhow::Result<R> {
        self(ctx)
    }
}

type FinishedFn<R> = Box<dyn FnMut(R) + Send>;
type FailedFn = Box<dyn FnMut(WorkError) + Send>;
type CancelledFn = Box<dyn FnMut() + Send>;

/// [`WorkCallback`] built from closures.
///
/// Missing failure/cancel handlers fall back to the trait defaults.
pub struct FnCallback<R> {
    on_finished: FinishedFn<R>,
    on_failed: Option<FailedFn>,
    on_cancelled: Option<CancelledFn>,
}

impl<R> FnCallback<R> {
    pub fn new<F>(on_finished: F) -> Self
    where
        F: FnMut(R) + Send + 'static,
    {
        Self {
            on_finished: Box::new(on_finished),
            on_failed: None,
            on_cancelled: None,
        }
    }

    pub fn on_failed<F>(mut self, on_failed: F) -> Self
    where
        F: FnMut(WorkError) + Send + 'static,
    {
        self.on_failed = Some(Box::new(on_failed));
        self
    }

    pub fn on_cancelled<F>(mut self, on_cancelled: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.on_cancelled = Some(Box::new(on_cancelled));
        self
    }
}

impl<R> WorkCallback<R> for FnCallback<R> {
    fn work_finished(&mut self, result: R) {
        (self.on_finished)(result);
    }

    fn work_failed(&mut self, error: WorkError) {
        match self.on_failed.as_mut() {
            Some(on_failed) => on_failed(error),
            None => tracing::error!("Background work failed: {}", error),
        }
    }

    fn work_cancelled(&mut self) {
        if let Some(on_cancelled) = self.on_cancelled.as_mut() {
            on_cancelled();
        }
    }
}

// CancelableTask - bookkeeping behind a modal task dialog
//
// Owns the dialog's worker and decides whether a user cancel gesture (close
// button or cancel button) reaches `AppWorker::cancel`. The policy only gates
// the call; the worker's own state machine is never touched from here.

use crate::ui::bridge::EventLoopHandle;
use crate::work::contracts::{LoadingView, WorkCallback, WorkError, WorkRunnable};
use crate::work::progress::UNKNOWN_SIZE;
use crate::work::worker::{AppWorker, WorkerError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Decides whether the application honors a user cancel request right now.
#[cfg_attr(test, mockall::automock)]
pub trait CancelPolicy: Send {
    fn cancel_request(&mut self) -> bool;
}

/// Honors every cancel request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowCancel;

impl CancelPolicy for AllowCancel {
    fn cancel_request(&mut self) -> bool {
        true
    }
}

/// Rejects every cancel request.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyCancel;

impl CancelPolicy for DenyCancel {
    fn cancel_request(&mut self) -> bool {
        false
    }
}

impl<F> CancelPolicy for F
where
    F: FnMut() -> bool + Send,
{
    fn cancel_request(&mut self) -> bool {
        self()
    }
}

/// Marks the task closed before forwarding the terminal notification.
struct ClosingCallback<R> {
    closed: Arc<AtomicBool>,
    inner: Option<Box<dyn WorkCallback<R>>>,
}

impl<R> ClosingCallback<R> {
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl<R> WorkCallback<R> for ClosingCallback<R> {
    fn work_finished(&mut self, result: R) {
        self.close();
        if let Some(inner) = self.inner.as_mut() {
            inner.work_finished(result);
        }
    }

    fn work_failed(&mut self, error: WorkError) {
        self.close();
        match self.inner.as_mut() {
            Some(inner) => inner.work_failed(error),
            None => tracing::error!("Task failed: {}", error),
        }
    }

    fn work_cancelled(&mut self) {
        self.close();
        if let Some(inner) = self.inner.as_mut() {
            inner.work_cancelled();
        }
    }
}

/// A cancelable unit of work shown in a dialog.
///
/// Executes at most one work. User cancel gestures go through
/// [`request_cancel`](Self::request_cancel), which consults the optional
/// [`CancelPolicy`] before cancelling the worker.
pub struct CancelableTask<R> {
    cancelable: bool,
    message: String,
    task_size: i64,
    policy: Option<Box<dyn CancelPolicy>>,
    worker: Option<AppWorker<R>>,
    closed: Arc<AtomicBool>,
}

impl<R> CancelableTask<R>
where
    R: Send + 'static,
{
    /// A cancelable task without policy: every gesture cancels the work.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            cancelable: true,
            message: message.into(),
            task_size: UNKNOWN_SIZE,
            policy: None,
            worker: None,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancelable(mut self, cancelable: bool) -> Self {
        self.cancelable = cancelable;
        self
    }

    /// Consult `policy` on every cancel gesture.
    pub fn with_policy<P>(mut self, policy: P) -> Self
    where
        P: CancelPolicy + 'static,
    {
        self.policy = Some(Box::new(policy));
        self
    }

    pub fn is_cancelable(&self) -> bool {
        self.cancelable
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub fn task_size(&self) -> i64 {
        self.task_size
    }

    pub fn set_task_size(&mut self, task_size: i64) {
        self.task_size = task_size;
    }

    /// Label text for `now` processed units, e.g. `"Copying files 3/10"`.
    pub fn status_text(&self, now: i64) -> String {
        format!("{} {}/{}", self.message, now, self.task_size)
    }

    /// Whether the work reached its terminal notification.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn worker(&self) -> Option<&AppWorker<R>> {
        self.worker.as_ref()
    }

    /// Run `runnable` with `view` as the dialog's busy indicator.
    ///
    /// # Errors
    /// [`WorkerError::TaskAlreadyExecuted`] if this task already executed a work.
    pub fn execute<W>(
        &mut self,
        events: &EventLoopHandle,
        view: Arc<dyn LoadingView>,
        callback: Option<Box<dyn WorkCallback<R>>>,
        runnable: W,
    ) -> Result<(), WorkerError>
    where
        W: WorkRunnable<R, ()>,
    {
        if self.worker.is_some() {
            tracing::error!(task = %self.message, "Task executed twice");
            return Err(WorkerError::TaskAlreadyExecuted);
        }

        let worker = AppWorker::builder(events, view)
            .callback(ClosingCallback {
                closed: Arc::clone(&self.closed),
                inner: callback,
            })
            .build();
        worker.execute(runnable)?;
        tracing::debug!(task = %self.message, "Task started");
        self.worker = Some(worker);
        Ok(())
    }

    /// Handle a user cancel gesture.
    ///
    /// Returns `true` if the worker accepted a cancellation. Nothing happens
    /// when the task is not cancelable, has no running work, or the policy
    /// rejects the request; in that case the work continues unaffected.
    pub fn request_cancel(&mut self) -> bool {
        if !self.cancelable || self.is_closed() {
            return false;
        }
        let Some(worker) = self.worker.as_ref() else {
            return false;
        };
        if worker.state().is_terminal() {
            return false;
        }

        if let Some(policy) = self.policy.as_mut() {
            if !policy.cancel_request() {
                tracing::info!(task = %self.message, "Cancel request rejected by policy");
                return false;
            }
        }
        worker.cancel()
    }
}

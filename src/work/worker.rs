// AppWorker - one-shot background work orchestrator
//
// An AppWorker binds one work body to one LoadingView, an optional WorkCallback
// and an optional WorkRunnableListener. It is the only component that crosses
// threads:
// - `execute` starts the view on the issuing thread and runs the body on the
//   runtime's blocking pool
// - `update` queues values from the worker thread; the issuing thread drains
//   them in order as batches
// - completion and cancellation race on a single atomic state tag; the winner
//   schedules `end()` followed by exactly one terminal notification

use crate::ui::bridge::EventLoopHandle;
use crate::work::cancel::CancellationToken;
use crate::work::contracts::{
    LoadingView, WorkCallback, WorkError, WorkRunnable, WorkRunnableListener,
};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Misuse of the worker API, reported synchronously to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    #[error("This worker was already executed")]
    AlreadyExecuted,

    #[error("This work has not been executed yet")]
    NotExecuted,

    #[error("This work does not allow updates")]
    UpdatesNotEnabled,

    #[error("This task has already executed a work")]
    TaskAlreadyExecuted,
}

/// Lifecycle of one execution: `New -> Running -> {Completed, Failed, Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkState {
    New = 0,
    Running = 1,
    Completed = 2,
    Failed = 3,
    Cancelled = 4,
}

impl WorkState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkState::New,
            1 => WorkState::Running,
            2 => WorkState::Completed,
            3 => WorkState::Failed,
            _ => WorkState::Cancelled,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkState::Completed | WorkState::Failed | WorkState::Cancelled
        )
    }
}

enum Outcome<R> {
    Finished(R),
    Failed(WorkError),
    Cancelled,
}

impl<R> Outcome<R> {
    fn state(&self) -> WorkState {
        match self {
            Outcome::Finished(_) => WorkState::Completed,
            Outcome::Failed(_) => WorkState::Failed,
            Outcome::Cancelled => WorkState::Cancelled,
        }
    }
}

/// Objects only touched on the issuing thread.
struct UiSide<R, U> {
    callback: Option<Box<dyn WorkCallback<R>>>,
    listener: Option<Box<dyn WorkRunnableListener<U>>>,
}

struct Shared<R, U> {
    id: u64,
    state: AtomicU8,
    /// Set on the issuing thread when the terminal dispatch begins.
    dispatched: AtomicBool,
    has_listener: bool,
    pending: Mutex<Vec<U>>,
    ui: Mutex<UiSide<R, U>>,
    view: Arc<dyn LoadingView>,
    token: CancellationToken,
    events: EventLoopHandle,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<R, U> Shared<R, U>
where
    R: Send + 'static,
    U: Send + 'static,
{
    fn state(&self) -> WorkState {
        WorkState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, to: WorkState) -> Result<(), WorkState> {
        self.state
            .compare_exchange(
                WorkState::Running as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(WorkState::from_u8)
    }

    /// Worker side: store the body's outcome unless cancellation won.
    fn complete(self: &Arc<Self>, outcome: Outcome<R>) {
        match self.transition(outcome.state()) {
            Ok(()) => {
                tracing::debug!(worker = self.id, state = ?outcome.state(), "Work completed");
                self.schedule_dispatch(outcome);
            }
            Err(current) => {
                tracing::warn!(
                    worker = self.id,
                    state = ?current,
                    "Discarding result of work that was already cancelled"
                );
                self.events.metrics().record_result_discarded();
            }
        }
    }

    fn schedule_dispatch(self: &Arc<Self>, outcome: Outcome<R>) {
        let shared = Arc::clone(self);
        self.events.invoke(move || shared.dispatch(outcome));
    }

    /// Issuing thread: flush remaining updates, end the view, then notify once.
    fn dispatch(&self, outcome: Outcome<R>) {
        let callback = {
            let mut ui = lock(&self.ui);
            let remaining = std::mem::take(&mut *lock(&self.pending));
            if !remaining.is_empty() {
                if let Some(listener) = ui.listener.as_mut() {
                    listener.update(remaining);
                    self.events.metrics().record_batch_delivered();
                }
            }
            ui.callback.take()
        };

        self.dispatched.store(true, Ordering::Release);
        self.view.end();

        let metrics = self.events.metrics();
        match outcome {
            Outcome::Finished(result) => {
                tracing::info!(worker = self.id, "Work finished");
                metrics.record_finished();
                if let Some(mut callback) = callback {
                    callback.work_finished(result);
                }
            }
            Outcome::Failed(error) => {
                metrics.record_failed();
                match callback {
                    Some(mut callback) => {
                        tracing::info!(worker = self.id, "Work failed: {}", error);
                        callback.work_failed(error);
                    }
                    None => tracing::error!(worker = self.id, "Work failed: {}", error),
                }
            }
            Outcome::Cancelled => {
                tracing::info!(worker = self.id, "Work cancelled");
                metrics.record_cancelled();
                if let Some(mut callback) = callback {
                    callback.work_cancelled();
                }
            }
        }
    }

    fn publish(self: &Arc<Self>, value: U) -> Result<(), WorkerError> {
        let state = self.state();
        if state == WorkState::New {
            return Err(WorkerError::NotExecuted);
        }
        if !self.has_listener {
            return Err(WorkerError::UpdatesNotEnabled);
        }
        if state != WorkState::Running {
            tracing::debug!(worker = self.id, state = ?state, "Dropping update issued after termination");
            self.events.metrics().record_updates_dropped(1);
            return Ok(());
        }

        let first_of_batch = {
            let mut pending = lock(&self.pending);
            pending.push(value);
            pending.len() == 1
        };
        self.events.metrics().record_update_published();

        if first_of_batch {
            let shared = Arc::clone(self);
            self.events.invoke(move || shared.deliver_pending());
        }
        Ok(())
    }

    /// Issuing thread: hand everything queued so far to the listener.
    fn deliver_pending(&self) {
        let batch = std::mem::take(&mut *lock(&self.pending));
        if batch.is_empty() {
            return;
        }
        if self.dispatched.load(Ordering::Acquire) {
            tracing::debug!(worker = self.id, count = batch.len(), "Dropping updates queued after termination");
            self.events.metrics().record_updates_dropped(batch.len());
            return;
        }

        let mut ui = lock(&self.ui);
        if let Some(listener) = ui.listener.as_mut() {
            tracing::trace!(worker = self.id, count = batch.len(), "Delivering update batch");
            listener.update(batch);
            self.events.metrics().record_batch_delivered();
        }
    }
}

/// Publishing side of a worker, erased over the result type.
trait Publish<U>: Send + Sync {
    fn publish(&self, value: U) -> Result<(), WorkerError>;
}

impl<R, U> Publish<U> for AppWorker<R, U>
where
    R: Send + 'static,
    U: Send + 'static,
{
    fn publish(&self, value: U) -> Result<(), WorkerError> {
        self.shared.publish(value)
    }
}

/// Handle given to a running work body.
pub struct WorkContext<U> {
    publisher: Box<dyn Publish<U>>,
    token: CancellationToken,
}

impl<U> WorkContext<U> {
    /// Publish `value` to the worker's listener, see [`AppWorker::update`].
    pub fn update(&self, value: U) -> Result<(), WorkerError> {
        self.publisher.publish(value)
    }

    /// Whether cancellation of this work was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Builder for [`AppWorker`].
pub struct AppWorkerBuilder<R, U> {
    events: EventLoopHandle,
    view: Arc<dyn LoadingView>,
    callback: Option<Box<dyn WorkCallback<R>>>,
    listener: Option<Box<dyn WorkRunnableListener<U>>>,
}

impl<R, U> AppWorkerBuilder<R, U>
where
    R: Send + 'static,
    U: Send + 'static,
{
    /// Receive the terminal notification.
    pub fn callback<C>(mut self, callback: C) -> Self
    where
        C: WorkCallback<R> + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Receive updates published by the work body. Without a listener,
    /// [`AppWorker::update`] is rejected.
    pub fn listener<L>(mut self, listener: L) -> Self
    where
        L: WorkRunnableListener<U> + 'static,
    {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn build(self) -> AppWorker<R, U> {
        let id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
        AppWorker {
            shared: Arc::new(Shared {
                id,
                state: AtomicU8::new(WorkState::New as u8),
                dispatched: AtomicBool::new(false),
                has_listener: self.listener.is_some(),
                pending: Mutex::new(Vec::new()),
                ui: Mutex::new(UiSide {
                    callback: self.callback,
                    listener: self.listener,
                }),
                view: self.view,
                token: CancellationToken::new(),
                events: self.events,
            }),
        }
    }
}

/// Executes one work in the background and reports it to the issuing thread.
///
/// `R` is the result type, `U` the type of progress updates.
///
/// Guarantees per instance:
/// - `execute` succeeds at most once
/// - updates reach the listener in publication order and never after the
///   terminal notification
/// - `LoadingView::end` returns before exactly one of `work_finished`,
///   `work_failed` or `work_cancelled` is called, all on the issuing thread
///
/// When completion and cancellation race, whichever first moves the state out
/// of `Running` decides the reported outcome: cancellation wins if requested
/// before the result is stored.
///
/// Clones share the same execution.
///
/// # Example
/// ```ignore
/// let worker = AppWorker::<String>::builder(&events, view)
///     .callback(FnCallback::new(|text| println!("{text}")))
///     .build();
/// worker.execute(|_ctx: &WorkContext<()>| Ok("ok".to_string()))?;
/// event_loop.run_until(|| worker.is_completed(), Duration::from_secs(1));
/// ```
pub struct AppWorker<R, U = ()> {
    shared: Arc<Shared<R, U>>,
}

impl<R, U> Clone for AppWorker<R, U> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R, U> AppWorker<R, U>
where
    R: Send + 'static,
    U: Send + 'static,
{
    /// Start building a worker bound to `view` that reports to `events`.
    pub fn builder(events: &EventLoopHandle, view: Arc<dyn LoadingView>) -> AppWorkerBuilder<R, U> {
        AppWorkerBuilder {
            events: events.clone(),
            view,
            callback: None,
            listener: None,
        }
    }

    /// A worker with neither callback nor listener.
    pub fn new(events: &EventLoopHandle, view: Arc<dyn LoadingView>) -> Self {
        Self::builder(events, view).build()
    }

    /// Run `runnable` on a worker thread.
    ///
    /// Must be called on the issuing thread: the view is started before this
    /// returns. Errors from the body and panics are delivered to
    /// [`WorkCallback::work_failed`].
    ///
    /// # Errors
    /// [`WorkerError::AlreadyExecuted`] if this worker already ran a work; no
    /// second computation is started.
    pub fn execute<W>(&self, runnable: W) -> Result<(), WorkerError>
    where
        W: WorkRunnable<R, U>,
    {
        self.begin()?;

        let ctx = self.context();
        let shared = Arc::clone(&self.shared);
        self.shared.events.runtime().spawn_blocking(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| runnable.run(&ctx))) {
                Ok(Ok(result)) => Outcome::Finished(result),
                Ok(Err(error)) => Outcome::Failed(WorkError::Failed(error)),
                Err(payload) => Outcome::Failed(WorkError::from_panic(payload)),
            };
            shared.complete(outcome);
        });
        Ok(())
    }

    /// Run an async work body on the runtime.
    ///
    /// Same guarantees as [`execute`](Self::execute). A successful
    /// [`cancel`](Self::cancel) also aborts the future at its next await point.
    pub fn execute_async<F, Fut>(&self, factory: F) -> Result<(), WorkerError>
    where
        F: FnOnce(WorkContext<U>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    {
        self.begin()?;

        let ctx = self.context();
        let token = self.shared.token.clone();
        let shared = Arc::clone(&self.shared);
        self.shared.events.runtime().spawn(async move {
            // The factory runs inside the task so a panic while building the
            // future is reported like one raised by the future.
            let mut task = tokio::spawn(async move { factory(ctx).await });
            tokio::select! {
                joined = &mut task => {
                    let outcome = match joined {
                        Ok(Ok(result)) => Outcome::Finished(result),
                        Ok(Err(error)) => Outcome::Failed(WorkError::Failed(error)),
                        Err(error) if error.is_panic() => {
                            Outcome::Failed(WorkError::from_panic(error.into_panic()))
                        }
                        Err(_) => Outcome::Cancelled,
                    };
                    shared.complete(outcome);
                }
                _ = token.cancelled() => {
                    task.abort();
                    tracing::debug!(worker = shared.id, "Aborted async work after cancellation");
                }
            }
        });
        Ok(())
    }

    fn begin(&self) -> Result<(), WorkerError> {
        let started = self.shared.state.compare_exchange(
            WorkState::New as u8,
            WorkState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if started.is_err() {
            tracing::error!(worker = self.shared.id, "Rejected second execution of a one-shot worker");
            return Err(WorkerError::AlreadyExecuted);
        }

        tracing::debug!(worker = self.shared.id, "Starting background work");
        self.shared.events.metrics().record_started();
        self.shared.view.start();
        Ok(())
    }

    fn context(&self) -> WorkContext<U> {
        WorkContext {
            publisher: Box::new(self.clone()),
            token: self.shared.token.clone(),
        }
    }

    /// Publish an update to the issuing thread.
    ///
    /// Called from the work body; returns immediately. Values are delivered to
    /// the listener in order, possibly several per batch. Updates issued after
    /// the work was cancelled are dropped.
    ///
    /// # Errors
    /// [`WorkerError::NotExecuted`] before [`execute`](Self::execute),
    /// [`WorkerError::UpdatesNotEnabled`] if no listener was supplied.
    pub fn update(&self, value: U) -> Result<(), WorkerError> {
        self.shared.publish(value)
    }

    /// Request cancellation of the running work.
    ///
    /// Returns `false` if the work never started or already reached a terminal
    /// state on its own. Otherwise returns `true`, also on repeated calls, until
    /// the cancellation has been delivered. The body keeps running unless it
    /// polls its [`CancellationToken`] or is async; its result is discarded.
    pub fn cancel(&self) -> bool {
        loop {
            match self.shared.state() {
                WorkState::New | WorkState::Completed | WorkState::Failed => return false,
                WorkState::Cancelled => return !self.shared.dispatched.load(Ordering::Acquire),
                WorkState::Running => {
                    if self.shared.transition(WorkState::Cancelled).is_ok() {
                        tracing::info!(worker = self.shared.id, "Cancellation requested");
                        self.shared.token.cancel();
                        self.shared.schedule_dispatch(Outcome::Cancelled);
                        return true;
                    }
                    // Lost the race against completion; re-read the state.
                }
            }
        }
    }

    /// Whether the work was cancelled before its result was stored.
    pub fn is_cancelled(&self) -> bool {
        self.shared.state() == WorkState::Cancelled
    }

    /// Whether the terminal notification has been dispatched.
    pub fn is_completed(&self) -> bool {
        self.shared.dispatched.load(Ordering::Acquire)
    }

    pub fn state(&self) -> WorkState {
        self.shared.state()
    }

    /// Token observed by the work body.
    pub fn token(&self) -> &CancellationToken {
        &self.shared.token
    }
}

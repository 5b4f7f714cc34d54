// ProgressWorkManager - AppWorker + Progress + ProgressLoadingView
//
// The work body owns a private copy of the configured Progress and mutates it
// on the worker thread. Each `update()` publishes a snapshot through the worker's
// update channel; the issuing thread forwards the latest snapshot of every batch
// to the view as a fraction.

use crate::ui::bridge::EventLoopHandle;
use crate::work::cancel::CancellationToken;
use crate::work::contracts::{LoadingView, ProgressLoadingView, WorkCallback, WorkRunnableListener};
use crate::work::progress::Progress;
use crate::work::worker::{AppWorker, WorkContext, WorkerError};
use std::sync::Arc;

struct ProgressListener<V: ?Sized> {
    view: Arc<V>,
}

impl<V> WorkRunnableListener<Progress> for ProgressListener<V>
where
    V: ProgressLoadingView + ?Sized,
{
    fn update(&mut self, updates: Vec<Progress>) {
        if let Some(latest) = updates.last() {
            self.view.set_progress(latest.fraction());
        }
    }
}

/// Progress-reporting handle passed to the work body of a [`ProgressWorkManager`].
pub struct ProgressContext<'a> {
    progress: Progress,
    ctx: &'a WorkContext<Progress>,
}

impl ProgressContext<'_> {
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Mutate the worker-side progress. Call [`update`](Self::update) to show it.
    pub fn progress_mut(&mut self) -> &mut Progress {
        &mut self.progress
    }

    /// Count `count` processed items and publish the new state.
    pub fn advance(&mut self, count: i64) -> Result<(), WorkerError> {
        self.progress.add(count);
        self.update()
    }

    /// Publish a snapshot of the current progress to the view.
    pub fn update(&self) -> Result<(), WorkerError> {
        self.ctx.update(self.progress)
    }

    pub fn is_cancelled(&self) -> bool {
        self.ctx.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        self.ctx.token()
    }
}

/// Runs one work while driving a [`ProgressLoadingView`].
///
/// # Example
/// ```ignore
/// let manager = ProgressWorkManager::with_size(&events, view, None, files.len() as i64);
/// manager.execute(move |progress| {
///     for file in files {
///         process(file)?;
///         progress.advance(1)?;
///     }
///     Ok(())
/// })?;
/// ```
pub struct ProgressWorkManager<R> {
    worker: AppWorker<R, Progress>,
    progress: Progress,
}

impl<R> ProgressWorkManager<R>
where
    R: Send + 'static,
{
    /// A manager whose progress size is unknown until the work sets it.
    pub fn new<V>(
        events: &EventLoopHandle,
        view: Arc<V>,
        callback: Option<Box<dyn WorkCallback<R>>>,
    ) -> Self
    where
        V: ProgressLoadingView + 'static,
    {
        Self::with_progress(events, view, callback, Progress::new())
    }

    /// A manager expecting `size` units of work.
    pub fn with_size<V>(
        events: &EventLoopHandle,
        view: Arc<V>,
        callback: Option<Box<dyn WorkCallback<R>>>,
        size: i64,
    ) -> Self
    where
        V: ProgressLoadingView + 'static,
    {
        Self::with_progress(events, view, callback, Progress::with_size(size))
    }

    fn with_progress<V>(
        events: &EventLoopHandle,
        view: Arc<V>,
        callback: Option<Box<dyn WorkCallback<R>>>,
        progress: Progress,
    ) -> Self
    where
        V: ProgressLoadingView + 'static,
    {
        let loading_view: Arc<dyn LoadingView> = view.clone();
        let mut builder =
            AppWorker::builder(events, loading_view).listener(ProgressListener { view });
        if let Some(callback) = callback {
            builder = builder.callback(callback);
        }

        Self {
            worker: builder.build(),
            progress,
        }
    }

    /// Progress the work body starts from.
    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// Adjust the starting progress before [`execute`](Self::execute).
    pub fn progress_mut(&mut self) -> &mut Progress {
        &mut self.progress
    }

    /// The inner worker, for cancellation and state queries.
    pub fn worker(&self) -> &AppWorker<R, Progress> {
        &self.worker
    }

    /// Publish `progress` through the worker's update channel.
    ///
    /// Same rules as [`AppWorker::update`]: only valid while the work runs.
    pub fn update(&self, progress: &Progress) -> Result<(), WorkerError> {
        self.worker.update(*progress)
    }

    /// Run `runnable` on a worker thread, see [`AppWorker::execute`].
    pub fn execute<F>(&self, runnable: F) -> Result<(), WorkerError>
    where
        F: FnOnce(&mut ProgressContext<'_>) -> anyhow::Result<R> + Send + 'static,
    {
        let initial = self.progress;
        self.worker.execute(move |ctx: &WorkContext<Progress>| {
            let mut progress = ProgressContext {
                progress: initial,
                ctx,
            };
            runnable(&mut progress)
        })
    }
}

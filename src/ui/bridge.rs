// EventLoop - the issuing thread's mailbox
//
// Background work runs on tokio's blocking pool (or as tokio tasks), while every
// call into UI-facing objects must happen on the single issuing thread. The
// event loop is the explicit replacement for a GUI toolkit's dispatch queue:
// - worker threads enqueue closures through a cloneable EventLoopHandle
// - the issuing thread owns the EventLoop and runs the closures in FIFO order

use crate::metrics::Metrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

type Job = Box<dyn FnOnce() + Send>;

enum Event {
    Invoke(Job),
    Quit,
}

/// Mailbox drained by the issuing thread.
///
/// Create it on the thread that owns the UI-facing objects and keep it there.
/// Dispatch with [`run`](Self::run) (blocks until [`EventLoopHandle::quit`]),
/// [`run_pending`](Self::run_pending) (non-blocking) or
/// [`run_until`](Self::run_until) (blocking with a deadline).
///
/// The blocking methods must not be called from inside a tokio runtime thread,
/// and the runtime behind the handle must be multi-threaded so its timer keeps
/// running while the issuing thread waits.
///
/// # Example
/// ```ignore
/// let runtime = tokio::runtime::Runtime::new()?;
/// let mut event_loop = EventLoop::new(runtime.handle().clone());
/// let events = event_loop.handle();
///
/// std::thread::spawn(move || {
///     events.invoke(|| println!("runs on the issuing thread"));
///     events.quit();
/// });
/// event_loop.run();
/// ```
pub struct EventLoop {
    rx: mpsc::UnboundedReceiver<Event>,
    handle: EventLoopHandle,
}

impl EventLoop {
    /// Create an event loop whose work is spawned on `tokio_handle`.
    pub fn new(tokio_handle: tokio::runtime::Handle) -> Self {
        Self::with_metrics(tokio_handle, Arc::new(Metrics::new()))
    }

    /// Create an event loop that records worker activity into `metrics`.
    pub fn with_metrics(tokio_handle: tokio::runtime::Handle, metrics: Arc<Metrics>) -> Self {
        // Unbounded: an update must never be dropped because the UI lags.
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            handle: EventLoopHandle {
                tx,
                tokio_handle,
                metrics,
            },
        }
    }

    /// Get a cloneable handle to post work to this loop.
    pub fn handle(&self) -> EventLoopHandle {
        self.handle.clone()
    }

    /// Dispatch events until [`EventLoopHandle::quit`] is called.
    pub fn run(&mut self) {
        tracing::debug!("Event loop started");
        while let Some(event) = self.rx.blocking_recv() {
            match event {
                Event::Invoke(job) => job(),
                Event::Quit => break,
            }
        }
        tracing::debug!("Event loop stopped");
    }

    /// Dispatch every event already queued without blocking.
    ///
    /// A quit request is consumed and ignored. Returns the number of closures run.
    pub fn run_pending(&mut self) -> usize {
        let mut dispatched = 0;
        while let Ok(event) = self.rx.try_recv() {
            if let Event::Invoke(job) = event {
                job();
                dispatched += 1;
            }
        }
        dispatched
    }

    /// Dispatch events until `done` returns `true` or `timeout` elapses.
    ///
    /// Returns the final value of `done`.
    pub fn run_until<F>(&mut self, mut done: F, timeout: Duration) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_pending();
            if done() {
                return true;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }

            let rx = &mut self.rx;
            let next = self
                .handle
                .tokio_handle
                .block_on(async { tokio::time::timeout(remaining, rx.recv()).await });
            match next {
                Ok(Some(Event::Invoke(job))) => job(),
                Ok(Some(Event::Quit)) | Ok(None) | Err(_) => return done(),
            }
        }
    }
}

/// Cloneable, thread-safe handle to an [`EventLoop`].
#[derive(Clone)]
pub struct EventLoopHandle {
    tx: mpsc::UnboundedSender<Event>,
    tokio_handle: tokio::runtime::Handle,
    metrics: Arc<Metrics>,
}

impl EventLoopHandle {
    /// Schedule `job` to run on the issuing thread after everything queued before it.
    ///
    /// Returns `false` if the event loop is gone.
    pub fn invoke<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(Event::Invoke(Box::new(job))).is_err() {
            tracing::warn!("Failed to queue job - event loop has been dropped");
            return false;
        }
        true
    }

    /// Ask [`EventLoop::run`] to return once the events queued before this call ran.
    pub fn quit(&self) {
        if self.tx.send(Event::Quit).is_err() {
            tracing::debug!("Quit requested on a dropped event loop");
        }
    }

    /// Runtime on which background work is spawned.
    pub fn runtime(&self) -> &tokio::runtime::Handle {
        &self.tokio_handle
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

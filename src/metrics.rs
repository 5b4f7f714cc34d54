// Worker metrics module
//
// Lightweight counters describing background work activity

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters for background work executed through one event loop
///
/// Uses atomic operations so worker threads and the issuing thread can record
/// without locks. Shared as `Arc<Metrics>` through
/// [`EventLoopHandle::metrics`](crate::ui::EventLoopHandle::metrics).
#[derive(Debug)]
pub struct Metrics {
    /// Executions that left the NEW state
    pub executions_started: AtomicU64,

    /// Executions delivered as `work_finished`
    pub executions_finished: AtomicU64,

    /// Executions delivered as `work_failed`
    pub executions_failed: AtomicU64,

    /// Executions delivered as `work_cancelled`
    pub executions_cancelled: AtomicU64,

    /// Results produced after cancellation won and thrown away
    pub results_discarded: AtomicU64,

    /// Updates accepted for delivery
    pub updates_published: AtomicU64,

    /// Updates issued after termination and never delivered
    pub updates_dropped: AtomicU64,

    /// Batches handed to listeners
    pub batches_delivered: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            executions_started: AtomicU64::new(0),
            executions_finished: AtomicU64::new(0),
            executions_failed: AtomicU64::new(0),
            executions_cancelled: AtomicU64::new(0),
            results_discarded: AtomicU64::new(0),
            updates_published: AtomicU64::new(0),
            updates_dropped: AtomicU64::new(0),
            batches_delivered: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_started(&self) {
        self.executions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_finished(&self) {
        self.executions_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.executions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.executions_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_result_discarded(&self) {
        self.results_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_update_published(&self) {
        self.updates_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_updates_dropped(&self, count: usize) {
        self.updates_dropped
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_batch_delivered(&self) {
        self.batches_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Executions started but not delivered yet
    pub fn in_flight(&self) -> u64 {
        let started = self.executions_started.load(Ordering::Relaxed);
        let done = self.executions_finished.load(Ordering::Relaxed)
            + self.executions_failed.load(Ordering::Relaxed)
            + self.executions_cancelled.load(Ordering::Relaxed);
        started.saturating_sub(done)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average number of updates coalesced into one listener batch
    pub fn avg_batch_size(&self) -> f64 {
        let batches = self.batches_delivered.load(Ordering::Relaxed);
        if batches == 0 {
            return 0.0;
        }
        let delivered = self
            .updates_published
            .load(Ordering::Relaxed)
            .saturating_sub(self.updates_dropped.load(Ordering::Relaxed));
        delivered as f64 / batches as f64
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Background Work Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Executions: {} started, {} finished, {} failed, {} cancelled",
            self.executions_started.load(Ordering::Relaxed),
            self.executions_finished.load(Ordering::Relaxed),
            self.executions_failed.load(Ordering::Relaxed),
            self.executions_cancelled.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Updates: {} published, {} dropped, {} batches (avg {:.1} per batch)",
            self.updates_published.load(Ordering::Relaxed),
            self.updates_dropped.load(Ordering::Relaxed),
            self.batches_delivered.load(Ordering::Relaxed),
            self.avg_batch_size()
        );
        tracing::info!(
            "Results discarded after cancellation: {}",
            self.results_discarded.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Sentinel size meaning "the number of items is not known yet".
pub const UNKNOWN_SIZE: i64 = -1;

/// Counter of processed items against a total.
///
/// `Progress` is a plain value: the work body owns and mutates it on the worker
/// thread, and the issuing thread only ever sees copies of it delivered through
/// the update channel (see [`crate::work::ProgressWorkManager`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    size: i64,
    processed: i64,
}

impl Progress {
    /// Create a progress with an unknown size.
    pub fn new() -> Self {
        Self::with_size(UNKNOWN_SIZE)
    }

    /// Create a progress for `size` items. Sizes below 1 mean unknown.
    pub fn with_size(size: i64) -> Self {
        let mut progress = Self {
            size: UNKNOWN_SIZE,
            processed: 0,
        };
        progress.set_size(size);
        progress
    }

    /// Set the number of items to process and reset the processed counter.
    pub fn set_size(&mut self, size: i64) {
        self.size = if size < 1 { UNKNOWN_SIZE } else { size };
        self.processed = 0;
    }

    /// Count `items` more processed items. The counter saturates at `i64::MAX`.
    pub fn add(&mut self, items: i64) {
        self.processed = self.processed.saturating_add(items);
    }

    /// Count one processed item.
    pub fn add_one(&mut self) {
        self.add(1);
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn processed(&self) -> i64 {
        self.processed
    }

    pub fn is_size_known(&self) -> bool {
        self.size != UNKNOWN_SIZE
    }

    /// Fraction of the work done, in `[0, 1]`.
    ///
    /// Returns 0 while the size is unknown. The processed counter may run past
    /// the size; the result is clamped to 1.
    pub fn fraction(&self) -> f32 {
        if !self.is_size_known() {
            return 0.0;
        }
        let fraction = self.processed as f32 / self.size as f32;
        fraction.clamp(0.0, 1.0)
    }

    /// Same as [`fraction`](Self::fraction) scaled to `[0, 100]`.
    pub fn percentage(&self) -> f32 {
        self.fraction() * 100.0
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

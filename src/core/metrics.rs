//! Logger metrics for observability
//!
//! Counters for the conditions the asynchronous path deliberately does not
//! report per message: dropped items under overload, writes that found no
//! usable descriptor, truncated lines and failed index updates.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for logger observability
///
/// # Example
///
/// ```
/// use rust_session_logger::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
///
/// metrics.record_dropped();
/// metrics.record_written();
///
/// assert_eq!(metrics.dropped_count(), 1);
/// assert_eq!(metrics.total_written(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Messages dropped because the work-item pool was empty
    dropped_count: AtomicU64,

    /// Lines written to the primary log file
    total_written: AtomicU64,

    /// Writes skipped because the session had no usable descriptor or the
    /// write itself failed
    unwritable_count: AtomicU64,

    /// Lines shortened to fit a work item
    truncated_count: AtomicU64,

    /// Index records that could not be written
    index_failures: AtomicU64,

    /// Number of times a producer blocked waiting for a free work item
    block_events: AtomicU64,
}

impl LoggerMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            dropped_count: AtomicU64::new(0),
            total_written: AtomicU64::new(0),
            unwritable_count: AtomicU64::new(0),
            truncated_count: AtomicU64::new(0),
            index_failures: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn total_written(&self) -> u64 {
        self.total_written.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn unwritable_count(&self) -> u64 {
        self.unwritable_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn truncated_count(&self) -> u64 {
        self.truncated_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn index_failures(&self) -> u64 {
        self.index_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    /// Record a dropped message, returning the previous count
    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped_count.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_written(&self) -> u64 {
        self.total_written.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_unwritable(&self) -> u64 {
        self.unwritable_count.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_truncated(&self) -> u64 {
        self.truncated_count.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_index_failure(&self) -> u64 {
        self.index_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    /// Get drop rate as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if nothing has been written or dropped yet.
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped_count() as f64;
        let total = self.total_written() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.dropped_count.store(0, Ordering::Relaxed);
        self.total_written.store(0, Ordering::Relaxed);
        self.unwritable_count.store(0, Ordering::Relaxed);
        self.truncated_count.store(0, Ordering::Relaxed);
        self.index_failures.store(0, Ordering::Relaxed);
        self.block_events.store(0, Ordering::Relaxed);
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            dropped_count: AtomicU64::new(self.dropped_count()),
            total_written: AtomicU64::new(self.total_written()),
            unwritable_count: AtomicU64::new(self.unwritable_count()),
            truncated_count: AtomicU64::new(self.truncated_count()),
            index_failures: AtomicU64::new(self.index_failures()),
            block_events: AtomicU64::new(self.block_events()),
        }
    }
}

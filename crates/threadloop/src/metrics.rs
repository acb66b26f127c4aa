//! Dispatch metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters for a dispatch context.
#[derive(Debug, Default)]
pub struct LoopMetrics {
    /// Total sources attached.
    pub attached: AtomicU64,

    /// Total callbacks dispatched.
    pub dispatched: AtomicU64,

    /// Total sources explicitly removed.
    pub removed: AtomicU64,

    /// Total sources discarded at teardown.
    pub discarded: AtomicU64,

    /// Total wakeups requested while the dispatcher was parked.
    pub wakeups: AtomicU64,

    /// Total dispatch iterations.
    pub iterations: AtomicU64,

    /// Start time.
    start_time: parking_lot::RwLock<Option<Instant>>,
}

impl LoopMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of dispatching.
    pub fn mark_start(&self) {
        *self.start_time.write() = Some(Instant::now());
    }

    /// Get uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time
            .read()
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0)
    }

    pub(crate) fn record_attached(&self) {
        self.attached.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removed(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_wakeup(&self) {
        self.wakeups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of the metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            attached: self.attached.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            wakeups: self.wakeups.load(Ordering::Relaxed),
            iterations: self.iterations.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub attached: u64,
    pub dispatched: u64,
    pub removed: u64,
    pub discarded: u64,
    pub wakeups: u64,
    pub iterations: u64,
}

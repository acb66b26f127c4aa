//! Source definitions: priorities, identifiers and schedulable units.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Dispatch priority of a source.
///
/// Numerically lower values dispatch first. Sources with equal priority
/// dispatch in attach order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Priority(pub i32);

impl Priority {
    /// Urgent work that should preempt everything else pending.
    pub const HIGH: Priority = Priority(-100);
    /// Default priority for timeout sources.
    pub const DEFAULT: Priority = Priority(0);
    /// Idle work that should still beat ordinary idle sources.
    pub const HIGH_IDLE: Priority = Priority(100);
    /// Default priority for idle sources.
    pub const DEFAULT_IDLE: Priority = Priority(200);
    /// Background work, dispatched only when nothing else is pending.
    pub const LOW: Priority = Priority(300);
}

impl Default for Priority {
    fn default() -> Self {
        Priority::DEFAULT
    }
}

/// Identifier of an attached source.
///
/// Identifiers are process-local and non-zero when scheduling succeeded;
/// [`SourceId::NONE`] (zero) means the call did not schedule anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(u64);

impl SourceId {
    /// The "not scheduled" sentinel.
    pub const NONE: SourceId = SourceId(0);

    pub(crate) fn new(raw: u64) -> Self {
        SourceId(raw)
    }

    /// Raw numeric value.
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Whether this identifier refers to a source that was actually attached.
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value returned by a source callback to decide its fate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    /// Stay attached: an idle source re-enters the ready set, a timeout
    /// source re-arms for another interval.
    Keep,
    /// Detach after this run; the cleanup hook fires.
    Remove,
}

/// Boxed source callback.
pub(crate) type SourceFn = Box<dyn FnMut() -> SourceStatus + Send + 'static>;

/// One-shot hook invoked when a source is finally detached: fired and
/// removed, explicitly removed, or discarded at context teardown.
pub type CleanupFn = Box<dyn FnOnce() + Send + 'static>;

/// What kind of source this is.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SourceKind {
    Idle,
    Timeout { interval: Duration },
}

/// An attached source, as stored in the context registry.
pub(crate) struct Source {
    pub(crate) priority: Priority,
    pub(crate) kind: SourceKind,
    pub(crate) callback: SourceFn,
    pub(crate) cleanup: Option<CleanupFn>,
}

impl Source {
    /// Consume the source, firing its cleanup hook.
    pub(crate) fn detach(mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

/// Heap key ordering ready sources most-urgent-first.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReadyKey {
    pub(crate) priority: Priority,
    pub(crate) seq: u64,
    pub(crate) id: u64,
}

impl PartialEq for ReadyKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ReadyKey {}

impl PartialOrd for ReadyKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadyKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Lowest (priority, seq) pops first (reverse for the max-heap).
        match other.priority.cmp(&self.priority) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

/// Heap key ordering pending timers earliest-due-first.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TimerKey {
    pub(crate) due: Instant,
    pub(crate) seq: u64,
    pub(crate) id: u64,
}

impl PartialEq for TimerKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TimerKey {}

impl PartialOrd for TimerKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerKey {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earliest due time pops first (reverse for the max-heap).
        match other.due.cmp(&self.due) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

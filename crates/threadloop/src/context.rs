//! The dispatch context: a registry of pending sources drained by a single
//! worker thread.
//!
//! Attaching and removing sources is safe from any thread; the registry
//! mutex serializes every mutation, so a schedule call atomically either
//! lands the source or is rejected. Running the context is exclusive: the
//! dispatching thread [`acquire`](DispatchContext::acquire)s it and is the
//! only thread allowed to [`iterate`](DispatchContext::iterate). Sources
//! dispatch one at a time, lowest priority value first, attach order among
//! equals.

use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use crate::config::LoopConfig;
use crate::error::{LoopError, LoopResult};
use crate::metrics::LoopMetrics;
use crate::source::{
    CleanupFn, Priority, ReadyKey, Source, SourceFn, SourceId, SourceKind, SourceStatus,
    TimerKey,
};

/// Registry state guarded by the context mutex.
#[derive(Default)]
struct ContextInner {
    /// Sources ready to dispatch, most urgent first.
    ready: BinaryHeap<ReadyKey>,

    /// Armed timers, earliest due first.
    timers: BinaryHeap<TimerKey>,

    /// Attached sources by identifier. Heap keys whose identifier is no
    /// longer here are stale and skipped when popped.
    sources: HashMap<u64, Source>,

    /// Identifier of the source whose callback is currently executing.
    running: Option<u64>,

    /// A removal arrived for `running` mid-dispatch; suppress its re-queue.
    running_cancelled: bool,

    /// Monotonic attach sequence; orders equal priorities.
    seq: u64,

    /// Set once by `teardown`; attaches are rejected afterwards.
    torn_down: bool,
}

/// The registry of pending sources for one dispatching thread.
pub struct DispatchContext {
    inner: Mutex<ContextInner>,
    cond: Condvar,
    next_id: AtomicU64,
    owner: Mutex<Option<ThreadId>>,
    max_pending: usize,
    metrics: LoopMetrics,
}

impl DispatchContext {
    /// Create a context with the default pending-source limit.
    pub fn new() -> Self {
        Self::with_limit(LoopConfig::default().max_pending_sources)
    }

    /// Create a context that rejects attaches past `max_pending` sources.
    pub fn with_limit(max_pending: usize) -> Self {
        Self {
            inner: Mutex::new(ContextInner::default()),
            cond: Condvar::new(),
            next_id: AtomicU64::new(1),
            owner: Mutex::new(None),
            max_pending,
            metrics: LoopMetrics::new(),
        }
    }

    /// Get the dispatch metrics.
    pub fn metrics(&self) -> &LoopMetrics {
        &self.metrics
    }

    /// Number of currently attached sources.
    pub fn pending_sources(&self) -> usize {
        self.inner.lock().sources.len()
    }

    /// Whether the context has been torn down.
    pub fn is_torn_down(&self) -> bool {
        self.inner.lock().torn_down
    }

    // ========================================================================
    // Attach / remove
    // ========================================================================

    /// Attach an idle source: fires once the dispatcher has no more urgent
    /// pending work. Returns [`SourceId::NONE`] if the context is torn down
    /// or full; the cleanup hook still fires in that case.
    pub fn attach_idle<F>(
        &self,
        priority: Priority,
        callback: F,
        cleanup: Option<CleanupFn>,
    ) -> SourceId
    where
        F: FnMut() -> SourceStatus + Send + 'static,
    {
        self.attach(priority, SourceKind::Idle, Box::new(callback), cleanup)
    }

    /// Attach a timeout source: fires after `interval`, and keeps re-arming
    /// for as long as the callback returns [`SourceStatus::Keep`].
    pub fn attach_timeout<F>(
        &self,
        priority: Priority,
        interval: Duration,
        callback: F,
        cleanup: Option<CleanupFn>,
    ) -> SourceId
    where
        F: FnMut() -> SourceStatus + Send + 'static,
    {
        self.attach(
            priority,
            SourceKind::Timeout { interval },
            Box::new(callback),
            cleanup,
        )
    }

    fn attach(
        &self,
        priority: Priority,
        kind: SourceKind,
        callback: SourceFn,
        cleanup: Option<CleanupFn>,
    ) -> SourceId {
        let mut inner = self.inner.lock();

        if inner.torn_down {
            drop(inner);
            debug!("attach rejected: context is torn down");
            if let Some(cleanup) = cleanup {
                cleanup();
            }
            return SourceId::NONE;
        }

        if inner.sources.len() >= self.max_pending {
            drop(inner);
            warn!(
                "attach rejected: {} sources already pending",
                self.max_pending
            );
            if let Some(cleanup) = cleanup {
                cleanup();
            }
            return SourceId::NONE;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        inner.seq += 1;
        let seq = inner.seq;

        match kind {
            SourceKind::Idle => {
                inner.ready.push(ReadyKey { priority, seq, id });
            }
            SourceKind::Timeout { interval } => {
                inner.timers.push(TimerKey {
                    due: Instant::now() + interval,
                    seq,
                    id,
                });
            }
        }
        inner.sources.insert(
            id,
            Source {
                priority,
                kind,
                callback,
                cleanup,
            },
        );
        drop(inner);

        self.metrics.record_attached();
        self.cond.notify_one();
        trace!("source {} attached (priority {:?})", id, priority);
        SourceId::new(id)
    }

    /// Detach a source before it fires, running its cleanup hook.
    ///
    /// Removing an unknown or already-detached identifier is a safe no-op
    /// returning `false`. Removing a source whose callback is currently
    /// executing lets the callback finish but suppresses its re-queue.
    pub fn remove(&self, id: SourceId) -> bool {
        if !id.is_valid() {
            return false;
        }

        let mut inner = self.inner.lock();
        if let Some(source) = inner.sources.remove(&id.raw()) {
            drop(inner);
            self.metrics.record_removed();
            debug!("source {} removed", id);
            source.detach();
            // The next timer deadline may have changed.
            self.cond.notify_all();
            return true;
        }

        if inner.running == Some(id.raw()) {
            inner.running_cancelled = true;
            drop(inner);
            self.metrics.record_removed();
            debug!("source {} flagged for removal mid-dispatch", id);
            return true;
        }

        false
    }

    // ========================================================================
    // Ownership
    // ========================================================================

    /// Take exclusive run-ownership of the context for the calling thread.
    pub fn acquire(&self) -> LoopResult<()> {
        let mut owner = self.owner.lock();
        match *owner {
            Some(existing) if existing != thread::current().id() => {
                Err(LoopError::ContextAcquired)
            }
            _ => {
                *owner = Some(thread::current().id());
                Ok(())
            }
        }
    }

    /// Release run-ownership. A no-op if the calling thread is not the owner.
    pub fn release(&self) {
        let mut owner = self.owner.lock();
        if *owner == Some(thread::current().id()) {
            *owner = None;
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Run at most one ready source.
    ///
    /// Due timers are promoted into the ready set first. With nothing ready
    /// and `may_block` set, parks until the next timer deadline or a
    /// [`wakeup`](Self::wakeup). Returns `true` if a source was dispatched,
    /// `false` if the call returned without dispatching (nothing pending,
    /// woken up, or the context is owned by another thread).
    pub fn iterate(&self, may_block: bool) -> bool {
        {
            let owner = self.owner.lock();
            if let Some(owner) = *owner {
                if owner != thread::current().id() {
                    warn!("iterate called from a thread that does not own the context");
                    return false;
                }
            }
        }
        self.metrics.record_iteration();

        let mut inner = self.inner.lock();
        loop {
            // Promote due timers into the ready set.
            let now = Instant::now();
            while inner.timers.peek().is_some_and(|t| t.due <= now) {
                let key = inner.timers.pop().unwrap();
                let priority = inner.sources.get(&key.id).map(|s| s.priority);
                if let Some(priority) = priority {
                    inner.seq += 1;
                    let seq = inner.seq;
                    inner.ready.push(ReadyKey {
                        priority,
                        seq,
                        id: key.id,
                    });
                }
                // A stale key belongs to a source removed while armed.
            }

            // Pop the most urgent ready source that is still attached.
            let mut picked = None;
            while let Some(key) = inner.ready.pop() {
                if let Some(source) = inner.sources.remove(&key.id) {
                    picked = Some((key.id, source));
                    break;
                }
            }
            if let Some((id, source)) = picked {
                return self.dispatch_source(inner, id, source);
            }

            if !may_block || inner.torn_down {
                return false;
            }

            // Park until the next timer comes due or a wakeup arrives.
            match inner.timers.peek().map(|t| t.due) {
                Some(due) => {
                    if !self.cond.wait_until(&mut inner, due).timed_out() {
                        return false;
                    }
                    // Deadline passed: promote on the next pass.
                }
                None => {
                    self.cond.wait(&mut inner);
                    return false;
                }
            }
        }
    }

    /// Wake a dispatcher parked inside [`iterate`](Self::iterate).
    pub fn wakeup(&self) {
        self.metrics.record_wakeup();
        self.cond.notify_all();
    }

    fn dispatch_source(
        &self,
        mut inner: MutexGuard<'_, ContextInner>,
        id: u64,
        mut source: Source,
    ) -> bool {
        // Save the surrounding dispatch bookkeeping so a callback that
        // recursively iterates the context does not clobber it.
        let prev_running = inner.running;
        let prev_cancelled = inner.running_cancelled;
        inner.running = Some(id);
        inner.running_cancelled = false;
        drop(inner);

        trace!("dispatching source {}", id);
        let status = (source.callback)();
        self.metrics.record_dispatched();

        let mut inner = self.inner.lock();
        let cancelled = inner.running_cancelled;
        inner.running = prev_running;
        inner.running_cancelled = prev_cancelled;

        if cancelled || inner.torn_down || status == SourceStatus::Remove {
            drop(inner);
            source.detach();
            return true;
        }

        // Keep: idle sources re-enter the ready set, timers re-arm.
        inner.seq += 1;
        let seq = inner.seq;
        match source.kind {
            SourceKind::Idle => {
                let key = ReadyKey {
                    priority: source.priority,
                    seq,
                    id,
                };
                inner.ready.push(key);
            }
            SourceKind::Timeout { interval } => {
                inner.timers.push(TimerKey {
                    due: Instant::now() + interval,
                    seq,
                    id,
                });
            }
        }
        inner.sources.insert(id, source);
        true
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Discard every pending source, firing each cleanup hook exactly once.
    ///
    /// Idempotent. Attaches made after teardown are rejected with the
    /// sentinel identifier.
    pub fn teardown(&self) {
        let mut inner = self.inner.lock();
        if inner.torn_down {
            return;
        }
        inner.torn_down = true;
        inner.ready.clear();
        inner.timers.clear();
        let sources: Vec<Source> = inner.sources.drain().map(|(_, s)| s).collect();
        drop(inner);

        if !sources.is_empty() {
            debug!("discarding {} pending sources at teardown", sources.len());
        }
        self.metrics.record_discarded(sources.len() as u64);
        for source in sources {
            source.detach();
        }
        self.cond.notify_all();
    }
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;

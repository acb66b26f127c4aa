//! A dispatch loop running on a dedicated background thread.
//!
//! [`LoopThread`] decouples the lifecycle of an event-processing thread
//! from the callers that need to schedule work onto it. Construction spawns
//! the worker and blocks until it owns a live [`DispatchContext`], so the
//! very first schedule call can succeed. Any thread may then schedule idle
//! or timeout callbacks; they execute serially on the worker thread, never
//! on the calling thread. [`close`](LoopThread::close) delivers the quit
//! request as ordinary idle work, so everything already queued at
//! equal-or-higher priority drains first, then reaps the worker.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::config::LoopConfig;
use crate::context::DispatchContext;
use crate::run_loop::RunLoop;
use crate::source::{CleanupFn, Priority, SourceId, SourceStatus};
use crate::state::LoopState;

/// Lifecycle flag shared between the handle and its worker.
#[derive(Debug)]
struct SharedState {
    state: AtomicU8,
}

impl SharedState {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(LoopState::Starting as u8),
        }
    }

    fn get(&self) -> LoopState {
        LoopState::from(self.state.load(Ordering::SeqCst))
    }

    /// Advance to `state` unless the machine is already past it.
    /// Returns the previous state.
    fn advance(&self, state: LoopState) -> LoopState {
        LoopState::from(self.state.fetch_max(state as u8, Ordering::SeqCst))
    }
}

/// An event loop on a dedicated background thread.
///
/// Dropping the handle closes the loop; see [`close`](Self::close).
pub struct LoopThread {
    context: Arc<DispatchContext>,
    run_loop: Arc<RunLoop>,
    shared: Arc<SharedState>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LoopThread {
    /// Create a loop with the default configuration.
    ///
    /// Blocks until the worker thread has a ready execution context.
    pub fn new() -> Self {
        Self::with_config(LoopConfig::default())
    }

    /// Start building a loop with a custom configuration.
    pub fn builder() -> LoopThreadBuilder {
        LoopThreadBuilder::new()
    }

    /// Create a loop with `config`.
    ///
    /// Construction never fails outwardly: if the worker cannot be spawned
    /// or never signals readiness, the returned handle is inert: its state
    /// reads [`LoopState::Stopped`] and every schedule call returns the
    /// sentinel. The failure is logged.
    pub fn with_config(config: LoopConfig) -> Self {
        let shared = Arc::new(SharedState::new());
        let (ready_tx, ready_rx) = mpsc::channel();

        let worker_shared = shared.clone();
        let limit = config.max_pending_sources;
        let spawned = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || worker_main(worker_shared, limit, ready_tx));

        let worker = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("failed to spawn loop worker: {}", e);
                None
            }
        };

        // One-shot rendezvous: block until the worker owns a live context.
        let ready = worker.as_ref().and_then(|_| ready_rx.recv().ok());
        let (context, run_loop) = match ready {
            Some(pair) => pair,
            None => {
                error!("loop worker unavailable; handle is inert");
                let context = Arc::new(DispatchContext::with_limit(limit));
                context.teardown();
                let run_loop = Arc::new(RunLoop::new(context.clone()));
                shared.advance(LoopState::Stopped);
                (context, run_loop)
            }
        };
        shared.advance(LoopState::Ready);

        Self {
            context,
            run_loop,
            shared,
            worker: Mutex::new(worker),
        }
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Schedule `callback` to run once the loop is otherwise idle, at
    /// [`Priority::DEFAULT_IDLE`].
    ///
    /// The callback runs on the worker thread. Returning
    /// [`SourceStatus::Keep`] re-queues it; [`SourceStatus::Remove`]
    /// detaches it after this run.
    pub fn schedule_idle<F>(&self, callback: F) -> SourceId
    where
        F: FnMut() -> SourceStatus + Send + 'static,
    {
        self.schedule_idle_full(Priority::DEFAULT_IDLE, callback, None)
    }

    /// Schedule idle work with an explicit priority and an optional hook
    /// that fires exactly once when the source is finally detached.
    ///
    /// Returns [`SourceId::NONE`] without scheduling anything when the loop
    /// is stopping or stopped.
    pub fn schedule_idle_full<F>(
        &self,
        priority: Priority,
        callback: F,
        cleanup: Option<CleanupFn>,
    ) -> SourceId
    where
        F: FnMut() -> SourceStatus + Send + 'static,
    {
        if self.shared.get() >= LoopState::Stopping {
            return SourceId::NONE;
        }
        self.context.attach_idle(priority, callback, cleanup)
    }

    /// Schedule `callback` to run after `interval`, at
    /// [`Priority::DEFAULT`]. It keeps firing every `interval` for as long
    /// as it returns [`SourceStatus::Keep`].
    pub fn schedule_timeout<F>(&self, interval: Duration, callback: F) -> SourceId
    where
        F: FnMut() -> SourceStatus + Send + 'static,
    {
        self.schedule_timeout_full(Priority::DEFAULT, interval, callback, None)
    }

    /// Schedule timeout work with an explicit priority and an optional
    /// detach hook. Returns [`SourceId::NONE`] when stopping or stopped.
    pub fn schedule_timeout_full<F>(
        &self,
        priority: Priority,
        interval: Duration,
        callback: F,
        cleanup: Option<CleanupFn>,
    ) -> SourceId
    where
        F: FnMut() -> SourceStatus + Send + 'static,
    {
        if self.shared.get() >= LoopState::Stopping {
            return SourceId::NONE;
        }
        self.context.attach_timeout(priority, interval, callback, cleanup)
    }

    /// Detach a scheduled source before it fires.
    ///
    /// Unknown or already-detached identifiers are a safe no-op.
    pub fn remove(&self, id: SourceId) -> bool {
        self.context.remove(id)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The execution context backing this loop, for collaborators that
    /// attach their own sources or hand the context to other library code.
    pub fn context(&self) -> &Arc<DispatchContext> {
        &self.context
    }

    /// Current lifecycle state.
    ///
    /// A healthy loop reads [`LoopState::Ready`]; a loop whose worker
    /// failed at startup settles at [`LoopState::Stopped`] and never
    /// dispatches, which is how callers can detect the degraded mode.
    pub fn state(&self) -> LoopState {
        self.shared.get()
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Stop the loop and reap the worker thread.
    ///
    /// Idempotent. The quit request travels as an ordinary idle source, so
    /// work already queued at equal-or-higher priority runs first; from the
    /// moment `close` starts, new schedule calls return the sentinel.
    /// Callable from within a dispatched callback, in which case the worker
    /// is not joined but left to finish once the callback returns.
    pub fn close(&self) {
        let previous = self.shared.advance(LoopState::Stopping);
        if previous < LoopState::Stopping {
            debug!("closing loop");
            let run_loop = self.run_loop.clone();
            self.context.attach_idle(
                Priority::DEFAULT_IDLE,
                move || {
                    run_loop.quit();
                    SourceStatus::Remove
                },
                None,
            );
        }

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                // Closing from inside a callback: the worker cannot join
                // itself; it finishes once the current callback returns.
                debug!("close called on the worker thread; skipping join");
            } else if handle.join().is_err() {
                error!("loop worker panicked");
            }
        }
    }
}

impl Default for LoopThread {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LoopThread {
    fn drop(&mut self) {
        self.close();
    }
}

/// Body of the dedicated worker thread.
fn worker_main(
    shared: Arc<SharedState>,
    limit: usize,
    ready_tx: mpsc::Sender<(Arc<DispatchContext>, Arc<RunLoop>)>,
) {
    let context = Arc::new(DispatchContext::with_limit(limit));
    let run_loop = Arc::new(RunLoop::new(context.clone()));

    // Release the constructing thread: the context now exists.
    let _ = ready_tx.send((context.clone(), run_loop.clone()));

    match context.acquire() {
        Ok(()) => {
            debug!("running dispatch loop");
            if let Err(e) = run_loop.run() {
                error!("dispatch loop error: {}", e);
            }
            // Quit may have been requested from inside a callback rather
            // than through close(); stop accepting work either way.
            shared.advance(LoopState::Stopping);
        }
        Err(e) => {
            error!("cannot acquire context: {}", e);
        }
    }

    debug!("worker thread finished");
    context.release();
    context.teardown();
    shared.advance(LoopState::Stopped);
}

/// Builder for [`LoopThread`].
pub struct LoopThreadBuilder {
    config: LoopConfig,
}

impl LoopThreadBuilder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self {
            config: LoopConfig::default(),
        }
    }

    /// Name for the worker thread.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Cap on concurrently pending sources.
    pub fn max_pending_sources(mut self, limit: usize) -> Self {
        self.config.max_pending_sources = limit;
        self
    }

    /// Spawn the loop. Blocks until the worker is ready.
    pub fn build(self) -> LoopThread {
        LoopThread::with_config(self.config)
    }
}

impl Default for LoopThreadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "loop_thread_tests.rs"]
mod tests;

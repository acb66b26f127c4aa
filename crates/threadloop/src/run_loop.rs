//! Run/quit loop object bound to a dispatch context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::context::DispatchContext;
use crate::error::{LoopError, LoopResult};

/// Drives a [`DispatchContext`] until asked to quit.
///
/// `run` blocks the calling thread and dispatches sources one at a time;
/// `quit` may be called from any thread, including from within a dispatched
/// callback. A loop is single-use: once quit has been requested, `run`
/// returns immediately.
pub struct RunLoop {
    context: Arc<DispatchContext>,
    running: AtomicBool,
    quit: AtomicBool,
}

impl RunLoop {
    /// Create a loop bound to `context`.
    pub fn new(context: Arc<DispatchContext>) -> Self {
        Self {
            context,
            running: AtomicBool::new(false),
            quit: AtomicBool::new(false),
        }
    }

    /// The context this loop drives.
    pub fn context(&self) -> &Arc<DispatchContext> {
        &self.context
    }

    /// Whether the loop is currently inside [`run`](Self::run).
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Dispatch sources until [`quit`](Self::quit) is requested.
    pub fn run(&self) -> LoopResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(LoopError::AlreadyRunning);
        }
        self.context.metrics().mark_start();
        debug!("run loop started");

        while !self.quit.load(Ordering::SeqCst) {
            if !self.context.iterate(true) && self.context.is_torn_down() {
                debug!("context torn down; leaving run loop");
                break;
            }
        }

        self.running.store(false, Ordering::SeqCst);
        debug!("run loop returned");
        Ok(())
    }

    /// Request the loop to stop after the current source finishes.
    pub fn quit(&self) {
        info!("exiting run loop");
        self.quit.store(true, Ordering::SeqCst);
        self.context.wakeup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    use crate::source::{Priority, SourceStatus};

    #[test]
    fn test_quit_before_run_returns_immediately() {
        let context = Arc::new(DispatchContext::new());
        let run_loop = RunLoop::new(context);

        run_loop.quit();
        run_loop.run().unwrap();
        assert!(!run_loop.is_running());
    }

    #[test]
    fn test_quit_from_another_thread() {
        let context = Arc::new(DispatchContext::new());
        let run_loop = Arc::new(RunLoop::new(context));
        let run_loop_clone = run_loop.clone();

        let handle = thread::spawn(move || run_loop_clone.run());

        thread::sleep(Duration::from_millis(50));
        run_loop.quit();
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn test_quit_from_within_callback() {
        let context = Arc::new(DispatchContext::new());
        let run_loop = Arc::new(RunLoop::new(context.clone()));

        let run_loop_clone = run_loop.clone();
        context.attach_idle(
            Priority::DEFAULT_IDLE,
            move || {
                run_loop_clone.quit();
                SourceStatus::Remove
            },
            None,
        );

        run_loop.run().unwrap();
    }

    #[test]
    fn test_concurrent_run_is_refused() {
        let context = Arc::new(DispatchContext::new());
        let run_loop = Arc::new(RunLoop::new(context));
        let run_loop_clone = run_loop.clone();

        let handle = thread::spawn(move || run_loop_clone.run());

        // Wait for the spawned run to take the running flag.
        while !run_loop.is_running() {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(matches!(run_loop.run(), Err(LoopError::AlreadyRunning)));

        run_loop.quit();
        handle.join().unwrap().unwrap();
    }
}

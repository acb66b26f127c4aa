//! # threadloop
//!
//! A callback event loop running on a dedicated background thread, with
//! thread-safe scheduling of deferred work from any other thread.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Caller threads                         │
//! │   schedule_idle / schedule_timeout / remove / close         │
//! └────────────────────────────┬────────────────────────────────┘
//!                              │ thread-safe attach
//! ┌────────────────────────────▼────────────────────────────────┐
//! │  DispatchContext: registry of pending sources               │
//! │    ready set (by priority, then attach order)               │
//! │    armed timers (by deadline)                               │
//! └────────────────────────────┬────────────────────────────────┘
//!                              │ exclusive acquire + iterate
//! ┌────────────────────────────▼────────────────────────────────┐
//! │  Worker thread: RunLoop::run until quit                     │
//! │    dispatches one source at a time, parks when idle         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Construction blocks until the worker owns a ready context, so the first
//! schedule call always lands. Shutdown delivers the quit request as
//! ordinary idle work: everything already queued at equal-or-higher
//! priority drains first, then the worker tears the context down (running
//! every outstanding cleanup hook) and is joined.
//!
//! ## Key components
//!
//! - [`LoopThread`]: the handle owned by client code
//! - [`DispatchContext`]: the source registry a single worker drains
//! - [`RunLoop`]: run/quit loop object bound to a context
//! - [`Priority`] / [`SourceId`] / [`SourceStatus`]: the scheduling surface
//! - [`LoopState`]: `Starting → Ready → Stopping → Stopped`
//!
//! ## Example
//!
//! ```rust
//! use std::sync::mpsc;
//! use threadloop::{LoopThread, SourceStatus};
//!
//! let event_loop = LoopThread::new();
//! let (tx, rx) = mpsc::channel();
//!
//! event_loop.schedule_idle(move || {
//!     tx.send("ran on the worker").unwrap();
//!     SourceStatus::Remove
//! });
//!
//! assert_eq!(rx.recv().unwrap(), "ran on the worker");
//! event_loop.close();
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod loop_thread;
pub mod metrics;
pub mod run_loop;
pub mod source;
pub mod state;

// Re-exports
pub use config::LoopConfig;
pub use context::DispatchContext;
pub use error::{LoopError, LoopResult};
pub use loop_thread::{LoopThread, LoopThreadBuilder};
pub use metrics::{LoopMetrics, MetricsSnapshot};
pub use run_loop::RunLoop;
pub use source::{CleanupFn, Priority, SourceId, SourceStatus};
pub use state::LoopState;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

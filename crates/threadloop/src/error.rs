//! Error types for the loop.

use thiserror::Error;

/// Errors that can occur while driving a dispatch context.
///
/// The scheduling surface never returns these; a schedule call that cannot
/// be honored degrades to the [`SourceId::NONE`](crate::SourceId::NONE)
/// sentinel instead.
#[derive(Debug, Error)]
pub enum LoopError {
    /// The dispatch context is exclusively owned by another thread.
    #[error("dispatch context is already acquired by another thread")]
    ContextAcquired,

    /// The run loop is already running.
    #[error("run loop is already running")]
    AlreadyRunning,
}

/// Result type for loop operations.
pub type LoopResult<T> = Result<T, LoopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            LoopError::ContextAcquired.to_string(),
            "dispatch context is already acquired by another thread"
        );
        assert_eq!(
            LoopError::AlreadyRunning.to_string(),
            "run loop is already running"
        );
    }
}

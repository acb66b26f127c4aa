//! Lifecycle states for a loop thread.

use serde::{Deserialize, Serialize};

/// Lifecycle of a [`LoopThread`](crate::LoopThread).
///
/// Transitions are monotonic: a loop only ever moves forward through
/// `Starting → Ready → Stopping → Stopped`, never back. Once `Stopping`
/// has been reached no further work is accepted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum LoopState {
    /// Worker spawned, execution context not yet signalled ready.
    Starting = 0,
    /// Context ready; scheduling calls succeed.
    Ready = 1,
    /// Shutdown requested; scheduling calls return the sentinel.
    Stopping = 2,
    /// Worker finished; context and loop torn down.
    Stopped = 3,
}

impl From<u8> for LoopState {
    fn from(v: u8) -> Self {
        match v {
            0 => LoopState::Starting,
            1 => LoopState::Ready,
            2 => LoopState::Stopping,
            _ => LoopState::Stopped,
        }
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopState::Starting => write!(f, "starting"),
            LoopState::Ready => write!(f, "ready"),
            LoopState::Stopping => write!(f, "stopping"),
            LoopState::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_u8() {
        assert_eq!(LoopState::from(0), LoopState::Starting);
        assert_eq!(LoopState::from(1), LoopState::Ready);
        assert_eq!(LoopState::from(2), LoopState::Stopping);
        assert_eq!(LoopState::from(3), LoopState::Stopped);
        assert_eq!(LoopState::from(99), LoopState::Stopped);
    }

    #[test]
    fn test_state_ordering() {
        assert!(LoopState::Starting < LoopState::Ready);
        assert!(LoopState::Ready < LoopState::Stopping);
        assert!(LoopState::Stopping < LoopState::Stopped);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(LoopState::Ready.to_string(), "ready");
        assert_eq!(LoopState::Stopping.to_string(), "stopping");
    }
}

//! Configuration for a loop thread.

use serde::{Deserialize, Serialize};

/// Loop thread configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Name given to the worker thread.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// Maximum number of sources that may be pending at once.
    /// Attaches past the cap are rejected with the sentinel identifier.
    #[serde(default = "default_max_pending_sources")]
    pub max_pending_sources: usize,
}

fn default_thread_name() -> String {
    "loop-worker".to_string()
}

fn default_max_pending_sources() -> usize {
    10_000
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            thread_name: default_thread_name(),
            max_pending_sources: default_max_pending_sources(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoopConfig::default();
        assert_eq!(config.thread_name, "loop-worker");
        assert_eq!(config.max_pending_sources, 10_000);
    }

    #[test]
    fn test_config_serialization() {
        let config = LoopConfig {
            thread_name: "media-loop".to_string(),
            max_pending_sources: 64,
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: LoopConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.thread_name, "media-loop");
        assert_eq!(parsed.max_pending_sources, 64);
    }

    #[test]
    fn test_config_missing_fields() {
        let parsed: LoopConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.thread_name, "loop-worker");
        assert_eq!(parsed.max_pending_sources, 10_000);
    }
}

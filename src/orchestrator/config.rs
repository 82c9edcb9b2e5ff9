//! Configuration structures and defaults for the engine.
//!
//! [`EngineConfig`] holds the tunables of the orchestrator. It is usually
//! set through the [`EngineBuilder`](super::EngineBuilder), but can also be
//! loaded from TOML using the same camelCase keys hosts pass around.
//!
//! # Examples
//!
//! ```rust
//! use ferry::orchestrator::EngineConfig;
//! use std::time::Duration;
//!
//! let config = EngineConfig::from_toml_str(
//!     r#"
//!     maxConcurrent = 2
//!     attemptTimeoutMs = 5000
//!     "#,
//! )?;
//!
//! assert_eq!(config.max_concurrent, 2);
//! assert_eq!(config.max_retries, 3);
//! assert_eq!(config.attempt_timeout(), Duration::from_secs(5));
//! # Ok::<(), ferry::Error>(())
//! ```

use super::events::HostEvent;
use crate::error::{Error, Result};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Callback type for engine events.
pub type EventCallback = Box<dyn Fn(&HostEvent) + Send + Sync>;

/// Tunables of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct EngineConfig {
    /// Cap of items in `connecting`, `downloading` or `writing`.
    pub max_concurrent: usize,
    /// Attempts per item for transient failures, and prompts per retry scope.
    pub max_retries: u32,
    /// Soft deadline of a single transport attempt.
    pub attempt_timeout_ms: u64,
    /// Floor between two byte-count updates of one item.
    pub progress_min_interval_ms: u64,
    /// Byte delta that publishes an update regardless of the interval.
    pub progress_min_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            max_retries: 3,
            attempt_timeout_ms: 30_000,
            progress_min_interval_ms: 50,
            progress_min_bytes: 64 * 1024,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document. Missing keys take their default.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file, see [`EngineConfig::from_toml_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Reject values the orchestrator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(Error::Config("maxConcurrent must be at least 1".into()));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(Error::Config("attemptTimeoutMs must be positive".into()));
        }
        Ok(())
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn progress_min_interval(&self) -> Duration {
        Duration::from_millis(self.progress_min_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.attempt_timeout(), Duration::from_secs(30));
        assert_eq!(config.progress_min_interval(), Duration::from_millis(50));
        assert_eq!(config.progress_min_bytes, 65536);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("concurrency = 3"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("maxConcurrent = 0"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ferry.toml");
        std::fs::write(&path, "maxRetries = 5\nprogressMinBytes = 1024\n").unwrap();

        let config = EngineConfig::from_path(&path).unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.progress_min_bytes, 1024);

        assert!(matches!(
            EngineConfig::from_path(dir.path().join("missing.toml")),
            Err(Error::IOError { .. })
        ));
    }
}

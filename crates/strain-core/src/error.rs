//! Error types for Strain Core
//!
//! Invocations of the simulator never fail: bad parameters are clamped and
//! cancellation yields a partial report. Errors exist for:
//! - Resets that cannot obtain the shared locks in time
//! - Load work that dies on the blocking pool
//! - Configuration that cannot be read, parsed or trusted

use std::path::PathBuf;

/// Main lab error type
#[derive(Debug, thiserror::Error)]
pub enum LabError {
    /// Contention engine failed
    #[error("contention error: {0}")]
    Contention(#[from] ContentionError),

    /// Load generator failed
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl LabError {
    /// Check if retrying the same call may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Contention(ContentionError::ResetTimedOut { .. })
                | Self::Load(LoadError::WorkerFailed(_))
        )
    }
}

/// Contention engine errors
#[derive(Debug, thiserror::Error)]
pub enum ContentionError {
    /// Drain could not take both shared locks before the reset deadline.
    /// Nothing was cleared and the counters are untouched.
    #[error("reset timed out after {waited_ms}ms waiting for shared locks")]
    ResetTimedOut {
        /// Configured deadline that elapsed
        waited_ms: u64,
    },
}

/// Load generator errors
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Blocking task panicked or was cancelled by the runtime
    #[error("load worker failed: {0}")]
    WorkerFailed(String),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that was requested
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for [`LabConfig`](crate::LabConfig)
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parsed but violate a constraint
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_timeout_display() {
        let err = ContentionError::ResetTimedOut { waited_ms: 250 };
        assert_eq!(
            err.to_string(),
            "reset timed out after 250ms waiting for shared locks"
        );
    }

    #[test]
    fn lab_error_is_retryable() {
        let timeout: LabError = ContentionError::ResetTimedOut { waited_ms: 1 }.into();
        assert!(timeout.is_retryable());

        let worker: LabError = LoadError::WorkerFailed("panicked".to_string()).into();
        assert!(worker.is_retryable());

        let config: LabError = ConfigError::Invalid("min > max".to_string()).into();
        assert!(!config.is_retryable());
    }

    #[test]
    fn lab_error_wraps_source_message() {
        let err: LabError = LoadError::WorkerFailed("join".to_string()).into();
        assert!(err.to_string().contains("load worker failed: join"));
    }
}

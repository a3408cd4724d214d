//! Lab configuration
//!
//! Every section has defaults matching the reference service, so an empty
//! TOML file (or no file at all) yields a working lab.
//!
//! ```toml
//! [contention]
//! trim_threshold = 1000
//! trim_count = 500
//! reset_timeout_ms = 30000
//!
//! [contention.hold_time_ms]
//! min = 10
//! max = 500
//! default = 50
//!
//! [memory]
//! bytes_per_size_unit = 1048576
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    /// Lock contention simulator
    pub contention: ContentionConfig,
    /// CPU load generator
    pub cpu: CpuLoadConfig,
    /// Memory load generator
    pub memory: MemoryLoadConfig,
    /// HTTP server
    pub server: ServerConfig,
}

impl LabConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With contention section
    #[inline]
    #[must_use]
    pub fn with_contention(mut self, contention: ContentionConfig) -> Self {
        self.contention = contention;
        self
    }

    /// With CPU section
    #[inline]
    #[must_use]
    pub fn with_cpu(mut self, cpu: CpuLoadConfig) -> Self {
        self.cpu = cpu;
        self
    }

    /// With memory section
    #[inline]
    #[must_use]
    pub fn with_memory(mut self, memory: MemoryLoadConfig) -> Self {
        self.memory = memory;
        self
    }

    /// With server section
    #[inline]
    #[must_use]
    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// - `ConfigError::Parse` if the text is not valid TOML for this schema
    /// - `ConfigError::Invalid` if a constraint is violated
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// - `ConfigError::Read` if the file cannot be read
    /// - any error of [`LabConfig::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first violated constraint
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.contention.validate()?;
        if self.cpu.matrix_dimension == 0 {
            return Err(ConfigError::Invalid(
                "cpu.matrix_dimension must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Inclusive range with a default used when a caller omits the value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    /// Smallest effective value
    pub min: u64,
    /// Largest effective value
    pub max: u64,
    /// Value used when the caller supplies none
    pub default: u64,
}

impl Bounds {
    /// Create bounds
    #[inline]
    #[must_use]
    pub const fn new(min: u64, max: u64, default: u64) -> Self {
        Self { min, max, default }
    }

    /// Clamp a raw, possibly negative, caller value into `[min, max]`.
    ///
    /// Never panics, even for bounds that failed validation.
    #[inline]
    #[must_use]
    pub fn clamp(&self, value: i64) -> u64 {
        let value = u64::try_from(value).unwrap_or(0);
        value.max(self.min).min(self.max)
    }

    /// Clamp an optional value, substituting the default when absent
    #[inline]
    #[must_use]
    pub fn resolve(&self, value: Option<i64>) -> u64 {
        match value {
            Some(value) => self.clamp(value),
            None => self.default.max(self.min).min(self.max),
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.min > self.max {
            return Err(ConfigError::Invalid(format!(
                "{name}: min ({}) exceeds max ({})",
                self.min, self.max
            )));
        }
        if self.default < self.min || self.default > self.max {
            return Err(ConfigError::Invalid(format!(
                "{name}: default ({}) outside [{}, {}]",
                self.default, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Contention simulator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentionConfig {
    /// Time both locks are held per operation
    pub hold_time_ms: Bounds,
    /// Operations per invocation
    pub operation_count: Bounds,
    /// Sequence length that triggers a trim
    pub trim_threshold: usize,
    /// Oldest entries discarded per trim
    pub trim_count: usize,
    /// Upper bound on how long a reset waits for the shared locks.
    /// `None` waits indefinitely.
    pub reset_timeout_ms: Option<u64>,
}

impl ContentionConfig {
    /// With hold time bounds
    #[inline]
    #[must_use]
    pub fn with_hold_time(mut self, bounds: Bounds) -> Self {
        self.hold_time_ms = bounds;
        self
    }

    /// With operation count bounds
    #[inline]
    #[must_use]
    pub fn with_operation_count(mut self, bounds: Bounds) -> Self {
        self.operation_count = bounds;
        self
    }

    /// With trim policy
    #[inline]
    #[must_use]
    pub fn with_trim(mut self, threshold: usize, count: usize) -> Self {
        self.trim_threshold = threshold;
        self.trim_count = count;
        self
    }

    /// With reset deadline
    #[inline]
    #[must_use]
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Reset deadline as a duration
    #[inline]
    #[must_use]
    pub fn reset_timeout(&self) -> Option<Duration> {
        self.reset_timeout_ms.map(Duration::from_millis)
    }

    /// Check bounds and trim policy
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first violated constraint
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.hold_time_ms.validate("contention.hold_time_ms")?;
        self.operation_count.validate("contention.operation_count")?;

        if self.trim_count == 0 {
            return Err(ConfigError::Invalid(
                "contention.trim_count must be positive".to_string(),
            ));
        }
        if self.trim_count > self.trim_threshold {
            return Err(ConfigError::Invalid(format!(
                "contention.trim_count ({}) exceeds trim_threshold ({})",
                self.trim_count, self.trim_threshold
            )));
        }
        Ok(())
    }
}

impl Default for ContentionConfig {
    fn default() -> Self {
        Self {
            hold_time_ms: Bounds::new(10, 500, 50),
            operation_count: Bounds::new(10, 1000, 100),
            trim_threshold: 1000,
            trim_count: 500,
            reset_timeout_ms: None,
        }
    }
}

/// CPU load generator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuLoadConfig {
    /// Iterations when the caller supplies none
    pub default_iterations: u32,
    /// Megabytes per buffer when the caller supplies none
    pub default_data_size_mb: u32,
    /// Side of the square matrices multiplied per load
    pub matrix_dimension: usize,
    /// Buffers retained per load
    pub buffers_per_load: u32,
}

impl Default for CpuLoadConfig {
    fn default() -> Self {
        Self {
            default_iterations: 10,
            default_data_size_mb: 1,
            matrix_dimension: 50,
            buffers_per_load: 10,
        }
    }
}

/// Memory load generator settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryLoadConfig {
    /// Objects when the caller supplies none
    pub default_object_count: u32,
    /// Size units when the caller supplies none
    pub default_size_mb: u32,
    /// Bytes allocated per requested size unit.
    ///
    /// The default keeps accumulation gradual; `1048576` makes the unit a
    /// literal mebibyte.
    pub bytes_per_size_unit: u64,
}

impl MemoryLoadConfig {
    /// With bytes per size unit
    #[inline]
    #[must_use]
    pub fn with_bytes_per_size_unit(mut self, bytes: u64) -> Self {
        self.bytes_per_size_unit = bytes;
        self
    }
}

impl Default for MemoryLoadConfig {
    fn default() -> Self {
        Self {
            default_object_count: 5,
            default_size_mb: 2,
            bytes_per_size_unit: 50,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

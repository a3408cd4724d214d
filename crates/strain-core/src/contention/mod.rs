//! Lock contention engine
//!
//! One [`ContentionEngine`] per process owns:
//! - the shared keyed store (lock A) and shared sequence (lock B)
//! - the aggregate counters
//!
//! Callers invoke [`ContentionEngine::run`] once per request. The engine
//! schedules nothing itself: contention comes purely from how many
//! invocations the caller runs at once.
//!
//! # Lock order
//!
//! Lock A is always taken before lock B, by the simulator and by
//! [`ContentionEngine::clear`] alike. [`shared`] makes the order structural:
//! lock B can only be requested through a held lock A guard.

mod counters;
mod reset;
pub mod shared;
mod simulator;

pub use counters::{ActiveWorkerGuard, AggregateCounters, MetricsSnapshot};
pub use reset::ClearReport;
pub use simulator::{ContentionReport, WorkerId};

use crate::config::ContentionConfig;
use crate::error::ConfigError;
use shared::SharedState;

/// Shared structures, counters and the settings that govern them
#[derive(Debug)]
pub struct ContentionEngine {
    config: ContentionConfig,
    shared: SharedState,
    counters: AggregateCounters,
}

impl ContentionEngine {
    /// Create an engine with empty structures and zeroed counters
    ///
    /// # Errors
    /// `ConfigError::Invalid` if the bounds or trim policy are unusable
    pub fn new(config: ContentionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    pub(crate) fn from_validated(config: ContentionConfig) -> Self {
        Self {
            config,
            shared: SharedState::new(),
            counters: AggregateCounters::new(),
        }
    }

    /// Active settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ContentionConfig {
        &self.config
    }

    /// Aggregate counters
    #[inline]
    #[must_use]
    pub fn counters(&self) -> &AggregateCounters {
        &self.counters
    }

    /// Keyed store size, lock-free
    #[inline]
    #[must_use]
    pub fn shared_map_size(&self) -> usize {
        self.shared.store_len()
    }

    /// Sequence size, lock-free
    #[inline]
    #[must_use]
    pub fn shared_list_size(&self) -> usize {
        self.shared.sequence_len()
    }

    /// Current metrics; never takes a lock
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::capture(
            &self.counters,
            self.shared.store_len(),
            self.shared.sequence_len(),
        )
    }
}

impl Default for ContentionEngine {
    fn default() -> Self {
        Self::from_validated(ContentionConfig::default())
    }
}

//! Memory load generator
//!
//! Minimal CPU, steady accumulation: each `load` retains `object_count`
//! random buffers of `size_mb * bytes_per_size_unit` bytes.

use super::{random_buffers, AccumulationStore, ClearedEntries, LoadGenerator, StableReport};
use crate::config::MemoryLoadConfig;
use crate::telemetry::{MEMORY_LOAD_CALLS, MEMORY_STABLE_CALLS};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Parameters for [`MemoryLoad::load`](LoadGenerator::load)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLoadParams {
    /// Buffers to retain
    pub object_count: u32,
    /// Size units per buffer
    pub size_mb: u32,
}

/// Outcome of a memory load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryLoadReport {
    /// Always `"memory-load"`
    pub operation: String,
    /// Buffers retained
    pub objects_created: u32,
    /// Requested size units per buffer
    #[serde(rename = "sizePerObjectMB")]
    pub size_per_object_mb: u32,
    /// Requested size units across all buffers
    #[serde(rename = "totalStoredMB")]
    pub total_stored_mb: u64,
    /// Actual bytes per buffer
    pub size_per_object_bytes: u64,
    /// Actual bytes retained by this call
    pub total_stored_bytes: u64,
    /// Keys in the store after this call
    pub total_keys_in_store: usize,
    /// Wall-clock duration
    pub duration_ms: u64,
}

/// Memory generator with its own retained store
#[derive(Debug, Default)]
pub struct MemoryLoad {
    config: MemoryLoadConfig,
    store: AccumulationStore,
}

impl MemoryLoad {
    /// Create generator with an empty store
    #[must_use]
    pub fn new(config: MemoryLoadConfig) -> Self {
        Self {
            config,
            store: AccumulationStore::new(),
        }
    }

    /// Active settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MemoryLoadConfig {
        &self.config
    }
}

impl LoadGenerator for MemoryLoad {
    type Params = MemoryLoadParams;
    type Report = MemoryLoadReport;

    const NAME: &'static str = "memory";

    fn stable(&self) -> StableReport {
        metrics::counter!(MEMORY_STABLE_CALLS).increment(1);
        StableReport::ok("memory-stable")
    }

    fn load(&self, params: MemoryLoadParams) -> MemoryLoadReport {
        metrics::counter!(MEMORY_LOAD_CALLS).increment(1);
        let started = Instant::now();

        let size_per_object_bytes =
            u64::from(params.size_mb).saturating_mul(self.config.bytes_per_size_unit);
        let buffer_len = usize::try_from(size_per_object_bytes).unwrap_or(usize::MAX);
        let buffers = random_buffers(params.object_count as usize, buffer_len);
        let (_, total_keys_in_store) = self.store.insert(buffers);

        let report = MemoryLoadReport {
            operation: "memory-load".to_string(),
            objects_created: params.object_count,
            size_per_object_mb: params.size_mb,
            total_stored_mb: u64::from(params.object_count) * u64::from(params.size_mb),
            size_per_object_bytes,
            total_stored_bytes: size_per_object_bytes
                .saturating_mul(u64::from(params.object_count)),
            total_keys_in_store,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        debug!(
            generator = Self::NAME,
            bytes = report.total_stored_bytes,
            keys = report.total_keys_in_store,
            "memory load retained"
        );

        report
    }

    fn size(&self) -> usize {
        self.store.len()
    }

    fn retained_bytes(&self) -> u64 {
        self.store.bytes()
    }

    fn clear(&self) -> ClearedEntries {
        self.store.clear()
    }
}

//! The lab: one instance owning every piece of shared state
//!
//! Construct a [`Lab`] once at startup and hand `Arc<Lab>` to whatever
//! dispatches requests. Nothing in this crate is a process-wide static.

use crate::config::LabConfig;
use crate::contention::{ClearReport, ContentionEngine, ContentionReport, MetricsSnapshot};
use crate::error::{ConfigError, ContentionError, LoadError};
use crate::load::{
    CpuLoad, CpuLoadParams, CpuLoadReport, CpuOnlyReport, LoadGenerator, MemoryLoad,
    MemoryLoadParams, MemoryLoadReport, StableReport,
};
use crate::types::{epoch_millis, EpochMillis};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Contention request as a caller phrases it; absent fields take defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentionRequest {
    /// Requested hold time, clamped
    pub hold_time_ms: Option<i64>,
    /// Requested operation count, clamped
    pub operation_count: Option<i64>,
}

impl ContentionRequest {
    /// Request with both values set
    #[inline]
    #[must_use]
    pub fn new(hold_time_ms: i64, operation_count: i64) -> Self {
        Self {
            hold_time_ms: Some(hold_time_ms),
            operation_count: Some(operation_count),
        }
    }
}

/// CPU load request; absent fields take defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuLoadRequest {
    /// Work multiplier
    pub iterations: Option<u32>,
    /// Mebibytes per retained buffer
    #[serde(rename = "dataSizeMB")]
    pub data_size_mb: Option<u32>,
}

/// Memory load request; absent fields take defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLoadRequest {
    /// Buffers to retain
    #[serde(rename = "objectCount")]
    pub object_count: Option<u32>,
    /// Size units per buffer
    #[serde(rename = "sizeMB")]
    pub size_mb: Option<u32>,
}

/// Outcome of [`Lab::clear_generator_data`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorClearReport {
    /// Always `"data-clear"`
    pub operation: String,
    /// Keys removed from the CPU store
    pub cpu_keys_cleared: usize,
    /// Keys removed from the memory store
    pub memory_keys_cleared: usize,
    /// Bytes released across both stores
    pub bytes_released: u64,
    /// Completion time
    pub timestamp: EpochMillis,
}

/// Sizes of every in-memory collection the lab owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSizes {
    /// CPU store keys
    pub cpu_data_store_keys: usize,
    /// Memory store keys
    pub memory_store_keys: usize,
    /// CPU store bytes
    pub cpu_data_store_bytes: u64,
    /// Memory store bytes
    pub memory_store_bytes: u64,
    /// Contention keyed store entries
    pub lock_shared_map_size: usize,
    /// Contention sequence entries
    pub lock_shared_list_size: usize,
}

/// Combined view for dashboards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    /// Collection sizes
    pub in_memory_collections: CollectionSizes,
    /// Contention counters
    pub lock_contention: MetricsSnapshot,
    /// Capture time
    pub timestamp: EpochMillis,
}

/// Owner of the contention engine, both generators and the shutdown signal
#[derive(Debug)]
pub struct Lab {
    config: LabConfig,
    contention: ContentionEngine,
    cpu: Arc<CpuLoad>,
    memory: Arc<MemoryLoad>,
    shutdown: CancellationToken,
}

impl Lab {
    /// Build a lab with empty structures
    ///
    /// # Errors
    /// `ConfigError::Invalid` if `config` fails [`LabConfig::validate`]
    pub fn new(config: LabConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    fn from_validated(config: LabConfig) -> Self {
        Self {
            contention: ContentionEngine::from_validated(config.contention.clone()),
            cpu: Arc::new(CpuLoad::new(config.cpu)),
            memory: Arc::new(MemoryLoad::new(config.memory)),
            shutdown: CancellationToken::new(),
            config,
        }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    /// Contention engine
    #[inline]
    #[must_use]
    pub fn contention(&self) -> &ContentionEngine {
        &self.contention
    }

    /// CPU generator
    #[inline]
    #[must_use]
    pub fn cpu(&self) -> &CpuLoad {
        &self.cpu
    }

    /// Memory generator
    #[inline]
    #[must_use]
    pub fn memory(&self) -> &MemoryLoad {
        &self.memory
    }

    /// Run one contention invocation.
    ///
    /// The invocation observes [`Lab::shutdown`] through a child token.
    pub async fn run_contention(&self, request: ContentionRequest) -> ContentionReport {
        let contention = &self.config.contention;
        let hold_time_ms = contention.hold_time_ms.resolve(request.hold_time_ms);
        let operation_count = contention.operation_count.resolve(request.operation_count);

        let cancel = self.shutdown.child_token();
        self.contention
            .run(
                i64::try_from(hold_time_ms).unwrap_or(i64::MAX),
                i64::try_from(operation_count).unwrap_or(i64::MAX),
                &cancel,
            )
            .await
    }

    /// Contention metrics snapshot
    #[inline]
    #[must_use]
    pub fn contention_metrics(&self) -> MetricsSnapshot {
        self.contention.snapshot()
    }

    /// Drain the contention structures and zero the totals
    ///
    /// # Errors
    /// See [`ContentionEngine::clear`]
    pub async fn clear_contention(&self) -> Result<ClearReport, ContentionError> {
        self.contention.clear().await
    }

    /// CPU load on the blocking pool
    ///
    /// # Errors
    /// `LoadError::WorkerFailed` if the blocking task panics
    pub async fn run_cpu_load(&self, request: CpuLoadRequest) -> Result<CpuLoadReport, LoadError> {
        let params = CpuLoadParams {
            iterations: request
                .iterations
                .unwrap_or(self.config.cpu.default_iterations),
            data_size_mb: request
                .data_size_mb
                .unwrap_or(self.config.cpu.default_data_size_mb),
        };
        run_blocking(Arc::clone(&self.cpu), params).await
    }

    /// CPU-only burn on the blocking pool
    ///
    /// # Errors
    /// `LoadError::WorkerFailed` if the blocking task panics
    pub async fn run_cpu_only(&self, iterations: Option<u32>) -> Result<CpuOnlyReport, LoadError> {
        let iterations = iterations.unwrap_or(self.config.cpu.default_iterations);
        let cpu = Arc::clone(&self.cpu);
        tokio::task::spawn_blocking(move || cpu.cpu_only(iterations))
            .await
            .map_err(|e| LoadError::WorkerFailed(e.to_string()))
    }

    /// CPU baseline
    #[must_use]
    pub fn cpu_stable(&self) -> StableReport {
        self.cpu.stable()
    }

    /// Memory load on the blocking pool
    ///
    /// # Errors
    /// `LoadError::WorkerFailed` if the blocking task panics
    pub async fn run_memory_load(
        &self,
        request: MemoryLoadRequest,
    ) -> Result<MemoryLoadReport, LoadError> {
        let params = MemoryLoadParams {
            object_count: request
                .object_count
                .unwrap_or(self.config.memory.default_object_count),
            size_mb: request
                .size_mb
                .unwrap_or(self.config.memory.default_size_mb),
        };
        run_blocking(Arc::clone(&self.memory), params).await
    }

    /// Memory baseline
    #[must_use]
    pub fn memory_stable(&self) -> StableReport {
        self.memory.stable()
    }

    /// Release everything both generators accumulated
    pub fn clear_generator_data(&self) -> GeneratorClearReport {
        let cpu = self.cpu.clear();
        let memory = self.memory.clear();

        info!(
            cpu = cpu.entries_cleared,
            memory = memory.entries_cleared,
            "cleared generator data"
        );

        GeneratorClearReport {
            operation: "data-clear".to_string(),
            cpu_keys_cleared: cpu.entries_cleared,
            memory_keys_cleared: memory.entries_cleared,
            bytes_released: cpu.bytes_released + memory.bytes_released,
            timestamp: epoch_millis(),
        }
    }

    /// Sizes of every collection plus the contention snapshot
    #[must_use]
    pub fn system_metrics(&self) -> SystemMetrics {
        let lock_contention = self.contention.snapshot();
        SystemMetrics {
            in_memory_collections: CollectionSizes {
                cpu_data_store_keys: self.cpu.size(),
                memory_store_keys: self.memory.size(),
                cpu_data_store_bytes: self.cpu.retained_bytes(),
                memory_store_bytes: self.memory.retained_bytes(),
                lock_shared_map_size: lock_contention.shared_map_size,
                lock_shared_list_size: lock_contention.shared_list_size,
            },
            lock_contention,
            timestamp: epoch_millis(),
        }
    }

    /// Ask in-flight invocations to stop after their current operation
    pub fn shutdown(&self) {
        info!("lab shutdown requested");
        self.shutdown.cancel();
    }

    /// Token cancelled by [`Lab::shutdown`]
    #[inline]
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// True once [`Lab::shutdown`] was called
    #[inline]
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Default for Lab {
    fn default() -> Self {
        Self::from_validated(LabConfig::default())
    }
}

async fn run_blocking<G>(generator: Arc<G>, params: G::Params) -> Result<G::Report, LoadError>
where
    G: LoadGenerator + 'static,
{
    tokio::task::spawn_blocking(move || generator.load(params))
        .await
        .map_err(|e| LoadError::WorkerFailed(format!("{} load: {e}", G::NAME)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContentionConfig, MemoryLoadConfig};

    #[test]
    fn request_wire_names() {
        let cpu: CpuLoadRequest =
            serde_json::from_str(r#"{"iterations": 3, "dataSizeMB": 2}"#).unwrap();
        assert_eq!(cpu.iterations, Some(3));
        assert_eq!(cpu.data_size_mb, Some(2));

        let memory: MemoryLoadRequest =
            serde_json::from_str(r#"{"objectCount": 4, "sizeMB": 1}"#).unwrap();
        assert_eq!(memory.object_count, Some(4));
        assert_eq!(memory.size_mb, Some(1));

        let contention: ContentionRequest =
            serde_json::from_str(r#"{"holdTimeMs": -1}"#).unwrap();
        assert_eq!(contention.hold_time_ms, Some(-1));
        assert_eq!(contention.operation_count, None);
    }

    #[tokio::test(start_paused = true)]
    async fn run_contention_uses_defaults() {
        let lab = Lab::default();
        let report = lab
            .run_contention(ContentionRequest {
                hold_time_ms: Some(10),
                operation_count: None,
            })
            .await;
        assert_eq!(report.operations_requested, 100);
        assert_eq!(report.hold_time_ms_per_operation, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_new_invocations() {
        let lab = Lab::default();
        lab.shutdown();
        assert!(lab.is_shutting_down());

        let report = lab.run_contention(ContentionRequest::new(10, 10)).await;
        assert!(report.cancelled);
        assert_eq!(report.operations_completed, 0);
    }

    #[tokio::test]
    async fn memory_load_then_clear_generator_data() {
        let lab = Lab::new(
            LabConfig::new().with_memory(MemoryLoadConfig::default().with_bytes_per_size_unit(8)),
        )
        .unwrap();
        lab.run_memory_load(MemoryLoadRequest::default()).await.unwrap();
        lab.run_memory_load(MemoryLoadRequest::default()).await.unwrap();

        let metrics = lab.system_metrics();
        assert_eq!(metrics.in_memory_collections.memory_store_keys, 2);
        // 5 objects * 2 units * 8 bytes, twice
        assert_eq!(metrics.in_memory_collections.memory_store_bytes, 160);

        let cleared = lab.clear_generator_data();
        assert_eq!(cleared.operation, "data-clear");
        assert_eq!(cleared.memory_keys_cleared, 2);
        assert_eq!(cleared.cpu_keys_cleared, 0);
        assert_eq!(cleared.bytes_released, 160);
        assert_eq!(lab.memory().size(), 0);
    }

    #[tokio::test]
    async fn cpu_only_leaves_store_empty() {
        let lab = Lab::default();
        let report = lab.run_cpu_only(Some(1)).await.unwrap();
        assert_eq!(report.operation, "cpu-only-load");
        assert_eq!(report.items_sorted, 5000);
        assert_eq!(lab.system_metrics().in_memory_collections.cpu_data_store_keys, 0);
    }

    #[test]
    fn new_rejects_config_without_trim() {
        let config =
            LabConfig::new().with_contention(ContentionConfig::default().with_trim(1000, 0));
        let err = Lab::new(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn validated_lab_keeps_sequence_trimmed() {
        let lab = Lab::new(LabConfig::new()).unwrap();
        lab.run_contention(ContentionRequest::new(10, 1000)).await;
        let report = lab.run_contention(ContentionRequest::new(10, 10)).await;

        assert_eq!(report.shared_map_size, 1010);
        assert_eq!(report.shared_list_size, 510);
    }

    #[test]
    fn stable_baselines() {
        let lab = Lab::default();
        assert_eq!(lab.cpu_stable().status, "ok");
        assert_eq!(lab.memory_stable().operation, "memory-stable");
    }
}

//! Testing utilities for the strain workspace
//!
//! Shared lab fixtures, concurrent drivers and response helpers.

#![allow(missing_docs)]

use std::sync::Arc;
use strain_core::{
    Bounds, ContentionConfig, ContentionReport, ContentionRequest, CpuLoadConfig, Lab, LabConfig,
    MemoryLoadConfig,
};

/// Config with tiny payloads so generator tests stay fast
pub fn fast_config() -> LabConfig {
    LabConfig::new()
        .with_cpu(CpuLoadConfig {
            default_iterations: 1,
            default_data_size_mb: 0,
            ..CpuLoadConfig::default()
        })
        .with_memory(MemoryLoadConfig::default().with_bytes_per_size_unit(16))
}

/// Config whose contention floor allows 1 ms holds
pub fn quick_contention_config() -> LabConfig {
    fast_config().with_contention(
        ContentionConfig::default()
            .with_hold_time(Bounds::new(1, 500, 5))
            .with_operation_count(Bounds::new(1, 1000, 10)),
    )
}

pub fn setup_test_lab() -> Arc<Lab> {
    setup_lab_with(fast_config())
}

/// Lab from `config`; panics if the config is invalid
pub fn setup_lab_with(config: LabConfig) -> Arc<Lab> {
    Arc::new(Lab::new(config).unwrap())
}

/// Start `workers` invocations together and collect every report
pub async fn run_concurrently(
    lab: &Arc<Lab>,
    workers: usize,
    hold_time_ms: i64,
    operation_count: i64,
) -> Vec<ContentionReport> {
    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let lab = Arc::clone(lab);
            tokio::spawn(async move {
                lab.run_contention(ContentionRequest::new(hold_time_ms, operation_count))
                    .await
            })
        })
        .collect();

    let mut reports = Vec::with_capacity(workers);
    for handle in handles {
        reports.push(handle.await.unwrap());
    }
    reports
}

/// Parse a warp test response body as JSON
pub fn json_body(response: &warp::http::Response<warp::hyper::body::Bytes>) -> serde_json::Value {
    serde_json::from_slice(response.body()).unwrap()
}

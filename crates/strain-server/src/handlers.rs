//! Request handlers
//!
//! Handlers never reject: a failed operation becomes a 500 carrying
//! `{operation, error, retryable}`, classified through [`LabError`].

use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use strain_core::telemetry::METRIC_NAMES;
use strain_core::{ContentionRequest, CpuLoadRequest, Lab, LabError, MemoryLoadRequest};
use tracing::error;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Reply;

/// Body of a failed operation
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Operation that failed
    pub operation: &'static str,
    /// Rendered error
    pub error: String,
    /// Whether the same call may succeed later
    pub retryable: bool,
}

/// Body of `GET /api/metrics/endpoints`
#[derive(Debug, Serialize)]
pub struct EndpointMetrics {
    /// Where the counters go
    pub message: &'static str,
    /// Counter and histogram names
    pub endpoints: Vec<&'static str>,
}

fn json<T: Serialize>(body: &T) -> Response {
    warp::reply::json(body).into_response()
}

fn failure(operation: &'static str, err: impl Into<LabError>) -> Response {
    let err: LabError = err.into();
    error!(operation, error = %err, retryable = err.is_retryable(), "operation failed");
    let body = ErrorBody {
        operation,
        error: err.to_string(),
        retryable: err.is_retryable(),
    };
    warp::reply::with_status(warp::reply::json(&body), StatusCode::INTERNAL_SERVER_ERROR)
        .into_response()
}

/// `POST /api/contention/load?holdTimeMs=&operationCount=`
pub async fn contention_load(
    lab: Arc<Lab>,
    request: ContentionRequest,
) -> Result<Response, Infallible> {
    Ok(json(&lab.run_contention(request).await))
}

/// `GET /api/contention/metrics`
pub async fn contention_metrics(lab: Arc<Lab>) -> Result<Response, Infallible> {
    Ok(json(&lab.contention_metrics()))
}

/// `DELETE /api/contention/clear`
pub async fn contention_clear(lab: Arc<Lab>) -> Result<Response, Infallible> {
    Ok(match lab.clear_contention().await {
        Ok(report) => json(&report),
        Err(err) => failure("contention-clear", err),
    })
}

/// `POST /api/cpu/load?iterations=&dataSizeMB=`
pub async fn cpu_load(lab: Arc<Lab>, request: CpuLoadRequest) -> Result<Response, Infallible> {
    Ok(match lab.run_cpu_load(request).await {
        Ok(report) => json(&report),
        Err(err) => failure("cpu-memory-load", err),
    })
}

/// `GET /api/cpu/stable`
pub async fn cpu_stable(lab: Arc<Lab>) -> Result<Response, Infallible> {
    Ok(json(&lab.cpu_stable()))
}

/// `POST /api/mem/load?objectCount=&sizeMB=`
pub async fn memory_load(
    lab: Arc<Lab>,
    request: MemoryLoadRequest,
) -> Result<Response, Infallible> {
    Ok(match lab.run_memory_load(request).await {
        Ok(report) => json(&report),
        Err(err) => failure("memory-load", err),
    })
}

/// `GET /api/mem/stable`
pub async fn memory_stable(lab: Arc<Lab>) -> Result<Response, Infallible> {
    Ok(json(&lab.memory_stable()))
}

/// `DELETE /api/data/clear`
pub async fn data_clear(lab: Arc<Lab>) -> Result<Response, Infallible> {
    Ok(json(&lab.clear_generator_data()))
}

/// `GET /api/metrics/system`
pub async fn system_metrics(lab: Arc<Lab>) -> Result<Response, Infallible> {
    Ok(json(&lab.system_metrics()))
}

/// `GET /api/metrics/endpoints`
pub async fn endpoint_metrics() -> Result<Response, Infallible> {
    Ok(json(&EndpointMetrics {
        message: "Endpoint counters are exported through the installed metrics recorder",
        endpoints: METRIC_NAMES.to_vec(),
    }))
}

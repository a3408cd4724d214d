//! HTTP surface for the strain lab
//!
//! Exposes a shared [`Lab`] over warp:
//! - contention: `POST /api/contention/load`, `GET /api/contention/metrics`,
//!   `DELETE /api/contention/clear`
//! - generators: `POST /api/cpu/load`, `GET /api/cpu/stable`,
//!   `POST /api/mem/load`, `GET /api/mem/stable`, `DELETE /api/data/clear`
//! - dashboards: `GET /api/metrics/system`, `GET /api/metrics/endpoints`
//!
//! The server stops accepting connections once the lab's shutdown token is
//! cancelled; in-flight contention invocations observe the same token.

pub mod handlers;
pub mod routes;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use strain_core::Lab;
use thiserror::Error;

pub use routes::routes;

/// Server startup failures
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: SocketAddr,
        /// Underlying warp error
        #[source]
        source: warp::Error,
    },
}

/// Bind the API to `addr`.
///
/// Returns the bound address (useful with port 0) and the server future,
/// which completes after [`Lab::shutdown`].
///
/// # Errors
/// [`ServerError::Bind`] if the address is unavailable
pub fn bind(
    lab: Arc<Lab>,
    addr: SocketAddr,
) -> Result<(SocketAddr, impl Future<Output = ()>), ServerError> {
    let token = lab.shutdown_token();
    warp::serve(routes(lab))
        .try_bind_with_graceful_shutdown(addr, async move { token.cancelled().await })
        .map_err(|source| ServerError::Bind { addr, source })
}

//! Strain Core - deliberate resource pressure with honest metrics
//!
//! The engine behind the strain service:
//! - Lock contention on two shared structures with a fixed acquisition order
//! - Process-wide atomic counters with lock-free snapshots
//! - Atomic drain of the shared structures and counter reset
//! - CPU and memory load generators backed by unbounded keyed stores
//!
//! # Example
//!
//! ```rust,ignore
//! use strain_core::{Lab, LabConfig, ContentionRequest};
//!
//! # async fn example() {
//! let lab = Lab::new(LabConfig::new()).unwrap();
//!
//! let report = lab
//!     .run_contention(ContentionRequest::new(20, 50))
//!     .await;
//!
//! println!("waited {}ms of {}ms", report.wait_time_ms, report.duration_ms);
//! # }
//! ```

#![warn(unreachable_pub)]

// Core modules
pub mod config;
pub mod contention;
pub mod error;
pub mod lab;
pub mod load;
pub mod telemetry;
pub mod types;

// Re-exports for convenience
pub use config::{
    Bounds, ContentionConfig, CpuLoadConfig, LabConfig, MemoryLoadConfig, ServerConfig,
};
pub use contention::{
    ClearReport, ContentionEngine, ContentionReport, MetricsSnapshot, WorkerId,
};
pub use error::{ConfigError, ContentionError, LabError, LoadError};
pub use lab::{
    CollectionSizes, ContentionRequest, CpuLoadRequest, GeneratorClearReport, Lab,
    MemoryLoadRequest, SystemMetrics,
};
pub use load::{
    ClearedEntries, CpuLoad, CpuLoadParams, CpuLoadReport, CpuOnlyReport, LoadGenerator,
    MemoryLoad, MemoryLoadParams, MemoryLoadReport, StableReport,
};
pub use types::{epoch_millis, EpochMillis};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a [`Lab`](crate::Lab)
    pub use crate::{
        ContentionReport, ContentionRequest, CpuLoadRequest, Lab, LabConfig, LabError,
        LoadGenerator, MemoryLoadRequest, MetricsSnapshot,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

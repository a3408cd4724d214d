//! Metric names emitted through the `metrics` facade
//!
//! Nothing here installs a recorder. Without one every call is a no-op, so
//! the library can emit freely and the embedding binary decides where the
//! numbers go.

/// CPU load calls
pub const CPU_LOAD_CALLS: &str = "cpu.load.calls";
/// CPU stable baseline calls
pub const CPU_STABLE_CALLS: &str = "cpu.stable.calls";
/// Memory load calls
pub const MEMORY_LOAD_CALLS: &str = "memory.load.calls";
/// Memory stable baseline calls
pub const MEMORY_STABLE_CALLS: &str = "memory.stable.calls";
/// Completed contention operations
pub const CONTENTION_OPERATIONS: &str = "contention.operations";
/// Lock A acquisition wait per operation, in milliseconds
pub const CONTENTION_WAIT_TIME: &str = "contention.wait.time";

/// Every metric this crate emits
pub const METRIC_NAMES: [&str; 6] = [
    CPU_LOAD_CALLS,
    CPU_STABLE_CALLS,
    MEMORY_LOAD_CALLS,
    MEMORY_STABLE_CALLS,
    CONTENTION_OPERATIONS,
    CONTENTION_WAIT_TIME,
];

/// Register descriptions with whatever recorder is installed.
///
/// Call once after installing a recorder.
pub fn describe() {
    metrics::describe_counter!(CPU_LOAD_CALLS, "Number of CPU load calls");
    metrics::describe_counter!(CPU_STABLE_CALLS, "Number of CPU stable calls");
    metrics::describe_counter!(MEMORY_LOAD_CALLS, "Number of memory load calls");
    metrics::describe_counter!(MEMORY_STABLE_CALLS, "Number of memory stable calls");
    metrics::describe_counter!(
        CONTENTION_OPERATIONS,
        "Number of contention operations performed"
    );
    metrics::describe_histogram!(
        CONTENTION_WAIT_TIME,
        metrics::Unit::Milliseconds,
        "Time spent waiting for locks"
    );
}

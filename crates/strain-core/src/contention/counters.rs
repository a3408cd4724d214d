//! Aggregate counters fed by every invocation
//!
//! Plain atomics, independent of the structure locks. A snapshot loads each
//! field separately: fields are individually exact but not mutually
//! consistent while invocations are in flight.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Process-wide contention statistics
#[derive(Debug, Default)]
pub struct AggregateCounters {
    active_workers: AtomicI64,
    total_operations: AtomicU64,
    total_wait_time_ms: AtomicU64,
}

impl AggregateCounters {
    /// Create zeroed counters
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an invocation as active until the guard drops
    #[must_use = "the worker is only counted while the guard lives"]
    pub fn enter(&self) -> ActiveWorkerGuard<'_> {
        self.active_workers.fetch_add(1, Ordering::AcqRel);
        ActiveWorkerGuard { counters: self }
    }

    /// One completed operation
    #[inline]
    pub fn record_operation(&self) {
        self.total_operations.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold an invocation's wait time into the total
    #[inline]
    pub fn add_wait_time_ms(&self, wait_ms: u64) {
        self.total_wait_time_ms.fetch_add(wait_ms, Ordering::Relaxed);
    }

    /// Zero the cumulative totals. Active workers are left alone.
    pub fn reset_totals(&self) {
        self.total_operations.store(0, Ordering::Relaxed);
        self.total_wait_time_ms.store(0, Ordering::Relaxed);
    }

    /// Invocations currently running
    #[inline]
    #[must_use]
    pub fn active_workers(&self) -> i64 {
        self.active_workers.load(Ordering::Acquire)
    }

    /// Operations completed since start or last reset
    #[inline]
    #[must_use]
    pub fn total_operations(&self) -> u64 {
        self.total_operations.load(Ordering::Relaxed)
    }

    /// Lock wait accumulated since start or last reset
    #[inline]
    #[must_use]
    pub fn total_wait_time_ms(&self) -> u64 {
        self.total_wait_time_ms.load(Ordering::Relaxed)
    }
}

/// Decrements the active worker count exactly once, on every exit path
#[derive(Debug)]
pub struct ActiveWorkerGuard<'a> {
    counters: &'a AggregateCounters,
}

impl Drop for ActiveWorkerGuard<'_> {
    fn drop(&mut self) {
        self.counters.active_workers.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Point-in-time view of the contention metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Invocations currently running
    #[serde(rename = "activeThreads")]
    pub active_workers: i64,
    /// Operations completed since start or last reset
    pub total_operations: u64,
    /// Lock wait accumulated since start or last reset
    pub total_wait_time_ms: u64,
    /// Keyed store entries
    pub shared_map_size: usize,
    /// Sequence entries
    pub shared_list_size: usize,
    /// `total_wait_time_ms / total_operations`, or 0 with no operations
    pub avg_wait_time_per_operation: u64,
}

impl MetricsSnapshot {
    /// Assemble a snapshot from counters and structure sizes
    #[must_use]
    pub fn capture(counters: &AggregateCounters, map_size: usize, list_size: usize) -> Self {
        let total_operations = counters.total_operations();
        let total_wait_time_ms = counters.total_wait_time_ms();
        let avg_wait_time_per_operation = if total_operations > 0 {
            total_wait_time_ms / total_operations
        } else {
            0
        };

        Self {
            active_workers: counters.active_workers().max(0),
            total_operations,
            total_wait_time_ms,
            shared_map_size: map_size,
            shared_list_size: list_size,
            avg_wait_time_per_operation,
        }
    }
}

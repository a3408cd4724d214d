//! One caller's burst of operations against the shared structures

use super::ContentionEngine;
use crate::telemetry::{CONTENTION_OPERATIONS, CONTENTION_WAIT_TIME};
use crate::types::{epoch_millis, EpochMillis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

static NEXT_INVOCATION: AtomicU64 = AtomicU64::new(0);

/// Identity of one invocation
///
/// Built from the calling thread, the wall clock and a process-wide
/// sequence number, so two invocations never share an id even within the
/// same millisecond on the same thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Derive a fresh id for the current execution context
    #[must_use]
    pub fn derive() -> Self {
        let sequence = NEXT_INVOCATION.fetch_add(1, Ordering::Relaxed);
        let thread = std::thread::current();
        let context = thread.name().unwrap_or("thread");
        Self(format!("api_{context}_{}_{sequence}", epoch_millis()))
    }

    /// Key written for the `op`-th operation of this invocation
    #[inline]
    #[must_use]
    pub fn operation_key(&self, op: u64) -> String {
        format!("{}_op_{op}", self.0)
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a single invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentionReport {
    /// Always `"lock-contention"`
    pub operation: String,
    /// Invocation identity
    pub worker_id: WorkerId,
    /// Effective (clamped) hold time
    pub hold_time_ms_per_operation: u64,
    /// Effective (clamped) operation count
    pub operations_requested: u64,
    /// Operations that ran to completion
    pub operations_completed: u64,
    /// Wall-clock duration of the whole invocation
    pub duration_ms: u64,
    /// Time spent waiting for lock A, summed over operations
    pub wait_time_ms: u64,
    /// Active invocations right after this one finished
    pub active_workers_now: i64,
    /// `wait_time_ms / duration_ms`, 0.0 when the duration rounds to zero
    pub contention_ratio: f64,
    /// Keyed store entries at completion
    pub shared_map_size: usize,
    /// Sequence entries at completion
    pub shared_list_size: usize,
    /// True when cancellation cut the loop short
    pub cancelled: bool,
    /// Completion time
    pub timestamp: EpochMillis,
}

impl ContentionEngine {
    /// Run one invocation.
    ///
    /// `hold_time_ms` and `operation_count` are clamped into the configured
    /// bounds, never rejected. Each operation:
    /// 1. waits for lock A and records the wait
    /// 2. writes a unique key into the keyed store
    /// 3. takes lock B and appends the key to the sequence
    /// 4. sleeps `hold_time_ms` holding both locks, then trims the sequence
    /// 5. releases B, then A
    ///
    /// `cancel` is honored between operations and while waiting for lock A,
    /// never while a lock is held. A cancelled run still returns a complete
    /// report covering the operations that finished.
    pub async fn run(
        &self,
        hold_time_ms: i64,
        operation_count: i64,
        cancel: &CancellationToken,
    ) -> ContentionReport {
        let started = Instant::now();
        let hold_time_ms = self.config.hold_time_ms.clamp(hold_time_ms);
        let operations_requested = self.config.operation_count.clamp(operation_count);
        let worker_id = WorkerId::derive();
        let hold = Duration::from_millis(hold_time_ms);

        debug!(
            worker = %worker_id,
            hold_time_ms,
            operations = operations_requested,
            "starting contention invocation"
        );

        let mut waited = Duration::ZERO;
        let mut completed = 0u64;
        let mut cancelled = false;

        {
            let _active = self.counters.enter();

            for op in 0..operations_requested {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break;
                }

                let requested = Instant::now();
                let mut store = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        cancelled = true;
                        break;
                    }
                    guard = self.shared.lock_store() => guard,
                };
                let wait = requested.elapsed();
                waited += wait;
                metrics::histogram!(CONTENTION_WAIT_TIME).record(wait.as_secs_f64() * 1000.0);

                let key = worker_id.operation_key(op);
                store.insert(key.clone(), epoch_millis());
                {
                    let mut sequence = store.lock_sequence().await;
                    sequence.push(key);
                    sleep(hold).await;
                    sequence.trim_if_exceeds(self.config.trim_threshold, self.config.trim_count);
                }
                drop(store);

                completed += 1;
                self.counters.record_operation();
                metrics::counter!(CONTENTION_OPERATIONS).increment(1);
            }
        }

        let wait_time_ms = millis(waited);
        self.counters.add_wait_time_ms(wait_time_ms);

        let duration_ms = millis(started.elapsed());
        let contention_ratio = if duration_ms > 0 {
            (wait_time_ms as f64 / duration_ms as f64).min(1.0)
        } else {
            0.0
        };

        if cancelled {
            warn!(
                worker = %worker_id,
                completed,
                requested = operations_requested,
                "contention invocation cancelled"
            );
        }

        let report = ContentionReport {
            operation: "lock-contention".to_string(),
            worker_id,
            hold_time_ms_per_operation: hold_time_ms,
            operations_requested,
            operations_completed: completed,
            duration_ms,
            wait_time_ms,
            active_workers_now: self.counters.active_workers().max(0),
            contention_ratio,
            shared_map_size: self.shared.store_len(),
            shared_list_size: self.shared.sequence_len(),
            cancelled,
            timestamp: epoch_millis(),
        };

        debug!(
            worker = %report.worker_id,
            duration_ms,
            wait_time_ms,
            ratio = report.contention_ratio,
            active = report.active_workers_now,
            "contention invocation completed"
        );

        report
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContentionConfig;

    #[test]
    fn worker_ids_are_unique() {
        let a = WorkerId::derive();
        let b = WorkerId::derive();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("api_"));
    }

    #[test]
    fn operation_keys_embed_worker() {
        let id = WorkerId::derive();
        assert_eq!(id.operation_key(3), format!("{id}_op_3"));
    }

    #[tokio::test(start_paused = true)]
    async fn solo_invocation_never_waits() {
        let engine = ContentionEngine::new(ContentionConfig::default()).unwrap();
        let report = engine.run(10, 10, &CancellationToken::new()).await;

        assert_eq!(report.operation, "lock-contention");
        assert_eq!(report.operations_completed, 10);
        assert_eq!(report.hold_time_ms_per_operation, 10);
        assert_eq!(report.wait_time_ms, 0);
        assert!(report.contention_ratio.abs() < f64::EPSILON);
        assert!((100..120).contains(&report.duration_ms));
        assert_eq!(report.shared_map_size, 10);
        assert_eq!(report.shared_list_size, 10);
        assert_eq!(report.active_workers_now, 0);
        assert!(!report.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn parameters_are_clamped() {
        let engine = ContentionEngine::default();
        let token = CancellationToken::new();

        let low = engine.run(-40, 0, &token).await;
        assert_eq!(low.hold_time_ms_per_operation, 10);
        assert_eq!(low.operations_requested, 10);
        assert_eq!(low.operations_completed, 10);

        let high = engine.run(10_000, 5_000, &token).await;
        assert_eq!(high.hold_time_ms_per_operation, 500);
        assert_eq!(high.operations_requested, 1000);
        assert_eq!(high.operations_completed, 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn sequence_trims_past_threshold() {
        let engine = ContentionEngine::default();
        let report = engine.run(10, 1000, &CancellationToken::new()).await;

        // 1001st append would trim; 1000 exactly does not
        assert_eq!(report.shared_list_size, 1000);

        let report = engine.run(10, 10, &CancellationToken::new()).await;
        // 1001 -> 501, then 9 more
        assert_eq!(report.shared_list_size, 510);
        assert_eq!(report.shared_map_size, 1010);
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_run_does_nothing() {
        let engine = ContentionEngine::default();
        let token = CancellationToken::new();
        token.cancel();

        let report = engine.run(50, 100, &token).await;
        assert!(report.cancelled);
        assert_eq!(report.operations_completed, 0);
        assert_eq!(report.shared_map_size, 0);
        assert_eq!(engine.counters().active_workers(), 0);
        assert_eq!(engine.counters().total_operations(), 0);
    }
}

//! Atomic drain of the shared structures and counter reset

use super::ContentionEngine;
use crate::error::ContentionError;
use crate::types::{epoch_millis, EpochMillis};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{info, warn};

/// Outcome of [`ContentionEngine::clear`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    /// Always `"contention-clear"`
    pub operation: String,
    /// Keyed store entries removed
    pub map_entries_cleared: usize,
    /// Sequence entries removed
    pub list_entries_cleared: usize,
    /// Totals were zeroed
    pub metrics_reset: bool,
    /// Completion time
    pub timestamp: EpochMillis,
}

impl ContentionEngine {
    /// Empty both shared structures and zero the cumulative totals.
    ///
    /// Takes lock A then lock B, the same order as every invocation, so it
    /// queues behind in-flight operations instead of deadlocking with them.
    /// Sizes are read under both locks immediately before the drain. The
    /// active worker count is untouched: running invocations decrement it
    /// themselves.
    ///
    /// The totals are zeroed after the locks are released. An invocation
    /// finishing in between can add to the fresh totals; that is accepted.
    ///
    /// # Errors
    /// `ContentionError::ResetTimedOut` if a reset deadline is configured and
    /// both locks could not be obtained within it. Nothing is cleared.
    pub async fn clear(&self) -> Result<ClearReport, ContentionError> {
        let (map_entries_cleared, list_entries_cleared) = match self.config.reset_timeout() {
            Some(limit) => timeout(limit, self.drain()).await.map_err(|_| {
                let waited_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                warn!(waited_ms, "contention reset timed out waiting for shared locks");
                ContentionError::ResetTimedOut { waited_ms }
            })?,
            None => self.drain().await,
        };

        self.counters.reset_totals();

        info!(
            map = map_entries_cleared,
            list = list_entries_cleared,
            "cleared contention data"
        );

        Ok(ClearReport {
            operation: "contention-clear".to_string(),
            map_entries_cleared,
            list_entries_cleared,
            metrics_reset: true,
            timestamp: epoch_millis(),
        })
    }

    async fn drain(&self) -> (usize, usize) {
        let mut store = self.shared.lock_store().await;
        store.drain_all().await
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ContentionConfig;
    use crate::contention::ContentionEngine;
    use crate::error::ContentionError;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[tokio::test(start_paused = true)]
    async fn clear_after_run_zeroes_everything() {
        let engine = ContentionEngine::default();
        engine.run(10, 20, &CancellationToken::new()).await;

        let report = engine.clear().await.unwrap();
        assert_eq!(report.operation, "contention-clear");
        assert_eq!(report.map_entries_cleared, 20);
        assert_eq!(report.list_entries_cleared, 20);
        assert!(report.metrics_reset);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.total_operations, 0);
        assert_eq!(snapshot.total_wait_time_ms, 0);
        assert_eq!(snapshot.shared_map_size, 0);
        assert_eq!(snapshot.shared_list_size, 0);
        assert_eq!(snapshot.active_workers, 0);
    }

    #[tokio::test]
    async fn clear_on_empty_engine() {
        let engine = ContentionEngine::default();
        let report = engine.clear().await.unwrap();
        assert_eq!(report.map_entries_cleared, 0);
        assert_eq!(report.list_entries_cleared, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_times_out_behind_long_hold() {
        let config = ContentionConfig::default().with_reset_timeout(Duration::from_millis(100));
        let engine = Arc::new(ContentionEngine::new(config).unwrap());

        let runner = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run(500, 10, &CancellationToken::new()).await })
        };
        // Let the runner take both locks
        tokio::time::sleep(Duration::from_millis(1)).await;

        let err = engine.clear().await.unwrap_err();
        assert!(matches!(err, ContentionError::ResetTimedOut { waited_ms: 100 }));
        // Nothing was drained and totals kept counting
        assert!(engine.shared_map_size() >= 1);

        let report = runner.await.unwrap();
        assert_eq!(report.operations_completed, 10);
        assert_eq!(engine.counters().total_operations(), 10);
    }
}

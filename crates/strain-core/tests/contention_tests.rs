//! Contention engine properties under concurrent invocations
//!
//! Most tests run on a paused clock: sleeps and lock waits advance virtual
//! time only, so wait times and ratios are deterministic.
//!
//! Run with: cargo test --package strain-core --test contention_tests

use std::sync::Arc;
use std::time::Duration;
use strain_core::contention::ContentionEngine;
use strain_core::{ContentionConfig, ContentionReport};
use tokio_util::sync::CancellationToken;

async fn run_concurrently(
    engine: &Arc<ContentionEngine>,
    workers: usize,
    hold_time_ms: i64,
    operation_count: i64,
) -> Vec<ContentionReport> {
    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let engine = Arc::clone(engine);
            tokio::spawn(async move {
                engine
                    .run(hold_time_ms, operation_count, &CancellationToken::new())
                    .await
            })
        })
        .collect();

    let mut reports = Vec::with_capacity(workers);
    for handle in handles {
        reports.push(handle.await.expect("worker task panicked"));
    }
    reports
}

fn mean_ratio(reports: &[ContentionReport]) -> f64 {
    reports.iter().map(|r| r.contention_ratio).sum::<f64>() / reports.len() as f64
}

#[tokio::test(start_paused = true)]
async fn two_concurrent_invocations_total_forty() {
    let engine = Arc::new(ContentionEngine::default());
    let reports = run_concurrently(&engine, 2, 20, 20).await;

    for report in &reports {
        assert_eq!(report.operations_completed, 20);
        assert!(!report.cancelled);
    }
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.total_operations, 40);
    assert_eq!(snapshot.active_workers, 0);
    assert_eq!(snapshot.shared_map_size, 40);
    assert_eq!(snapshot.shared_list_size, 40);
}

#[tokio::test(start_paused = true)]
async fn n_invocations_total_twenty_each() {
    for workers in [1usize, 3, 6] {
        let engine = Arc::new(ContentionEngine::default());
        run_concurrently(&engine, workers, 20, 20).await;
        assert_eq!(engine.snapshot().total_operations, 20 * workers as u64);
    }
}

#[tokio::test(start_paused = true)]
async fn contended_invocations_record_wait() {
    let engine = Arc::new(ContentionEngine::default());
    let reports = run_concurrently(&engine, 2, 20, 20).await;

    let waited: u64 = reports.iter().map(|r| r.wait_time_ms).sum();
    assert!(waited > 0, "two workers on one lock must wait");

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.total_wait_time_ms, waited);
    assert_eq!(snapshot.avg_wait_time_per_operation, waited / 40);
    for report in &reports {
        assert!((0.0..=1.0).contains(&report.contention_ratio));
    }
}

#[tokio::test(start_paused = true)]
async fn ratio_grows_with_concurrency() {
    let mut ratios = Vec::new();
    for workers in [1usize, 2, 4] {
        let engine = Arc::new(ContentionEngine::default());
        let reports = run_concurrently(&engine, workers, 20, 20).await;
        ratios.push(mean_ratio(&reports));
    }

    assert!(ratios[0] < 0.05, "solo ratio {}", ratios[0]);
    assert!(ratios[0] <= ratios[1], "{ratios:?}");
    assert!(ratios[1] <= ratios[2], "{ratios:?}");
    assert!(ratios[2] > ratios[0], "{ratios:?}");
}

#[tokio::test(start_paused = true)]
async fn active_workers_never_negative() {
    let engine = Arc::new(ContentionEngine::default());

    let monitor = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let mut samples = Vec::new();
            for _ in 0..100 {
                samples.push(engine.snapshot().active_workers);
                tokio::time::sleep(Duration::from_millis(7)).await;
            }
            samples
        })
    };

    run_concurrently(&engine, 4, 10, 10).await;
    let samples = monitor.await.unwrap();

    assert!(samples.iter().all(|&active| (0..=4).contains(&active)));
    assert!(samples.iter().any(|&active| active > 0));
    assert_eq!(engine.counters().active_workers(), 0);
}

#[tokio::test(start_paused = true)]
async fn list_never_exceeds_threshold() {
    let engine = Arc::new(ContentionEngine::default());
    let reports = run_concurrently(&engine, 3, 10, 500).await;

    for report in &reports {
        assert!(report.shared_list_size <= 1000);
    }
    // 1500 appends: trimmed once at 1001 -> 501, then 499 more
    assert_eq!(engine.shared_list_size(), 1000);
    assert_eq!(engine.shared_map_size(), 1500);
}

#[tokio::test(start_paused = true)]
async fn clear_resets_totals_not_active_workers() {
    let engine = Arc::new(ContentionEngine::default());

    let runner = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.run(50, 10, &CancellationToken::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(engine.counters().active_workers(), 1);

    let cleared = engine.clear().await.unwrap();
    assert!(cleared.map_entries_cleared >= 1);
    assert_eq!(engine.counters().active_workers(), 1);
    assert_eq!(engine.shared_list_size(), 0);

    let report = runner.await.unwrap();
    assert_eq!(report.operations_completed, 10);
    assert_eq!(engine.counters().active_workers(), 0);
    // Operations after the clear landed in the fresh structures
    assert_eq!(
        engine.shared_map_size() + cleared.map_entries_cleared,
        10
    );
}

#[tokio::test(start_paused = true)]
async fn clear_after_concurrent_runs() {
    let engine = Arc::new(ContentionEngine::default());
    run_concurrently(&engine, 2, 20, 20).await;

    let cleared = engine.clear().await.unwrap();
    assert_eq!(cleared.map_entries_cleared, 40);
    assert_eq!(cleared.list_entries_cleared, 40);

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.total_operations, 0);
    assert_eq!(snapshot.total_wait_time_ms, 0);
    assert_eq!(snapshot.shared_map_size, 0);
    assert_eq!(snapshot.shared_list_size, 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_mid_run_returns_partial_report() {
    let engine = Arc::new(ContentionEngine::default());
    let token = CancellationToken::new();

    let runner = {
        let engine = Arc::clone(&engine);
        let token = token.clone();
        tokio::spawn(async move { engine.run(10, 100, &token).await })
    };
    tokio::time::sleep(Duration::from_millis(55)).await;
    token.cancel();

    let report = runner.await.unwrap();
    assert!(report.cancelled);
    assert!(report.operations_completed > 0);
    assert!(report.operations_completed < 100);
    assert_eq!(report.operations_requested, 100);
    // Every completed operation is fully applied, none half-applied
    assert_eq!(report.shared_map_size as u64, report.operations_completed);
    assert_eq!(report.shared_list_size as u64, report.operations_completed);
    assert_eq!(
        engine.counters().total_operations(),
        report.operations_completed
    );
    assert_eq!(engine.counters().active_workers(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_while_waiting_for_lock() {
    let engine = Arc::new(ContentionEngine::default());

    let holder = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.run(500, 10, &CancellationToken::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;

    let token = CancellationToken::new();
    let waiter = {
        let engine = Arc::clone(&engine);
        let token = token.clone();
        tokio::spawn(async move { engine.run(10, 10, &token).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();

    let report = waiter.await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.operations_completed, 0);

    holder.abort();
    let _ = holder.await;
    assert_eq!(engine.counters().active_workers(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropped_invocation_releases_worker_count() {
    let engine = Arc::new(ContentionEngine::default());
    let runner = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.run(100, 50, &CancellationToken::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(engine.counters().active_workers(), 1);

    runner.abort();
    assert!(runner.await.unwrap_err().is_cancelled());
    assert_eq!(engine.counters().active_workers(), 0);

    // Locks were released with the dropped future
    let report = engine.run(10, 10, &CancellationToken::new()).await;
    assert_eq!(report.operations_completed, 10);
    assert_eq!(report.wait_time_ms, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn real_threads_keep_totals_exact() {
    let config = ContentionConfig::default();
    let engine = Arc::new(ContentionEngine::new(config).unwrap());
    let reports = run_concurrently(&engine, 8, 10, 10).await;

    assert_eq!(reports.len(), 8);
    assert!(reports.iter().all(|r| r.operations_completed == 10));
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.total_operations, 80);
    assert_eq!(snapshot.active_workers, 0);
    assert_eq!(snapshot.shared_map_size, 80);
}

//! CPU load generator
//!
//! `load` burns CPU three ways and then retains memory:
//! - trial-division primes below `iterations * 100`
//! - a parallel filter/square/sort pass over `iterations * 1000` integers
//! - a dense random matrix multiply
//!
//! `cpu_only` burns CPU without retaining anything.

use super::{random_buffers, AccumulationStore, ClearedEntries, LoadGenerator, StableReport};
use crate::config::CpuLoadConfig;
use crate::telemetry::{CPU_LOAD_CALLS, CPU_STABLE_CALLS};
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

const MIB: usize = 1024 * 1024;

/// Parameters for [`CpuLoad::load`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuLoadParams {
    /// Work multiplier
    pub iterations: u32,
    /// Mebibytes per retained buffer
    pub data_size_mb: u32,
}

/// Outcome of [`CpuLoad::load`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuLoadReport {
    /// Always `"cpu-memory-load"`
    pub operation: String,
    /// Primes found
    pub primes_calculated: usize,
    /// Integers surviving the filter/sort pass
    pub numbers_processed: usize,
    /// `"<n>x<n>"`
    pub matrix_size: String,
    /// Mebibytes retained by this call
    #[serde(rename = "dataStoredMB")]
    pub data_stored_mb: u64,
    /// Keys in the store after this call
    pub total_keys_in_store: usize,
    /// Wall-clock duration
    pub duration_ms: u64,
}

/// Outcome of [`CpuLoad::cpu_only`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuOnlyReport {
    /// Always `"cpu-only-load"`
    pub operation: String,
    /// Fibonacci(30) evaluations
    pub fibonacci_calculations: usize,
    /// Integers shuffled and sorted
    pub items_sorted: usize,
    /// Wall-clock duration
    pub duration_ms: u64,
}

/// CPU generator with its own retained store
#[derive(Debug, Default)]
pub struct CpuLoad {
    config: CpuLoadConfig,
    store: AccumulationStore,
}

impl CpuLoad {
    /// Create generator with an empty store
    #[must_use]
    pub fn new(config: CpuLoadConfig) -> Self {
        Self {
            config,
            store: AccumulationStore::new(),
        }
    }

    /// Active settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CpuLoadConfig {
        &self.config
    }

    /// Burn CPU without retaining anything
    #[must_use]
    pub fn cpu_only(&self, iterations: u32) -> CpuOnlyReport {
        metrics::counter!(CPU_STABLE_CALLS).increment(1);
        let started = Instant::now();
        let iterations = iterations as usize;

        let fibonacci: Vec<u64> = (0..iterations * 10).map(|_| fibonacci(30)).collect();

        let mut text = String::new();
        for _ in 0..iterations * 1000 {
            text.push_str(&Uuid::new_v4().to_string());
            if text.len() > 10_000 {
                text.clear();
            }
        }
        std::hint::black_box(&text);

        let mut items: Vec<u64> = (0..iterations as u64 * 5000).collect();
        items.shuffle(&mut rand::rng());
        items.sort_unstable_by(|a, b| b.cmp(a));

        CpuOnlyReport {
            operation: "cpu-only-load".to_string(),
            fibonacci_calculations: fibonacci.len(),
            items_sorted: items.len(),
            duration_ms: elapsed_ms(started),
        }
    }
}

impl LoadGenerator for CpuLoad {
    type Params = CpuLoadParams;
    type Report = CpuLoadReport;

    const NAME: &'static str = "cpu";

    fn stable(&self) -> StableReport {
        metrics::counter!(CPU_STABLE_CALLS).increment(1);
        StableReport::ok("cpu-stable")
    }

    fn load(&self, params: CpuLoadParams) -> CpuLoadReport {
        metrics::counter!(CPU_LOAD_CALLS).increment(1);
        let started = Instant::now();
        let iterations = u64::from(params.iterations);

        let primes_calculated = count_primes(iterations * 100);
        let numbers_processed =
            squares_of_evens_descending(iterations * 1000, iterations * 100).len();

        let dimension = self.config.matrix_dimension;
        std::hint::black_box(random_matrix_product(dimension));

        let buffer_len = params.data_size_mb as usize * MIB;
        let buffers = random_buffers(self.config.buffers_per_load as usize, buffer_len);
        let (key, total_keys_in_store) = self.store.insert(buffers);

        let report = CpuLoadReport {
            operation: "cpu-memory-load".to_string(),
            primes_calculated,
            numbers_processed,
            matrix_size: format!("{dimension}x{dimension}"),
            data_stored_mb: u64::from(params.data_size_mb)
                * u64::from(self.config.buffers_per_load),
            total_keys_in_store,
            duration_ms: elapsed_ms(started),
        };

        debug!(
            generator = Self::NAME,
            %key,
            primes = report.primes_calculated,
            stored_mb = report.data_stored_mb,
            keys = report.total_keys_in_store,
            "cpu load retained"
        );

        report
    }

    fn size(&self) -> usize {
        self.store.len()
    }

    fn retained_bytes(&self) -> u64 {
        self.store.bytes()
    }

    fn clear(&self) -> ClearedEntries {
        self.store.clear()
    }
}

fn is_prime(n: u64) -> bool {
    if n <= 1 {
        return false;
    }
    if n <= 3 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }
    let mut i = 5;
    while i * i <= n {
        if n % i == 0 || n % (i + 2) == 0 {
            return false;
        }
        i += 6;
    }
    true
}

/// Primes in `[2, limit)`
fn count_primes(limit: u64) -> usize {
    (2..limit.max(2)).into_par_iter().filter(|&n| is_prime(n)).count()
}

/// Squares of the even integers in `[0, upper)`, largest first, at most `keep`
fn squares_of_evens_descending(upper: u64, keep: u64) -> Vec<u64> {
    let mut squares: Vec<u64> = (0..upper)
        .into_par_iter()
        .filter(|n| n % 2 == 0)
        .map(|n| n.saturating_mul(n))
        .collect();
    squares.par_sort_unstable_by(|a, b| b.cmp(a));
    squares.truncate(usize::try_from(keep).unwrap_or(usize::MAX));
    squares
}

/// Multiply two random `dimension`-square matrices with digits 0..10
fn random_matrix_product(dimension: usize) -> Vec<Vec<u64>> {
    let mut rng = rand::rng();
    let mut random = || -> Vec<Vec<u64>> {
        (0..dimension)
            .map(|_| (0..dimension).map(|_| rng.random_range(0..10)).collect())
            .collect()
    };
    let left = random();
    let right = random();

    let mut product = vec![vec![0u64; dimension]; dimension];
    for (i, row) in product.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..dimension).map(|k| left[i][k] * right[k][j]).sum();
        }
    }
    product
}

fn fibonacci(n: u32) -> u64 {
    if n <= 1 {
        return u64::from(n);
    }
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 2..=n {
        let next = a + b;
        a = b;
        b = next;
    }
    b
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

//! Synthetic load generators
//!
//! Each generator:
//! - answers a fixed-cost `stable` baseline without touching state
//! - performs bounded work in `load` and keeps the produced buffers under a
//!   fresh key in its own [`AccumulationStore`]
//! - never evicts; only `clear` releases what `load` accumulated
//!
//! Generators are synchronous. Async callers run `load` on the blocking pool
//! (see [`Lab`](crate::Lab)).

mod cpu;
mod memory;

pub use cpu::{CpuLoad, CpuLoadParams, CpuLoadReport, CpuOnlyReport};
pub use memory::{MemoryLoad, MemoryLoadParams, MemoryLoadReport};

use crate::types::{epoch_millis, EpochMillis};
use dashmap::DashMap;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Common surface of the CPU and memory generators
pub trait LoadGenerator: Send + Sync {
    /// Load parameters
    type Params: Send + 'static;
    /// Load outcome
    type Report: Serialize + Send + 'static;

    /// Short name used in logs
    const NAME: &'static str;

    /// Fixed minimal cost, no state mutation
    fn stable(&self) -> StableReport;

    /// Perform bounded work and retain its output
    fn load(&self, params: Self::Params) -> Self::Report;

    /// Keys currently retained
    fn size(&self) -> usize;

    /// Bytes currently retained
    fn retained_bytes(&self) -> u64;

    /// Release everything retained
    fn clear(&self) -> ClearedEntries;
}

/// Baseline response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StableReport {
    /// `"cpu-stable"` or `"memory-stable"`
    pub operation: String,
    /// Always `"ok"`
    pub status: String,
    /// Response time
    pub timestamp: EpochMillis,
}

impl StableReport {
    pub(crate) fn ok(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            status: "ok".to_string(),
            timestamp: epoch_millis(),
        }
    }
}

/// Result of clearing a generator store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearedEntries {
    /// Keys removed
    pub entries_cleared: usize,
    /// Bytes released
    pub bytes_released: u64,
}

/// Unbounded keyed store of byte buffers
///
/// Safe for concurrent inserts, size reads and clears. Keys are fresh UUIDs,
/// so inserts never overwrite.
#[derive(Debug, Default)]
pub struct AccumulationStore {
    entries: DashMap<String, Vec<Vec<u8>>>,
    bytes: AtomicU64,
}

impl AccumulationStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Retain buffers under a fresh key.
    ///
    /// Returns the key and the number of keys now stored.
    pub fn insert(&self, buffers: Vec<Vec<u8>>) -> (String, usize) {
        let key = Uuid::new_v4().to_string();
        let bytes: u64 = buffers.iter().map(|b| b.len() as u64).sum();
        // Count bytes before the entry becomes visible to a concurrent clear
        self.bytes.fetch_add(bytes, Ordering::AcqRel);
        self.entries.insert(key.clone(), buffers);
        (key, self.entries.len())
    }

    /// Keys stored
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is stored
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes stored across all buffers
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Acquire)
    }

    /// Remove every entry, reporting exactly what was removed
    pub fn clear(&self) -> ClearedEntries {
        let mut entries_cleared = 0usize;
        let mut bytes_released = 0u64;
        self.entries.retain(|_, buffers| {
            entries_cleared += 1;
            bytes_released += buffers.iter().map(|b| b.len() as u64).sum::<u64>();
            false
        });
        self.bytes.fetch_sub(bytes_released, Ordering::AcqRel);
        ClearedEntries {
            entries_cleared,
            bytes_released,
        }
    }
}

/// `count` buffers of `len` random bytes each
pub(crate) fn random_buffers(count: usize, len: usize) -> Vec<Vec<u8>> {
    let mut rng = rand::rng();
    (0..count)
        .map(|_| {
            let mut buffer = vec![0u8; len];
            rng.fill_bytes(&mut buffer);
            buffer
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn insert_tracks_keys_and_bytes() {
        let store = AccumulationStore::new();
        let (first, len) = store.insert(random_buffers(2, 100));
        assert_eq!(len, 1);
        let (second, len) = store.insert(random_buffers(3, 10));
        assert_eq!(len, 2);
        assert_ne!(first, second);
        assert_eq!(store.bytes(), 230);
    }

    #[test]
    fn clear_reports_removed() {
        let store = AccumulationStore::new();
        store.insert(random_buffers(1, 64));
        store.insert(random_buffers(1, 64));

        let cleared = store.clear();
        assert_eq!(cleared.entries_cleared, 2);
        assert_eq!(cleared.bytes_released, 128);
        assert!(store.is_empty());
        assert_eq!(store.bytes(), 0);

        assert_eq!(store.clear().entries_cleared, 0);
    }

    #[test]
    fn random_buffers_are_not_zeroed() {
        let buffers = random_buffers(1, 4096);
        assert_eq!(buffers[0].len(), 4096);
        assert!(buffers[0].iter().any(|&b| b != 0));
    }

    #[test]
    fn concurrent_inserts_all_retained() {
        let store = Arc::new(AccumulationStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store.insert(random_buffers(1, 8));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 200);
        assert_eq!(store.bytes(), 1600);
    }
}

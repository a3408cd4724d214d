//! Shared structures every invocation competes for
//!
//! Two independent async mutexes:
//! - lock A guards the keyed store
//! - lock B guards the sequence
//!
//! Lock B is only reachable through a held [`StoreGuard`], so A is acquired
//! before B on every path, and a [`SequenceGuard`] borrows the store guard so
//! B is released before A. Lengths are mirrored into atomics while the owning
//! lock is held; size reads never lock.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, MutexGuard};

/// Keyed store and sequence, created once and never replaced
#[derive(Debug, Default)]
pub struct SharedState {
    store: Mutex<HashMap<String, u64>>,
    store_len: AtomicUsize,
    sequence: SharedSequence,
}

/// Sequence half of [`SharedState`]
#[derive(Debug, Default)]
struct SharedSequence {
    items: Mutex<VecDeque<String>>,
    len: AtomicUsize,
}

impl SharedState {
    /// Create empty shared state
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire lock A. May wait indefinitely.
    pub async fn lock_store(&self) -> StoreGuard<'_> {
        StoreGuard {
            entries: self.store.lock().await,
            len: &self.store_len,
            sequence: &self.sequence,
        }
    }

    /// Keyed store size, without locking
    #[inline]
    #[must_use]
    pub fn store_len(&self) -> usize {
        self.store_len.load(Ordering::Acquire)
    }

    /// Sequence size, without locking
    #[inline]
    #[must_use]
    pub fn sequence_len(&self) -> usize {
        self.sequence.len.load(Ordering::Acquire)
    }
}

/// Holder of lock A
#[derive(Debug)]
pub struct StoreGuard<'a> {
    entries: MutexGuard<'a, HashMap<String, u64>>,
    len: &'a AtomicUsize,
    sequence: &'a SharedSequence,
}

impl StoreGuard<'_> {
    /// Insert or overwrite a key
    pub fn insert(&mut self, key: String, value: u64) {
        self.entries.insert(key, value);
        self.len.store(self.entries.len(), Ordering::Release);
    }

    /// Entries currently stored
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

    /// Acquire lock B while holding A.
    ///
    /// The returned guard borrows `self`, so it must be dropped before lock A
    /// can be released.
    pub async fn lock_sequence(&self) -> SequenceGuard<'_> {
        SequenceGuard {
            items: self.sequence.items.lock().await,
            len: &self.sequence.len,
        }
    }

    /// Acquire lock B, then empty both structures.
    ///
    /// Returns `(store_entries, sequence_entries)` as they were just before
    /// the drain. No await point follows the second acquisition, so either
    /// both structures are emptied or neither is.
    pub async fn drain_all(&mut self) -> (usize, usize) {
        let mut items = self.sequence.items.lock().await;
        let store_entries = self.entries.len();
        let sequence_entries = items.len();

        items.clear();
        self.sequence.len.store(0, Ordering::Release);
        drop(items);

        self.entries.clear();
        self.len.store(0, Ordering::Release);

        (store_entries, sequence_entries)
    }
}

/// Holder of lock B (and, through its borrow, lock A)
#[derive(Debug)]
pub struct SequenceGuard<'a> {
    items: MutexGuard<'a, VecDeque<String>>,
    len: &'a AtomicUsize,
}

impl SequenceGuard<'_> {
    /// Append to the newest end
    pub fn push(&mut self, key: String) {
        self.items.push_back(key);
        self.len.store(self.items.len(), Ordering::Release);
    }

    /// Discard the oldest `count` entries once length exceeds `threshold`.
    ///
    /// Returns how many entries were discarded.
    pub fn trim_if_exceeds(&mut self, threshold: usize, count: usize) -> usize {
        if self.items.len() <= threshold {
            return 0;
        }
        let discard = count.min(self.items.len());
        self.items.drain(..discard);
        self.len.store(self.items.len(), Ordering::Release);
        discard
    }

    /// Entries currently held
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the sequence is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Oldest entry, if any
    #[inline]
    #[must_use]
    pub fn front(&self) -> Option<&str> {
        self.items.front().map(String::as_str)
    }
}

//! Time-indexed key store with atomic insert-if-absent.
//!
//! Keys carry a deadline. A min-heap of deadlines drives expiry, and expiry
//! runs under the same lock as insertion, so a purge can never race a
//! concurrent re-insertion of the same key.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Mutex-guarded set of keys that expire a fixed time after insertion.
#[derive(Debug)]
pub struct TtlStore {
    inner: Mutex<Inner>,
    max_entries: Option<usize>,
}

#[derive(Debug, Default)]
struct Inner {
    deadlines: HashMap<String, Instant>,
    expirations: BinaryHeap<Reverse<(Instant, String)>>,
}

impl Inner {
    fn purge(&mut self, now: Instant) -> usize {
        let mut removed = 0;
        while self
            .expirations
            .peek()
            .is_some_and(|Reverse((deadline, _))| *deadline <= now)
        {
            if let Some(Reverse((deadline, key))) = self.expirations.pop() {
                if self.remove_if_deadline(&key, deadline) {
                    removed += 1;
                }
            }
        }
        removed
    }

    /// Drops the entry closest to expiry.
    fn evict_earliest(&mut self) {
        while let Some(Reverse((deadline, key))) = self.expirations.pop() {
            if self.remove_if_deadline(&key, deadline) {
                return;
            }
        }
    }

    // A heap entry only owns the key if the deadlines still agree.
    fn remove_if_deadline(&mut self, key: &str, deadline: Instant) -> bool {
        if self.deadlines.get(key) == Some(&deadline) {
            self.deadlines.remove(key);
            true
        } else {
            false
        }
    }
}

impl TtlStore {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_entries: None,
        }
    }

    /// Create a store that evicts the soonest-expiring entry once full.
    pub fn bounded(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_entries: Some(max_entries.max(1)),
        }
    }

    /// Insert `key` with a lifetime of `ttl` unless it is already live.
    ///
    /// Returns `true` if the key was inserted. An existing key keeps its
    /// original deadline.
    pub fn insert_if_absent(&self, key: &str, ttl: Duration) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.purge(now);

        if inner.deadlines.contains_key(key) {
            return false;
        }

        if let Some(max) = self.max_entries {
            if inner.deadlines.len() >= max {
                inner.evict_earliest();
            }
        }

        let deadline = now + ttl;
        inner.deadlines.insert(key.to_string(), deadline);
        inner.expirations.push(Reverse((deadline, key.to_string())));
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        inner.purge(Instant::now());
        inner.deadlines.contains_key(key)
    }

    /// Remove every expired key, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        self.inner.lock().purge(Instant::now())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TtlStore {
    fn default() -> Self {
        Self::new()
    }
}

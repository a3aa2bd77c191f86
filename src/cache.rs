//! Content-addressed digest cache with per-entry duplicate suppression.
//!
//! Two lock levels, per the design: a table lock guarding the path→entry
//! map (held only for insert/lookup, never across a wait), and a per-entry
//! lock + condvar guarding that entry's state. Lock order is always
//! table → entry, and `await_result`/`complete` touch only the entry lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// The terminal outcome of a digest computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// The digest was computed successfully.
    Ready(String),
    /// The digest could not be computed; cached so repeats don't retry.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CacheState {
    Pending,
    Ready(String),
    Failed,
}

/// A single path's cache slot: state plus the waiters blocked on it.
pub struct CacheEntry {
    state: Mutex<CacheState>,
    became_terminal: Condvar,
}

impl CacheEntry {
    fn new() -> Self {
        CacheEntry {
            state: Mutex::new(CacheState::Pending),
            became_terminal: Condvar::new(),
        }
    }
}

impl Default for CacheEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot tag for diagnostic rendering; carries the digest when ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotState {
    /// Computation is still in flight.
    Pending,
    /// The digest has been computed.
    Ready(String),
    /// The computation failed and is cached as such.
    Failed,
}

/// Map from file path to `CacheEntry`, for the process lifetime. Entries
/// are never evicted, reference-counted away, or persisted — see the
/// spec's Non-goals.
pub struct DigestCache {
    table: Mutex<HashMap<String, Arc<CacheEntry>>>,
}

impl DigestCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        DigestCache {
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Look up the entry for `path`, creating a fresh `Pending` one if
    /// absent. Across concurrent calls for the same path, exactly one
    /// returns `created = true`; that caller becomes the entry's owner and
    /// must eventually call [`DigestCache::complete`].
    pub fn lookup_or_insert(&self, path: &str) -> (Arc<CacheEntry>, bool) {
        let mut table = self.table.lock();
        if let Some(entry) = table.get(path) {
            return (Arc::clone(entry), false);
        }
        let entry = Arc::new(CacheEntry::new());
        table.insert(path.to_string(), Arc::clone(&entry));
        (entry, true)
    }

    /// Block until `entry` reaches a terminal state, then return it.
    /// Returns immediately if already terminal.
    pub fn await_result(&self, entry: &CacheEntry) -> Terminal {
        let mut state = entry.state.lock();
        loop {
            match &*state {
                CacheState::Ready(hex) => return Terminal::Ready(hex.clone()),
                CacheState::Failed => return Terminal::Failed,
                CacheState::Pending => entry.became_terminal.wait(&mut state),
            }
        }
    }

    /// Transition `entry` to a terminal state and wake every waiter.
    ///
    /// Must be called exactly once per entry, only by the owner (the
    /// caller that received `created = true` from `lookup_or_insert`).
    /// Panics if the entry is not `Pending` — that denotes a double-
    /// `complete` or a non-owner call, both internal invariant violations.
    pub fn complete(&self, entry: &CacheEntry, outcome: Terminal) {
        let mut state = entry.state.lock();
        assert_eq!(
            *state,
            CacheState::Pending,
            "internal invariant violated: complete() called on a non-Pending entry"
        );
        *state = match outcome {
            Terminal::Ready(hex) => CacheState::Ready(hex),
            Terminal::Failed => CacheState::Failed,
        };
        entry.became_terminal.notify_all();
    }

    /// Non-blocking digest lookup. Returns `None` for a missing, `Pending`,
    /// or `Failed` entry.
    pub fn try_get(&self, path: &str) -> Option<String> {
        let table = self.table.lock();
        let entry = table.get(path)?;
        match &*entry.state.lock() {
            CacheState::Ready(hex) => Some(hex.clone()),
            _ => None,
        }
    }

    /// A consistent snapshot of every known path and its state, sorted by
    /// path for deterministic rendering.
    pub fn snapshot(&self) -> Vec<(String, SnapshotState)> {
        let table = self.table.lock();
        let mut out: Vec<(String, SnapshotState)> = table
            .iter()
            .map(|(path, entry)| {
                let tag = match &*entry.state.lock() {
                    CacheState::Pending => SnapshotState::Pending,
                    CacheState::Ready(hex) => SnapshotState::Ready(hex.clone()),
                    CacheState::Failed => SnapshotState::Failed,
                };
                (path.clone(), tag)
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

impl Default for DigestCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn exactly_one_concurrent_lookup_is_the_owner() {
        let cache = Arc::new(DigestCache::new());
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.lookup_or_insert("/tmp/big").1
                })
            })
            .collect();

        let created_count: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|created| *created)
            .count();
        assert_eq!(created_count, 1);
    }

    #[test]
    fn waiters_unblock_after_complete_and_see_the_same_hex() {
        let cache = Arc::new(DigestCache::new());
        let (owner_entry, created) = cache.lookup_or_insert("/tmp/x");
        assert!(created);

        let waiters: Vec<_> = (0..5)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let (entry, created) = cache.lookup_or_insert("/tmp/x");
                assert!(!created);
                thread::spawn(move || cache.await_result(&entry))
            })
            .collect();

        // Give the waiters a chance to block before completing.
        thread::sleep(std::time::Duration::from_millis(50));
        cache.complete(&owner_entry, Terminal::Ready("abc123".to_string()));

        for handle in waiters {
            assert_eq!(
                handle.join().unwrap(),
                Terminal::Ready("abc123".to_string())
            );
        }
    }

    #[test]
    fn failed_completion_unblocks_waiters_with_failed() {
        let cache = Arc::new(DigestCache::new());
        let (entry, created) = cache.lookup_or_insert("/does/not/exist");
        assert!(created);
        cache.complete(&entry, Terminal::Failed);
        assert_eq!(cache.await_result(&entry), Terminal::Failed);
        assert_eq!(cache.try_get("/does/not/exist"), None);
    }

    #[test]
    #[should_panic(expected = "internal invariant violated")]
    fn completing_twice_panics() {
        let cache = DigestCache::new();
        let (entry, _) = cache.lookup_or_insert("/tmp/x");
        cache.complete(&entry, Terminal::Ready("a".repeat(64)));
        cache.complete(&entry, Terminal::Ready("b".repeat(64)));
    }

    #[test]
    fn try_get_is_none_for_pending_and_missing() {
        let cache = DigestCache::new();
        assert_eq!(cache.try_get("/never/seen"), None);
        let (_entry, _) = cache.lookup_or_insert("/tmp/x");
        assert_eq!(cache.try_get("/tmp/x"), None);
    }

    #[test]
    fn snapshot_reflects_all_three_states_sorted_by_path() {
        let cache = DigestCache::new();
        let (ready, _) = cache.lookup_or_insert("/tmp/ready");
        cache.complete(&ready, Terminal::Ready("f".repeat(64)));

        let (failed, _) = cache.lookup_or_insert("/tmp/failed");
        cache.complete(&failed, Terminal::Failed);

        cache.lookup_or_insert("/tmp/pending");

        let snapshot = cache.snapshot();
        assert_eq!(
            snapshot,
            vec![
                (
                    "/tmp/failed".to_string(),
                    SnapshotState::Failed
                ),
                ("/tmp/pending".to_string(), SnapshotState::Pending),
                (
                    "/tmp/ready".to_string(),
                    SnapshotState::Ready("f".repeat(64))
                ),
            ]
        );
    }
}

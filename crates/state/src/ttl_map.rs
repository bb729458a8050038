//! TTL-indexed map with lazy expiration.
//!
//! Entries carry an absolute deadline. Expired entries are invisible to every
//! read and are deleted when a read or iteration touches them; no background
//! sweeper is required.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct TtlEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Map whose entries disappear after their per-entry TTL elapses.
///
/// Not internally synchronized; callers wrap it in a mutex.
pub struct TtlMap<K, V> {
    entries: HashMap<K, TtlEntry<V>>,
}

impl<K: Eq + Hash + Clone, V> TtlMap<K, V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Insert or refresh an entry with a deadline of `now + ttl`.
    pub fn insert_at(&mut self, key: K, value: V, ttl: Duration, now: Instant) {
        self.entries.insert(
            key,
            TtlEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    /// Fetch a live entry; an expired entry is deleted and reported missing.
    pub fn get_at(&mut self, key: &K, now: Instant) -> Option<&V> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at <= now {
                self.entries.remove(key);
                return None;
            }
        }
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    /// Visit every live entry, deleting expired ones along the way.
    pub fn for_each_active_at(&mut self, now: Instant, mut visit: impl FnMut(&K, &V)) {
        self.entries.retain(|_, e| e.expires_at > now);
        for (k, e) in &self.entries {
            visit(k, &e.value);
        }
    }

    /// Number of live entries (prunes expired ones).
    pub fn len_active_at(&mut self, now: Instant) -> usize {
        self.entries.retain(|_, e| e.expires_at > now);
        self.entries.len()
    }
}

impl<K: Eq + Hash + Clone, V> Default for TtlMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

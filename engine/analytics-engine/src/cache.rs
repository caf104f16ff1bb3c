//! # TTL Cache
//!
//! Small concurrent cache where every entry expires a fixed time after insertion.

use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Key → value cache with a single time-to-live for every entry
///
/// Holds at most `max_entries` keys. Inserting a new key into a full cache first drops
/// expired entries, then the entry closest to expiry.
#[derive(Debug)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
    max_entries: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty, unbounded cache. A zero TTL disables caching: nothing is ever a hit.
    pub fn new(ttl: Duration) -> Self {
        Self::with_max_entries(ttl, usize::MAX)
    }

    /// Create an empty cache holding at most `max_entries` keys (at least one)
    pub fn with_max_entries(ttl: Duration, max_entries: usize) -> Self {
        Self { entries: DashMap::new(), ttl, max_entries: max_entries.max(1) }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Look up `key` as of `now`, dropping the entry if it has expired
    pub fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }

        None
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    pub fn insert_at(&self, key: K, value: V, now: Instant) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.make_room(now);
        }
        self.entries.insert(key, CacheEntry { value, expires_at: now + self.ttl });
    }

    fn make_room(&self, now: Instant) {
        if self.purge_expired_at(now) > 0 && self.entries.len() < self.max_entries {
            return;
        }

        while self.entries.len() >= self.max_entries {
            // Iterator guard must be gone before removing
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().expires_at)
                .map(|entry| entry.key().clone());

            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry that has expired as of `now`; returns how many were dropped
    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }
}

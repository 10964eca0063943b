//! Key/value map with a per-entry time-to-live.
//!
//! Expiry is measured from insertion, never refreshed on access, and is
//! checked lazily: an expired entry is invisible to every read even before
//! [`ExpiringMap::expire_keys`] physically removes it.
//!
//! The map takes `&mut self` for every mutation; callers sharing one across
//! tasks put it behind a mutex.
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

/// Longest TTL an entry can carry; longer requests are clamped
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

#[derive(Clone, Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Clone, Debug)]
pub struct ExpiringMap<K, V> {
    default_ttl: Duration,
    entries: HashMap<K, Entry<V>>,
}

impl<K: Eq + Hash, V> ExpiringMap<K, V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            entries: HashMap::new(),
        }
    }

    /// Insert or overwrite `key`, expiring `ttl` from now.
    pub fn put(&mut self, key: K, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl.min(MAX_TTL);
        self.entries.insert(key, Entry { value, expires_at });
    }

    /// Insert with the map's default TTL.
    pub fn insert(&mut self, key: K, value: V) {
        self.put(key, value, self.default_ttl);
    }

    /// Insert only when no live entry exists for `key`.
    /// Returns true if this call performed the insertion.
    pub fn insert_if_absent(&mut self, key: K, value: V, ttl: Duration) -> bool {
        let now = Instant::now();
        match self.entries.get(&key) {
            Some(entry) if entry.is_live(now) => false,
            _ => {
                self.entries.insert(
                    key,
                    Entry {
                        value,
                        expires_at: now + ttl.min(MAX_TTL),
                    },
                );
                true
            }
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| &entry.value)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Time left before `key` expires, if it is live.
    pub fn remaining_ttl<Q>(&self, key: &Q) -> Option<Duration>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at - now)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        self.entries
            .remove(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value)
    }

    /// Iterate over live entries only.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(move |(_, entry)| entry.is_live(now))
            .map(|(key, entry)| (key, &entry.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries to keep the map from growing endlessly.
    /// Returns how many were removed.
    pub fn expire_keys(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before - self.entries.len()
    }
}

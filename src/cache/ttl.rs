//! Clock-driven TTL cache with scope-based invalidation
//!
//! Entries can be registered under any number of [`Scope`]s. Invalidating a
//! scope drops exactly the keys registered under it, so callers never need to
//! know how keys are spelled. Prefix invalidation remains for callers that
//! only have a key pattern.

use crate::clock::SharedClock;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Logical owner of a set of cache keys
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Everything derived from one player's data
    Player(String),
    /// Everything produced by one query shape (filters, ordering)
    QueryShape(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Player(id) => write!(f, "player:{}", id),
            Scope::QueryShape(shape) => write!(f, "shape:{}", shape),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
    scopes: Vec<Scope>,
}

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    index: HashMap<Scope, HashSet<String>>,
}

impl<V> Default for CacheState<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            index: HashMap::new(),
        }
    }
}

impl<V> CacheState<V> {
    fn remove(&mut self, key: &str) -> bool {
        let Some(entry) = self.entries.remove(key) else {
            return false;
        };
        for scope in entry.scopes {
            if let Some(keys) = self.index.get_mut(&scope) {
                keys.remove(key);
                if keys.is_empty() {
                    self.index.remove(&scope);
                }
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn merge(self, other: CacheStats) -> CacheStats {
        CacheStats {
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
            entries: self.entries + other.entries,
        }
    }
}

pub struct TtlCache<V> {
    clock: SharedClock,
    state: RwLock<CacheState<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            state: RwLock::new(CacheState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState<V>> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState<V>> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Live value for `key`; an expired entry is a miss
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let value = self
            .read()
            .entries
            .get(key)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.value.clone());

        match value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        value
    }

    pub fn set(&self, key: impl Into<String>, value: V, ttl_ms: u64) {
        self.set_scoped(key, value, ttl_ms, &[]);
    }

    /// Insert and register the key under each of `scopes`
    pub fn set_scoped(&self, key: impl Into<String>, value: V, ttl_ms: u64, scopes: &[Scope]) {
        let key = key.into();
        let ttl = Duration::milliseconds(ttl_ms.min(i64::MAX as u64) as i64);
        let expires_at = self.clock.now() + ttl;

        let mut state = self.write();
        state.remove(&key);
        for scope in scopes {
            state.index.entry(scope.clone()).or_default().insert(key.clone());
        }
        state.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at,
                scopes: scopes.to_vec(),
            },
        );
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.write().remove(key)
    }

    /// Drop every key registered under `scope`
    pub fn invalidate_scope(&self, scope: &Scope) -> usize {
        let mut state = self.write();
        let keys: Vec<String> = state
            .index
            .get(scope)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.iter().filter(|key| state.remove(key)).count()
    }

    pub fn invalidate_by_prefix(&self, prefix: &str) -> usize {
        let mut state = self.write();
        let keys: Vec<String> = state
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.iter().filter(|key| state.remove(key)).count()
    }

    /// Remove expired entries; returns how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.write();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| now >= entry.expires_at)
            .map(|(key, _)| key.clone())
            .collect();
        expired.iter().filter(|key| state.remove(key)).count()
    }

    pub fn clear(&self) {
        let mut state = self.write();
        state.entries.clear();
        state.index.clear();
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

//! In-process document store with optimistic concurrency
//!
//! Each player resource carries a version. A transaction reads the record and
//! its version, runs the closure, yields, then commits only if the version is
//! unchanged. A lost race is retried once against a fresh read before the
//! caller sees [`ConcurrencyConflict`].

use super::query::{Filter, Query};
use super::{DocumentStore, TransactionFn};
use crate::errors::{ArenaResult, ConcurrencyConflict, PersistenceError};
use crate::resource::PlayerResource;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;
use uuid::Uuid;

/// Attempts a transaction gets: the first read plus one fresh retry
pub const TRANSACTION_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone)]
struct Versioned {
    version: u64,
    resource: PlayerResource,
}

#[derive(Debug)]
pub struct MemoryStore {
    documents: DashMap<String, Versioned>,
    /// collection -> ordered (id, record) pairs
    collections: DashMap<String, Vec<(String, Value)>>,
    available: AtomicBool,
    commits: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
            collections: DashMap::new(),
            available: AtomicBool::new(true),
            commits: AtomicU64::new(0),
        }
    }

    /// Take the store offline; every call then fails with `Unavailable`
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Successful resource commits so far
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Current version of a resource, if it exists
    pub fn version(&self, id: &str) -> Option<u64> {
        self.documents.get(id).map(|doc| doc.version)
    }

    /// Number of records in a collection
    pub fn collection_len(&self, collection: &str) -> usize {
        self.collections.get(collection).map(|c| c.len()).unwrap_or(0)
    }

    fn ensure_available(&self) -> ArenaResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PersistenceError::Unavailable("memory store is offline".to_string()).into())
        }
    }

    fn snapshot(&self, id: &str) -> Option<Versioned> {
        self.documents.get(id).map(|doc| doc.value().clone())
    }

    /// Compare-and-swap against the version seen at read time
    fn commit(&self, id: &str, expected: Option<u64>, resource: PlayerResource) -> bool {
        let committed = match self.documents.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                if Some(entry.get().version) != expected {
                    return false;
                }
                let doc = entry.get_mut();
                doc.version += 1;
                doc.resource = resource;
                true
            }
            Entry::Vacant(entry) => {
                if expected.is_some() {
                    return false;
                }
                entry.insert(Versioned {
                    version: 1,
                    resource,
                });
                true
            }
        };
        if committed {
            self.commits.fetch_add(1, Ordering::SeqCst);
        }
        committed
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self, id: &str) -> ArenaResult<Option<PlayerResource>> {
        self.ensure_available()?;
        Ok(self.snapshot(id).map(|doc| doc.resource))
    }

    async fn write(&self, id: &str, resource: &PlayerResource) -> ArenaResult<()> {
        self.ensure_available()?;
        match self.documents.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                let doc = entry.get_mut();
                doc.version += 1;
                doc.resource = resource.clone();
            }
            Entry::Vacant(entry) => {
                entry.insert(Versioned {
                    version: 1,
                    resource: resource.clone(),
                });
            }
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn run_transaction(&self, id: &str, mut f: TransactionFn) -> ArenaResult<PlayerResource> {
        for attempt in 1..=TRANSACTION_ATTEMPTS {
            self.ensure_available()?;

            let current = self.snapshot(id);
            let expected = current.as_ref().map(|doc| doc.version);
            let next = f(current.map(|doc| doc.resource))?;

            // Other tasks may commit between our read and our write
            tokio::task::yield_now().await;

            self.ensure_available()?;
            if self.commit(id, expected, next.clone()) {
                return Ok(next);
            }
            debug!(document = %id, attempt, "Transaction lost a race, re-reading");
        }

        Err(ConcurrencyConflict {
            document_id: id.to_string(),
            attempts: TRANSACTION_ATTEMPTS,
        }
        .into())
    }

    async fn append_record(&self, collection: &str, record: Value) -> ArenaResult<String> {
        self.ensure_available()?;
        let id = Uuid::new_v4().to_string();
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push((id.clone(), record));
        Ok(id)
    }

    async fn upsert_record(&self, collection: &str, id: &str, record: Value) -> ArenaResult<()> {
        self.ensure_available()?;
        let mut records = self.collections.entry(collection.to_string()).or_default();
        match records.iter_mut().find(|(existing, _)| existing == id) {
            Some((_, slot)) => *slot = record,
            None => records.push((id.to_string(), record)),
        }
        Ok(())
    }

    async fn get_record(&self, collection: &str, id: &str) -> ArenaResult<Option<Value>> {
        self.ensure_available()?;
        Ok(self.collections.get(collection).and_then(|records| {
            records
                .iter()
                .find(|(existing, _)| existing == id)
                .map(|(_, record)| record.clone())
        }))
    }

    async fn query(&self, collection: &str, query: &Query) -> ArenaResult<Vec<Value>> {
        self.ensure_available()?;
        Ok(match self.collections.get(collection) {
            Some(records) => query.apply(records.iter().map(|(_, record)| record)),
            None => Vec::new(),
        })
    }

    async fn count(&self, collection: &str, filters: &[Filter]) -> ArenaResult<usize> {
        self.ensure_available()?;
        Ok(match self.collections.get(collection) {
            Some(records) => records
                .iter()
                .filter(|(_, record)| filters.iter().all(|f| f.matches(record)))
                .count(),
            None => 0,
        })
    }
}

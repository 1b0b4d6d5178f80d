//! Storage collaborator interface
//!
//! The core never caches [`PlayerResource`] records across requests; every
//! mutation goes through [`DocumentStore::run_transaction`], which re-reads
//! the record and hands the fresh state to the caller's closure.

pub mod memory;
pub mod metered;
pub mod query;

pub use memory::MemoryStore;
pub use metered::MeteredStore;
pub use query::{Filter, FilterOp, OrderBy, Query};

use crate::errors::ArenaResult;
use crate::resource::PlayerResource;
use async_trait::async_trait;
use serde_json::Value;

/// Computes the next state of a record from its freshly read state.
/// May be invoked more than once if the first commit loses a race.
pub type TransactionFn =
    Box<dyn FnMut(Option<PlayerResource>) -> ArenaResult<PlayerResource> + Send>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a player resource; `None` when it does not exist yet
    async fn read(&self, id: &str) -> ArenaResult<Option<PlayerResource>>;

    /// Unconditionally overwrite a player resource
    async fn write(&self, id: &str, resource: &PlayerResource) -> ArenaResult<()>;

    /// Read, compute and commit atomically; an error from `f` aborts without writing
    async fn run_transaction(&self, id: &str, f: TransactionFn) -> ArenaResult<PlayerResource>;

    /// Append a record with a generated id, returned on success
    async fn append_record(&self, collection: &str, record: Value) -> ArenaResult<String>;

    /// Insert or replace a record under a known id
    async fn upsert_record(&self, collection: &str, id: &str, record: Value) -> ArenaResult<()>;

    async fn get_record(&self, collection: &str, id: &str) -> ArenaResult<Option<Value>>;

    async fn query(&self, collection: &str, query: &Query) -> ArenaResult<Vec<Value>>;

    async fn count(&self, collection: &str, filters: &[Filter]) -> ArenaResult<usize>;
}

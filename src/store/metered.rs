//! Store wrapper that reports every call to the telemetry aggregator

use super::query::{Filter, Query};
use super::{DocumentStore, TransactionFn};
use crate::errors::ArenaResult;
use crate::resource::{PlayerResource, RESOURCES_COLLECTION};
use crate::telemetry::{Operation, UsageTelemetryAggregator};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub struct MeteredStore<S: ?Sized> {
    inner: Arc<S>,
    telemetry: Arc<UsageTelemetryAggregator>,
}

impl<S: DocumentStore + ?Sized> MeteredStore<S> {
    pub fn new(inner: Arc<S>, telemetry: Arc<UsageTelemetryAggregator>) -> Self {
        Self { inner, telemetry }
    }

    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    fn observe(&self, operation: Operation, collection: &str) {
        self.telemetry.record_current(operation, collection);
    }
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for MeteredStore<S> {
    async fn read(&self, id: &str) -> ArenaResult<Option<PlayerResource>> {
        self.observe(Operation::Read, RESOURCES_COLLECTION);
        self.inner.read(id).await
    }

    async fn write(&self, id: &str, resource: &PlayerResource) -> ArenaResult<()> {
        self.observe(Operation::Write, RESOURCES_COLLECTION);
        self.inner.write(id, resource).await
    }

    async fn run_transaction(&self, id: &str, f: TransactionFn) -> ArenaResult<PlayerResource> {
        self.observe(Operation::Read, RESOURCES_COLLECTION);
        self.observe(Operation::Write, RESOURCES_COLLECTION);
        self.inner.run_transaction(id, f).await
    }

    async fn append_record(&self, collection: &str, record: Value) -> ArenaResult<String> {
        self.observe(Operation::Write, collection);
        self.inner.append_record(collection, record).await
    }

    async fn upsert_record(&self, collection: &str, id: &str, record: Value) -> ArenaResult<()> {
        self.observe(Operation::Write, collection);
        self.inner.upsert_record(collection, id, record).await
    }

    async fn get_record(&self, collection: &str, id: &str) -> ArenaResult<Option<Value>> {
        self.observe(Operation::Read, collection);
        self.inner.get_record(collection, id).await
    }

    async fn query(&self, collection: &str, query: &Query) -> ArenaResult<Vec<Value>> {
        self.observe(Operation::Read, collection);
        self.inner.query(collection, query).await
    }

    async fn count(&self, collection: &str, filters: &[Filter]) -> ArenaResult<usize> {
        self.observe(Operation::Read, collection);
        self.inner.count(collection, filters).await
    }
}

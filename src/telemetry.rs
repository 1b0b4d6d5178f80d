//! Storage access telemetry
//!
//! Individual reads and writes are buffered in memory and folded into one
//! [`AggregateMetric`] per page per flush, so the telemetry itself costs a
//! bounded number of writes. Identical (page, operation, collection) events
//! inside the debounce window are counted once.
//!
//! The aggregator is an explicitly constructed service: callers hold an
//! `Arc` to it and own its background flush task through [`start`] and
//! [`stop`].
//!
//! [`start`]: UsageTelemetryAggregator::start
//! [`stop`]: UsageTelemetryAggregator::stop

use crate::clock::SharedClock;
use crate::config::TelemetryConfig;
use crate::errors::{ArenaError, ArenaResult};
use crate::lifecycle::TaskHandle;
use crate::store::DocumentStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Page reported when no page context has been set
pub const UNKNOWN_PAGE: &str = "unknown";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Write,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read => write!(f, "read"),
            Operation::Write => write!(f, "write"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessEvent {
    pub page: String,
    pub operation: Operation,
    pub collection: String,
    pub actor: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionUsage {
    pub reads: u64,
    pub writes: u64,
}

/// One persisted record per page per flush
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateMetric {
    pub page: String,
    pub reads: u64,
    pub writes: u64,
    pub collections: BTreeMap<String, CollectionUsage>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub distinct_actors: usize,
    pub event_count: usize,
}

impl AggregateMetric {
    /// Fold events of a single page; `None` for an empty batch
    pub fn from_events(page: &str, events: &[AccessEvent]) -> Option<Self> {
        let first = events.first()?;
        let mut metric = Self {
            page: page.to_string(),
            reads: 0,
            writes: 0,
            collections: BTreeMap::new(),
            window_start: first.at,
            window_end: first.at,
            distinct_actors: 0,
            event_count: events.len(),
        };

        let mut actors = HashSet::new();
        for event in events {
            let usage = metric.collections.entry(event.collection.clone()).or_default();
            match event.operation {
                Operation::Read => {
                    metric.reads += 1;
                    usage.reads += 1;
                }
                Operation::Write => {
                    metric.writes += 1;
                    usage.writes += 1;
                }
            }
            metric.window_start = metric.window_start.min(event.at);
            metric.window_end = metric.window_end.max(event.at);
            if let Some(actor) = &event.actor {
                actors.insert(actor.as_str());
            }
        }
        metric.distinct_actors = actors.len();
        Some(metric)
    }
}

/// Group a batch by page, one metric per page
pub fn aggregate(events: &[AccessEvent]) -> Vec<AggregateMetric> {
    group_by_page(events.to_vec())
        .iter()
        .filter_map(|(page, events)| AggregateMetric::from_events(page, events))
        .collect()
}

fn group_by_page(events: Vec<AccessEvent>) -> BTreeMap<String, Vec<AccessEvent>> {
    let mut pages: BTreeMap<String, Vec<AccessEvent>> = BTreeMap::new();
    for event in events {
        pages.entry(event.page.clone()).or_default().push(event);
    }
    pages
}

#[derive(Debug, Default)]
struct TelemetryState {
    buffer: Vec<AccessEvent>,
    last_seen: HashMap<(String, Operation, String), DateTime<Utc>>,
    current_page: Option<String>,
    actor: Option<String>,
    debounced: u64,
    dropped: u64,
    flushed_metrics: u64,
    /// Threshold flushes are held back until then after a failure
    retry_at: Option<DateTime<Utc>>,
}

impl TelemetryState {
    /// Drop the oldest events beyond `max`
    fn trim(&mut self, max: usize) {
        let excess = self.buffer.len().saturating_sub(max);
        if excess > 0 {
            self.buffer.drain(..excess);
            self.dropped += excess as u64;
        }
    }
}

/// Counters exposed for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetryStats {
    pub pending: usize,
    pub debounced: u64,
    /// Events discarded because the buffer was full
    pub dropped: u64,
    pub flushed_metrics: u64,
    pub retry_at: Option<DateTime<Utc>>,
}

pub struct UsageTelemetryAggregator {
    config: TelemetryConfig,
    clock: SharedClock,
    sink: Arc<dyn DocumentStore>,
    state: Mutex<TelemetryState>,
    flush_signal: Notify,
    task: Mutex<Option<TaskHandle>>,
}

impl UsageTelemetryAggregator {
    /// `sink` receives the aggregates and must not itself be metered
    pub fn new(config: TelemetryConfig, clock: SharedClock, sink: Arc<dyn DocumentStore>) -> Self {
        Self {
            config,
            clock,
            sink,
            state: Mutex::new(TelemetryState::default()),
            flush_signal: Notify::new(),
            task: Mutex::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, TelemetryState> {
        // Telemetry must never take the caller down
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Buffer one access; returns false when it was debounced
    pub fn record(&self, page: &str, operation: Operation, collection: &str) -> bool {
        let now = self.clock.now();
        let debounce = ChronoDuration::milliseconds(self.config.debounce_ms as i64);
        let mut state = self.state();

        let key = (page.to_string(), operation, collection.to_string());
        if let Some(last) = state.last_seen.get(&key) {
            if now - *last < debounce {
                state.debounced += 1;
                return false;
            }
        }
        state.last_seen.insert(key, now);

        let actor = state.actor.clone();
        state.buffer.push(AccessEvent {
            page: page.to_string(),
            operation,
            collection: collection.to_string(),
            actor,
            at: now,
        });

        state.trim(self.config.max_buffered);

        let backing_off = state.retry_at.map_or(false, |at| now < at);
        if state.buffer.len() >= self.config.flush_threshold && !backing_off {
            self.flush_signal.notify_one();
        }
        true
    }

    /// Record against the current page context
    pub fn record_current(&self, operation: Operation, collection: &str) -> bool {
        let page = self
            .state()
            .current_page
            .clone()
            .unwrap_or_else(|| UNKNOWN_PAGE.to_string());
        self.record(&page, operation, collection)
    }

    /// Switch page context, flushing what the previous page buffered
    pub async fn set_current_page(&self, page: &str) -> ArenaResult<()> {
        let changed = {
            let mut state = self.state();
            let changed = state.current_page.as_deref().map_or(false, |current| current != page);
            state.current_page = Some(page.to_string());
            changed
        };
        if changed {
            self.flush().await?;
        }
        Ok(())
    }

    pub fn current_page(&self) -> Option<String> {
        self.state().current_page.clone()
    }

    pub fn set_actor(&self, actor: Option<String>) {
        self.state().actor = actor;
    }

    pub fn pending(&self) -> usize {
        self.state().buffer.len()
    }

    pub fn stats(&self) -> TelemetryStats {
        let state = self.state();
        TelemetryStats {
            pending: state.buffer.len(),
            debounced: state.debounced,
            dropped: state.dropped,
            flushed_metrics: state.flushed_metrics,
            retry_at: state.retry_at,
        }
    }

    /// Persist one aggregate per buffered page.
    ///
    /// Failed pages are re-queued ahead of newer events, the buffer is capped
    /// at `max_buffered`, and threshold flushes back off for `retry_backoff_ms`.
    pub async fn flush(&self) -> ArenaResult<usize> {
        let events = {
            let mut state = self.state();
            let now = self.clock.now();
            let debounce = ChronoDuration::milliseconds(self.config.debounce_ms as i64);
            state.last_seen.retain(|_, seen| now - *seen < debounce);
            std::mem::take(&mut state.buffer)
        };
        if events.is_empty() {
            return Ok(0);
        }

        let mut written = 0;
        let mut failed = Vec::new();
        let mut first_error: Option<ArenaError> = None;

        for (page, page_events) in group_by_page(events) {
            let Some(metric) = AggregateMetric::from_events(&page, &page_events) else {
                continue;
            };
            let record = serde_json::to_value(&metric)?;
            match self.sink.append_record(&self.config.collection, record).await {
                Ok(_) => {
                    debug!(page = %page, reads = metric.reads, writes = metric.writes, "Telemetry aggregate written");
                    written += 1;
                }
                Err(e) => {
                    warn!(page = %page, events = page_events.len(), "Telemetry flush failed, re-queueing: {}", e);
                    failed.extend(page_events);
                    first_error.get_or_insert(e);
                }
            }
        }

        {
            let mut state = self.state();
            state.flushed_metrics += written as u64;
            if failed.is_empty() {
                state.retry_at = None;
            } else {
                failed.append(&mut state.buffer);
                state.buffer = failed;
                state.trim(self.config.max_buffered);
                let backoff = ChronoDuration::milliseconds(self.config.retry_backoff_ms as i64);
                state.retry_at = Some(self.clock.now() + backoff);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!(metrics = written, "Telemetry flushed");
                Ok(written)
            }
        }
    }

    /// Start the periodic flush task; a no-op when already running
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if task.is_some() {
            return;
        }

        let this = Arc::clone(self);
        let period = Duration::from_millis(self.config.flush_interval_ms.max(1));
        *task = Some(TaskHandle::spawn("telemetry-flush", move |mut shutdown| async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = interval.tick() => {
                        let _ = this.flush().await;
                    }
                    _ = this.flush_signal.notified() => {
                        let _ = this.flush().await;
                    }
                }
            }
            if let Err(e) = this.flush().await {
                warn!("Final telemetry flush failed: {}", e);
            }
        }));
    }

    /// Stop the flush task after a final flush
    pub async fn stop(&self) {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|task| task.as_ref().map_or(false, |t| !t.is_finished()))
            .unwrap_or(false)
    }
}

//! Cached opponent eligibility
//!
//! Pages of eligible opponents and their total count are cached separately:
//! pages with the short TTL, counts and display names with the long one. The
//! count may therefore lag the page it is shown with until it expires. That
//! lag is accepted; a resolved contest invalidates both players' entries.

use super::ttl::{CacheStats, Scope, TtlCache};
use crate::clock::SharedClock;
use crate::config::CacheConfig;
use crate::errors::{ArenaResult, ValidationError};
use crate::lifecycle::TaskHandle;
use crate::resource::{PlayerProfile, PROFILES_COLLECTION};
use crate::store::{DocumentStore, Filter, FilterOp, Query};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const ATTRIBUTE_FIELDS: [&str; 5] = [
    "attributes.strength",
    "attributes.agility",
    "attributes.dexterity",
    "attributes.endurance",
    "attributes.intelligence",
];

/// One page of eligible opponents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpponentPage {
    pub items: Vec<PlayerProfile>,
    pub total_count: usize,
    /// 1-based
    pub page: usize,
    pub total_pages: usize,
}

pub struct OpponentMatchCache {
    store: Arc<dyn DocumentStore>,
    config: CacheConfig,
    pages: TtlCache<Vec<PlayerProfile>>,
    counts: TtlCache<usize>,
    names: TtlCache<String>,
}

impl OpponentMatchCache {
    pub fn new(store: Arc<dyn DocumentStore>, config: CacheConfig, clock: SharedClock) -> Self {
        Self {
            store,
            config,
            pages: TtlCache::new(clock.clone()),
            counts: TtlCache::new(clock.clone()),
            names: TtlCache::new(clock),
        }
    }

    /// Level band and attribute floor a player is matched against
    fn eligibility(&self, profile: &PlayerProfile) -> (Vec<Filter>, String) {
        let window = self.config.level_window;
        let low = profile.level.saturating_sub(window).max(1);
        let high = profile.level.saturating_add(window);

        let mut filters = vec![
            Filter::new("level", FilterOp::Gte, low),
            Filter::new("level", FilterOp::Lte, high),
            Filter::new("player_id", FilterOp::Ne, profile.player_id.clone()),
        ];
        for field in ATTRIBUTE_FIELDS {
            filters.push(Filter::new(field, FilterOp::Gte, self.config.min_attribute));
        }

        let shape = format!("level:{}-{}:min:{}", low, high, self.config.min_attribute);
        (filters, shape)
    }

    async fn profile(&self, player_id: &str) -> ArenaResult<PlayerProfile> {
        match self.store.get_record(PROFILES_COLLECTION, player_id).await? {
            Some(record) => Ok(serde_json::from_value(record)?),
            None => Err(ValidationError::PlayerNotFound(player_id.to_string()).into()),
        }
    }

    /// Opponents within the level window of `player_id`, highest level first
    pub async fn eligible_opponents(&self, player_id: &str, page: usize) -> ArenaResult<OpponentPage> {
        let page = page.max(1);
        let page_size = self.config.page_size.max(1);
        let profile = self.profile(player_id).await?;
        let (filters, shape) = self.eligibility(&profile);
        let scopes = [Scope::Player(player_id.to_string()), Scope::QueryShape(shape.clone())];

        let page_key = format!("opponents:{}:{}:page:{}", player_id, shape, page);
        let items = match self.pages.get(&page_key) {
            Some(items) => items,
            None => {
                let query = Query {
                    filters: filters.clone(),
                    ..Query::default()
                }
                .order_by("level", true)
                .order_by("player_id", false)
                .offset((page - 1) * page_size)
                .limit(page_size);

                let items = self
                    .store
                    .query(PROFILES_COLLECTION, &query)
                    .await?
                    .into_iter()
                    .map(serde_json::from_value::<PlayerProfile>)
                    .collect::<Result<Vec<_>, _>>()?;
                self.pages
                    .set_scoped(page_key, items.clone(), self.config.page_ttl_ms, &scopes);
                items
            }
        };

        let count_key = format!("opponents:{}:{}:count", player_id, shape);
        let total_count = match self.counts.get(&count_key) {
            Some(count) => count,
            None => {
                let count = self.store.count(PROFILES_COLLECTION, &filters).await?;
                self.counts
                    .set_scoped(count_key, count, self.config.count_ttl_ms, &scopes);
                count
            }
        };

        Ok(OpponentPage {
            items,
            total_count,
            page,
            total_pages: total_count.div_ceil(page_size),
        })
    }

    pub async fn display_name(&self, player_id: &str) -> ArenaResult<String> {
        let key = format!("name:{}", player_id);
        if let Some(name) = self.names.get(&key) {
            return Ok(name);
        }
        let name = self.profile(player_id).await?.display_name;
        self.names.set_scoped(
            key,
            name.clone(),
            self.config.name_ttl_ms,
            &[Scope::Player(player_id.to_string())],
        );
        Ok(name)
    }

    /// Drop everything cached for one player
    pub fn invalidate_player(&self, player_id: &str) -> usize {
        let scope = Scope::Player(player_id.to_string());
        let removed = self.pages.invalidate_scope(&scope)
            + self.counts.invalidate_scope(&scope)
            + self.names.invalidate_scope(&scope);
        debug!(player_id = %player_id, removed, "Invalidated player cache entries");
        removed
    }

    /// Drop every cached result produced by one query shape
    pub fn invalidate_shape(&self, shape: &str) -> usize {
        let scope = Scope::QueryShape(shape.to_string());
        self.pages.invalidate_scope(&scope) + self.counts.invalidate_scope(&scope)
    }

    pub fn invalidate_by_prefix(&self, prefix: &str) -> usize {
        self.pages.invalidate_by_prefix(prefix)
            + self.counts.invalidate_by_prefix(prefix)
            + self.names.invalidate_by_prefix(prefix)
    }

    pub fn cleanup_expired(&self) -> usize {
        self.pages.cleanup_expired() + self.counts.cleanup_expired() + self.names.cleanup_expired()
    }

    pub fn stats(&self) -> CacheStats {
        self.pages
            .stats()
            .merge(self.counts.stats())
            .merge(self.names.stats())
    }

    /// Periodically drop expired entries until the handle is stopped
    pub fn start_cleanup(self: &Arc<Self>) -> TaskHandle {
        let cache = Arc::clone(self);
        let period = Duration::from_millis(self.config.cleanup_interval_ms.max(1));
        TaskHandle::spawn("cache-cleanup", move |mut shutdown| async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = interval.tick() => {
                        let removed = cache.cleanup_expired();
                        if removed > 0 {
                            info!(removed, "Cache cleanup removed expired entries");
                        }
                    }
                }
            }
        })
    }
}

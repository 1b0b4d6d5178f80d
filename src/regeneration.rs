//! Lazy, wall-clock based vitality regeneration
//!
//! Nothing runs in the background: the ledger reconciles a record whenever it
//! reads one. The checkpoint only ever moves forward by whole consumed hours,
//! so a partially elapsed hour carries over to the next reconciliation.

use crate::config::RegenerationConfig;
use crate::resource::PlayerResource;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// What a reconciliation credited
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recovery {
    pub recovered: bool,
    pub amount: u32,
}

#[derive(Debug, Clone)]
pub struct RegenerationScheduler {
    recovery_per_hour: u32,
}

impl RegenerationScheduler {
    pub fn new(config: &RegenerationConfig) -> Self {
        Self {
            recovery_per_hour: config.recovery_per_hour,
        }
    }

    pub fn recovery_per_hour(&self) -> u32 {
        self.recovery_per_hour
    }

    /// Credit whole elapsed hours since the checkpoint
    pub fn reconcile(&self, resource: &PlayerResource, now: DateTime<Utc>) -> (PlayerResource, Recovery) {
        let mut next = resource.clone();
        let recovery = self.reconcile_in_place(&mut next, now);
        (next, recovery)
    }

    pub fn reconcile_in_place(&self, resource: &mut PlayerResource, now: DateTime<Utc>) -> Recovery {
        if resource.vitality.is_full() {
            resource.last_vitality_checkpoint = None;
            return Recovery::default();
        }

        let checkpoint = match resource.last_vitality_checkpoint {
            Some(checkpoint) => checkpoint,
            None => {
                resource.last_vitality_checkpoint = Some(now);
                return Recovery::default();
            }
        };

        // A checkpoint in the future (clock skew) credits nothing
        let hours = (now - checkpoint).num_hours();
        if hours <= 0 {
            return Recovery::default();
        }

        let credit = (hours as u64)
            .saturating_mul(self.recovery_per_hour as u64)
            .min(u32::MAX as u64) as u32;
        let amount = resource.vitality.restore(credit);

        resource.last_vitality_checkpoint = if resource.vitality.is_full() {
            None
        } else {
            Some(checkpoint + Duration::hours(hours))
        };

        Recovery {
            recovered: amount > 0,
            amount,
        }
    }

    /// Time until the next hourly credit; `None` when nothing is pending
    pub fn next_recovery_in(&self, resource: &PlayerResource, now: DateTime<Utc>) -> Option<Duration> {
        if resource.vitality.is_full() || self.recovery_per_hour == 0 {
            return None;
        }
        let checkpoint = resource.last_vitality_checkpoint?;
        let elapsed = now - checkpoint;
        if elapsed < Duration::zero() {
            return Some(Duration::hours(1) - elapsed);
        }
        let into_hour = Duration::milliseconds(elapsed.num_milliseconds() % 3_600_000);
        Some(Duration::hours(1) - into_hour)
    }
}

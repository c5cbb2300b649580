// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Restriction Tracker
//!
//! Gate consulted before every candidate response, and the write-back path
//! for restrictions discovered while sending.
//!
//! New records land in the local cache first so the very next event sees
//! them, then go to the store. A failed store write is logged; the next
//! refresh simply won't carry the record, and the transport will report the
//! restriction again on the next attempt.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::config_cache::ConfigCache;
use crate::domain::repository::RestrictionRepository;
use crate::domain::restriction::{Restriction, RestrictionGate, RestrictionKey};

pub struct RestrictionTracker {
    repository: Arc<dyn RestrictionRepository>,
    cache: Arc<ConfigCache>,
}

impl RestrictionTracker {
    pub fn new(repository: Arc<dyn RestrictionRepository>, cache: Arc<ConfigCache>) -> Self {
        Self { repository, cache }
    }

    /// Whether `key` may attempt a response at `now`.
    pub fn check(&self, key: &RestrictionKey, now: DateTime<Utc>) -> RestrictionGate {
        let gate = self.cache.restriction_gate(key, now);
        if gate == RestrictionGate::Expired {
            debug!(agent_id = %key.agent_id, topic_id = %key.topic_id, "Restriction expired, resuming");
        }
        gate
    }

    /// Record a newly discovered restriction locally and in the store.
    pub async fn record(&self, restriction: Restriction) {
        self.cache.merge_restriction(restriction.clone());

        if let Err(e) = self.repository.upsert(&restriction).await {
            warn!(
                agent_id = %restriction.agent_id,
                topic_id = %restriction.topic_id,
                error = %e,
                "Failed to persist restriction; kept in local view only"
            );
        }
    }
}

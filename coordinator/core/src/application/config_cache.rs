// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Config Cache
//!
//! Process-wide, read-mostly view of "which topics are active and what may be
//! said in them", plus the restrictions currently in effect.
//!
//! ## Lifecycle
//!
//! 1. Created empty at startup ([`ConfigCache::new`]).
//! 2. Populated by the first refresh before any agent listens.
//! 3. Replaced wholesale on every later refresh ([`ConfigCache::publish`]).
//! 4. Dropped with the coordinator.
//!
//! A published [`ConfigSnapshot`] is never mutated. Readers clone the current
//! `Arc` under a short read lock and keep a complete, consistent view for as
//! long as they hold it. Restriction merges and lazy expiry drops build a new
//! snapshot that shares the catalog map with the old one and swap it in.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::restriction::{Restriction, RestrictionGate, RestrictionKey, RestrictionMap};
use crate::domain::topic::{ResponseCatalog, Topic, TopicId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicCatalog {
    pub topic: Topic,
    pub responses: ResponseCatalog,
}

/// Immutable, internally consistent view published by the refresh loop.
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    catalogs: Arc<HashMap<TopicId, TopicCatalog>>,
    restrictions: RestrictionMap,
    generation: u64,
    refreshed_at: Option<DateTime<Utc>>,
}

impl ConfigSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Records already expired at `refreshed_at` are left out.
    pub fn build(
        catalogs: Vec<(Topic, ResponseCatalog)>,
        restrictions: Vec<Restriction>,
        refreshed_at: DateTime<Utc>,
    ) -> Self {
        let catalogs = catalogs
            .into_iter()
            .map(|(topic, responses)| (topic.id, TopicCatalog { topic, responses }))
            .collect();
        let restrictions: RestrictionMap = restrictions.into_iter().collect();
        Self {
            catalogs: Arc::new(catalogs),
            restrictions: restrictions.without_expired(refreshed_at),
            generation: 0,
            refreshed_at: Some(refreshed_at),
        }
    }

    /// Responses for `topic`, `None` when the topic is absent or inactive.
    pub fn responses(&self, topic: TopicId) -> Option<&ResponseCatalog> {
        self.catalogs.get(&topic).map(|entry| &entry.responses)
    }

    pub fn catalogs(&self) -> &HashMap<TopicId, TopicCatalog> {
        &self.catalogs
    }

    pub fn topic_ids(&self) -> Vec<TopicId> {
        let mut ids: Vec<TopicId> = self.catalogs.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn restrictions(&self) -> &RestrictionMap {
        &self.restrictions
    }

    /// Number of refreshes published before this snapshot, 0 when never refreshed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    fn with_restrictions(&self, restrictions: RestrictionMap) -> Self {
        Self {
            catalogs: self.catalogs.clone(),
            restrictions,
            generation: self.generation,
            refreshed_at: self.refreshed_at,
        }
    }
}

pub struct ConfigCache {
    current: RwLock<Arc<ConfigSnapshot>>,
    labels: DashMap<TopicId, String>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(ConfigSnapshot::empty())),
            labels: DashMap::new(),
        }
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<ConfigSnapshot> {
        self.current.read().clone()
    }

    /// Replace the current snapshot; returns the new generation.
    pub fn publish(&self, mut snapshot: ConfigSnapshot) -> u64 {
        let mut current = self.current.write();
        snapshot.generation = current.generation + 1;
        let generation = snapshot.generation;
        *current = Arc::new(snapshot);
        generation
    }

    pub fn responses(&self, topic: TopicId) -> Option<ResponseCatalog> {
        self.load().responses(topic).cloned()
    }

    /// Consult the restriction view. An expired record is dropped from the
    /// local view and reported as [`RestrictionGate::Expired`].
    pub fn restriction_gate(&self, key: &RestrictionKey, now: DateTime<Utc>) -> RestrictionGate {
        let gate = self.load().restrictions.gate(key, now);
        if gate == RestrictionGate::Expired {
            let mut current = self.current.write();
            // re-check under the write lock; a refresh may have replaced it
            if current.restrictions.gate(key, now) == RestrictionGate::Expired {
                let mut restrictions = current.restrictions.clone();
                restrictions.remove(key);
                *current = Arc::new(current.with_restrictions(restrictions));
                debug!(agent_id = %key.agent_id, topic_id = %key.topic_id, "Dropped expired restriction from cache");
            }
        }
        gate
    }

    /// Optimistically add a restriction discovered during handling.
    pub fn merge_restriction(&self, restriction: Restriction) {
        let mut current = self.current.write();
        let mut restrictions = current.restrictions.clone();
        restrictions.insert(restriction);
        *current = Arc::new(current.with_restrictions(restrictions));
    }

    pub fn label(&self, topic: TopicId) -> Option<String> {
        self.labels.get(&topic).map(|label| label.value().clone())
    }

    pub fn remember_label(&self, topic: TopicId, label: String) {
        self.labels.insert(topic, label);
    }
}

impl Default for ConfigCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::{AgentId, CredentialFingerprint};
    use chrono::Duration;

    fn topic(id: i64) -> Topic {
        Topic {
            id: TopicId(id),
            display_name: Some(format!("topic-{id}")),
            active: true,
        }
    }

    fn catalog(texts: &[&str]) -> ResponseCatalog {
        ResponseCatalog::new(texts.iter().map(|t| t.to_string()).collect()).unwrap()
    }

    fn restriction(expires_at: DateTime<Utc>) -> Restriction {
        Restriction {
            agent_id: AgentId(1),
            topic_id: TopicId(10),
            credential_fingerprint: CredentialFingerprint("ab".to_string()),
            expires_at,
        }
    }

    #[test]
    fn test_starts_empty() {
        let cache = ConfigCache::new();
        assert_eq!(cache.load().generation(), 0);
        assert!(cache.responses(TopicId(10)).is_none());
    }

    #[test]
    fn test_publish_replaces_whole_snapshot() {
        let cache = ConfigCache::new();
        let now = Utc::now();
        let generation = cache.publish(ConfigSnapshot::build(
            vec![(topic(10), catalog(&["A", "B"]))],
            vec![],
            now,
        ));
        assert_eq!(generation, 1);
        assert_eq!(cache.responses(TopicId(10)).map(|c| c.len()), Some(2));

        let held = cache.load();
        cache.publish(ConfigSnapshot::build(
            vec![(topic(11), catalog(&["C"]))],
            vec![],
            now,
        ));

        // earlier readers keep their complete view
        assert!(held.responses(TopicId(10)).is_some());
        assert!(cache.responses(TopicId(10)).is_none());
        assert_eq!(cache.load().generation(), 2);
    }

    #[test]
    fn test_merge_is_visible_and_keeps_catalogs() {
        let cache = ConfigCache::new();
        let now = Utc::now();
        cache.publish(ConfigSnapshot::build(vec![(topic(10), catalog(&["A"]))], vec![], now));

        let key = RestrictionKey::new(AgentId(1), TopicId(10));
        cache.merge_restriction(restriction(now + Duration::minutes(10)));

        assert!(matches!(
            cache.restriction_gate(&key, now),
            RestrictionGate::Blocked { .. }
        ));
        assert!(cache.responses(TopicId(10)).is_some());
        assert_eq!(cache.load().generation(), 1);
    }

    #[test]
    fn test_expired_restriction_is_dropped_lazily() {
        let cache = ConfigCache::new();
        let now = Utc::now();
        cache.publish(ConfigSnapshot::build(
            vec![],
            vec![restriction(now + Duration::minutes(1))],
            now,
        ));

        let key = RestrictionKey::new(AgentId(1), TopicId(10));
        let later = now + Duration::minutes(2);
        assert_eq!(cache.restriction_gate(&key, later), RestrictionGate::Expired);
        assert!(cache.load().restrictions().is_empty());
        assert_eq!(cache.restriction_gate(&key, later), RestrictionGate::Clear);
    }

    #[test]
    fn test_build_leaves_out_expired_records() {
        let now = Utc::now();
        let mut stale = restriction(now - Duration::seconds(1));
        stale.topic_id = TopicId(11);
        let snapshot = ConfigSnapshot::build(
            vec![],
            vec![restriction(now + Duration::minutes(5)), stale],
            now,
        );

        assert_eq!(snapshot.restrictions().len(), 1);
        assert!(snapshot
            .restrictions()
            .get(&RestrictionKey::new(AgentId(1), TopicId(10)))
            .is_some());
    }

    #[test]
    fn test_labels() {
        let cache = ConfigCache::new();
        assert_eq!(cache.label(TopicId(5)), None);
        cache.remember_label(TopicId(5), "News".to_string());
        assert_eq!(cache.label(TopicId(5)).as_deref(), Some("News"));
    }
}

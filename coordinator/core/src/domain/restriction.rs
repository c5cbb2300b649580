// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Restrictions
//!
//! A [`Restriction`] is a known, time-bounded block on one agent responding in
//! one topic. [`RestrictionMap`] holds at most one record per
//! [`RestrictionKey`]; inserting a newer record for the same pair replaces the
//! old one.
//!
//! ## Gate Table
//! | Record | `expires_at` vs now | [`RestrictionGate`] |
//! |--------|---------------------|---------------------|
//! | none | – | `Clear` |
//! | present | in the future | `Blocked { until }` |
//! | present | now or past | `Expired` (caller drops it and proceeds) |

use crate::domain::agent::{AgentId, CredentialFingerprint};
use crate::domain::topic::TopicId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RestrictionKey {
    pub agent_id: AgentId,
    pub topic_id: TopicId,
}

impl RestrictionKey {
    pub fn new(agent_id: AgentId, topic_id: TopicId) -> Self {
        Self { agent_id, topic_id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restriction {
    pub agent_id: AgentId,
    pub topic_id: TopicId,
    pub credential_fingerprint: CredentialFingerprint,
    pub expires_at: DateTime<Utc>,
}

impl Restriction {
    pub fn key(&self) -> RestrictionKey {
        RestrictionKey::new(self.agent_id, self.topic_id)
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Result of consulting the restriction view before a response attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictionGate {
    Clear,
    Blocked { until: DateTime<Utc> },
    Expired,
}

impl RestrictionGate {
    pub fn allows_attempt(&self) -> bool {
        !matches!(self, RestrictionGate::Blocked { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestrictionMap {
    entries: HashMap<RestrictionKey, Restriction>,
}

impl RestrictionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or supersede; returns the record that was replaced.
    pub fn insert(&mut self, restriction: Restriction) -> Option<Restriction> {
        self.entries.insert(restriction.key(), restriction)
    }

    pub fn remove(&mut self, key: &RestrictionKey) -> Option<Restriction> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &RestrictionKey) -> Option<&Restriction> {
        self.entries.get(key)
    }

    pub fn gate(&self, key: &RestrictionKey, now: DateTime<Utc>) -> RestrictionGate {
        match self.entries.get(key) {
            None => RestrictionGate::Clear,
            Some(restriction) if restriction.is_live(now) => RestrictionGate::Blocked {
                until: restriction.expires_at,
            },
            Some(_) => RestrictionGate::Expired,
        }
    }

    /// Copy of the map without records that have expired at `now`.
    pub fn without_expired(&self, now: DateTime<Utc>) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(_, restriction)| restriction.is_live(now))
                .map(|(key, restriction)| (*key, restriction.clone()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Restriction> {
        self.entries.values()
    }
}

impl FromIterator<Restriction> for RestrictionMap {
    fn from_iter<I: IntoIterator<Item = Restriction>>(iter: I) -> Self {
        let mut map = Self::new();
        for restriction in iter {
            map.insert(restriction);
        }
        map
    }
}

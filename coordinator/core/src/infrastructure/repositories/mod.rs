// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository abstractions defined in
//! the domain layer.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve domain aggregates
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL Repositories
//!
//! - **PostgresAgentRepository** - Active agent roster
//! - **PostgresTopicRepository** - Active topics joined with their responses
//! - **PostgresRestrictionRepository** - Restriction records
//!
//! ## In-Memory Repositories
//!
//! Lightweight implementations for tests and local runs. The seeding methods
//! (`register`, `add_topic`, `add_response`, ...) stand in for the operator
//! front-end.

pub mod postgres_agent;
pub mod postgres_restriction;
pub mod postgres_topic;

pub use postgres_agent::PostgresAgentRepository;
pub use postgres_restriction::PostgresRestrictionRepository;
pub use postgres_topic::PostgresTopicRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use crate::domain::agent::{Agent, AgentId};
use crate::domain::repository::{
    AgentRepository, RepositoryError, RestrictionRepository, TopicRepository,
};
use crate::domain::restriction::{Restriction, RestrictionKey};
use crate::domain::topic::{ResponseCatalog, Topic, TopicId};

#[derive(Clone, Default)]
pub struct InMemoryAgentRepository {
    agents: Arc<RwLock<BTreeMap<AgentId, Agent>>>,
}

impl InMemoryAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, agent: Agent) {
        self.agents.write().insert(agent.id, agent);
    }

    pub fn set_active(&self, id: AgentId, active: bool) {
        if let Some(agent) = self.agents.write().get_mut(&id) {
            agent.active = active;
        }
    }
}

#[async_trait]
impl AgentRepository for InMemoryAgentRepository {
    async fn list_active(&self) -> Result<Vec<Agent>, RepositoryError> {
        let agents = self.agents.read();
        Ok(agents.values().filter(|a| a.active).cloned().collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryTopicRepository {
    topics: Arc<RwLock<BTreeMap<TopicId, Topic>>>,
    responses: Arc<RwLock<HashMap<TopicId, Vec<String>>>>,
}

impl InMemoryTopicRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_topic(&self, topic: Topic) {
        self.topics.write().insert(topic.id, topic);
    }

    pub fn add_response(&self, topic_id: TopicId, text: impl Into<String>) {
        self.responses
            .write()
            .entry(topic_id)
            .or_default()
            .push(text.into());
    }

    pub fn set_active(&self, id: TopicId, active: bool) {
        if let Some(topic) = self.topics.write().get_mut(&id) {
            topic.active = active;
        }
    }
}

#[async_trait]
impl TopicRepository for InMemoryTopicRepository {
    async fn fetch_active_catalogs(&self) -> Result<Vec<(Topic, ResponseCatalog)>, RepositoryError> {
        let topics = self.topics.read();
        let responses = self.responses.read();
        Ok(topics
            .values()
            .filter(|topic| topic.active)
            .filter_map(|topic| {
                let texts = responses.get(&topic.id).cloned().unwrap_or_default();
                ResponseCatalog::new(texts).map(|catalog| (topic.clone(), catalog))
            })
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryRestrictionRepository {
    restrictions: Arc<RwLock<HashMap<RestrictionKey, Restriction>>>,
}

impl InMemoryRestrictionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored records, live or not.
    pub fn all(&self) -> Vec<Restriction> {
        self.restrictions.read().values().cloned().collect()
    }
}

#[async_trait]
impl RestrictionRepository for InMemoryRestrictionRepository {
    async fn fetch_live(&self, now: DateTime<Utc>) -> Result<Vec<Restriction>, RepositoryError> {
        let restrictions = self.restrictions.read();
        Ok(restrictions
            .values()
            .filter(|r| r.is_live(now))
            .cloned()
            .collect())
    }

    async fn upsert(&self, restriction: &Restriction) -> Result<(), RepositoryError> {
        self.restrictions
            .write()
            .insert(restriction.key(), restriction.clone());
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut restrictions = self.restrictions.write();
        let before = restrictions.len();
        restrictions.retain(|_, r| r.is_live(now));
        Ok((before - restrictions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::{Credential, CredentialFingerprint};
    use chrono::Duration;

    #[tokio::test]
    async fn test_agents_listed_in_id_order_and_filtered() {
        let repo = InMemoryAgentRepository::new();
        repo.register(Agent::new(AgentId(3), Credential::new("c")));
        repo.register(Agent::new(AgentId(1), Credential::new("a")));
        repo.register(Agent::new(AgentId(2), Credential::new("b")));
        repo.set_active(AgentId(2), false);

        let ids: Vec<AgentId> = repo
            .list_active()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![AgentId(1), AgentId(3)]);
    }

    #[tokio::test]
    async fn test_topics_without_responses_are_skipped() {
        let repo = InMemoryTopicRepository::new();
        for id in [10, 11, 12] {
            repo.add_topic(Topic {
                id: TopicId(id),
                display_name: None,
                active: true,
            });
        }
        repo.add_response(TopicId(10), "hello");
        repo.add_response(TopicId(12), "hi");
        repo.set_active(TopicId(12), false);

        let catalogs = repo.fetch_active_catalogs().await.unwrap();
        assert_eq!(catalogs.len(), 1);
        assert_eq!(catalogs[0].0.id, TopicId(10));
    }

    #[tokio::test]
    async fn test_restriction_upsert_and_purge() {
        let repo = InMemoryRestrictionRepository::new();
        let now = Utc::now();
        let mut restriction = Restriction {
            agent_id: AgentId(1),
            topic_id: TopicId(10),
            credential_fingerprint: CredentialFingerprint("ff".to_string()),
            expires_at: now - Duration::minutes(1),
        };
        repo.upsert(&restriction).await.unwrap();
        assert!(repo.fetch_live(now).await.unwrap().is_empty());

        restriction.expires_at = now + Duration::minutes(5);
        repo.upsert(&restriction).await.unwrap();
        assert_eq!(repo.fetch_live(now).await.unwrap().len(), 1);
        assert_eq!(repo.all().len(), 1);

        assert_eq!(repo.purge_expired(now + Duration::minutes(6)).await.unwrap(), 1);
        assert!(repo.all().is_empty());
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts, one per aggregate, defined in the domain layer and
//! implemented in `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `AgentRepository` | `Agent` | `InMemoryAgentRepository`, `PostgresAgentRepository` |
//! | `TopicRepository` | `Topic` + `ResponseCatalog` | `InMemoryTopicRepository`, `PostgresTopicRepository` |
//! | `RestrictionRepository` | `Restriction` | `InMemoryRestrictionRepository`, `PostgresRestrictionRepository` |
//!
//! Registration and toggling of agents, topics and responses belong to the
//! operator front-end; the core only reads them. Restrictions are the one
//! aggregate the core writes.

use crate::domain::agent::Agent;
use crate::domain::restriction::Restriction;
use crate::domain::topic::{ResponseCatalog, Topic};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Repository interface for Agent aggregates
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Active agents ordered by id. Every process deriving roster indices from
    /// this list must see the same order.
    async fn list_active(&self) -> Result<Vec<Agent>, RepositoryError>;
}

/// Repository interface for Topic aggregates and their response catalogs
#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// Active topics that have at least one response.
    async fn fetch_active_catalogs(&self) -> Result<Vec<(Topic, ResponseCatalog)>, RepositoryError>;
}

/// Repository interface for Restriction aggregates
#[async_trait]
pub trait RestrictionRepository: Send + Sync {
    /// Restrictions whose expiry is after `now`.
    async fn fetch_live(&self, now: DateTime<Utc>) -> Result<Vec<Restriction>, RepositoryError>;

    /// Insert, or replace the expiry of the record for the same (agent, topic).
    async fn upsert(&self, restriction: &Restriction) -> Result<(), RepositoryError>;

    /// Delete records that expired at or before `now`; returns how many.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

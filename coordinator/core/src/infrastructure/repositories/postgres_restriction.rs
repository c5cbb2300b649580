// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Restriction Repository
//!
//! Persists restrictions discovered during response handling. The
//! `(agent_id, topic_id)` unique constraint keeps at most one record per pair;
//! `upsert` refreshes the expiry of an existing record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use crate::domain::agent::{AgentId, CredentialFingerprint};
use crate::domain::repository::{RepositoryError, RestrictionRepository};
use crate::domain::restriction::Restriction;
use crate::domain::topic::TopicId;

pub struct PostgresRestrictionRepository {
    pool: PgPool,
}

impl PostgresRestrictionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RestrictionRepository for PostgresRestrictionRepository {
    async fn fetch_live(&self, now: DateTime<Utc>) -> Result<Vec<Restriction>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT agent_id, topic_id, credential_fingerprint, expires_at
            FROM restrictions
            WHERE expires_at > $1
            "#
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to fetch restrictions: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| Restriction {
                agent_id: AgentId(row.get("agent_id")),
                topic_id: TopicId(row.get("topic_id")),
                credential_fingerprint: CredentialFingerprint(row.get("credential_fingerprint")),
                expires_at: row.get("expires_at"),
            })
            .collect())
    }

    async fn upsert(&self, restriction: &Restriction) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO restrictions (agent_id, topic_id, credential_fingerprint, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (agent_id, topic_id) DO UPDATE SET
                credential_fingerprint = EXCLUDED.credential_fingerprint,
                expires_at = EXCLUDED.expires_at
            "#
        )
        .bind(restriction.agent_id.0)
        .bind(restriction.topic_id.0)
        .bind(&restriction.credential_fingerprint.0)
        .bind(restriction.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save restriction: {}", e)))?;

        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM restrictions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Agent Repository
//!
//! Production `AgentRepository` implementation backed by the `agents` table.
//! Rows are registered by the operator front-end; this repository only reads.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use crate::domain::agent::{Agent, AgentId, Credential};
use crate::domain::repository::{AgentRepository, RepositoryError};

pub struct PostgresAgentRepository {
    pool: PgPool,
}

impl PostgresAgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentRepository for PostgresAgentRepository {
    async fn list_active(&self) -> Result<Vec<Agent>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, credential, name, is_active
            FROM agents
            WHERE is_active = TRUE
            ORDER BY id ASC
            "#
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to list agents: {}", e)))?;

        let mut agents = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id");
            let credential: String = row.get("credential");
            let name: Option<String> = row.get("name");
            let active: bool = row.get("is_active");

            agents.push(Agent {
                id: AgentId(id),
                credential: Credential::new(credential),
                display_name: name.filter(|n| !n.trim().is_empty()),
                active,
            });
        }
        Ok(agents)
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Connection Pool
//!
//! Wraps `sqlx::postgres::PgPool` in a thin `Database` newtype that is
//! injected into all PostgreSQL repository implementations.
//!
//! `ensure_schema` creates the tables shared with the operator front-end when
//! they are missing. The front-end owns `agents`, `topics` and `responses`;
//! the coordinator only writes `restrictions`.

use anyhow::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS agents (
        id BIGSERIAL PRIMARY KEY,
        credential TEXT UNIQUE NOT NULL,
        name TEXT,
        phone TEXT,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        added_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS topics (
        id SERIAL PRIMARY KEY,
        topic_id BIGINT UNIQUE NOT NULL,
        name TEXT,
        is_active BOOLEAN NOT NULL DEFAULT TRUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS responses (
        id SERIAL PRIMARY KEY,
        topic_id BIGINT NOT NULL REFERENCES topics(topic_id) ON DELETE CASCADE,
        text TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS restrictions (
        id SERIAL PRIMARY KEY,
        agent_id BIGINT NOT NULL,
        topic_id BIGINT NOT NULL,
        credential_fingerprint TEXT NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        UNIQUE (agent_id, topic_id)
    )
    "#,
];

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create missing tables. Idempotent.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Database schema verified");
        Ok(())
    }
}

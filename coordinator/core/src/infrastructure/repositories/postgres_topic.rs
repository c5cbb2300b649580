// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Topic Repository
//!
//! Reads active topics and their response catalogs from the `topics` and
//! `responses` tables in a single join. Topics whose catalog ends up empty are
//! dropped here so they never reach the cache.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use crate::domain::repository::{RepositoryError, TopicRepository};
use crate::domain::topic::{ResponseCatalog, Topic, TopicId};

pub struct PostgresTopicRepository {
    pool: PgPool,
}

impl PostgresTopicRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TopicRepository for PostgresTopicRepository {
    async fn fetch_active_catalogs(&self) -> Result<Vec<(Topic, ResponseCatalog)>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT t.topic_id, t.name, r.text
            FROM topics t
            JOIN responses r ON r.topic_id = t.topic_id
            WHERE t.is_active = TRUE
            ORDER BY t.topic_id ASC, r.id ASC
            "#
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to fetch catalogs: {}", e)))?;

        // rows arrive grouped by topic
        let mut grouped: Vec<(Topic, Vec<String>)> = Vec::new();
        for row in rows {
            let topic_id = TopicId(row.get::<i64, _>("topic_id"));
            let name: Option<String> = row.get("name");
            let text: String = row.get("text");

            match grouped.last_mut() {
                Some((topic, texts)) if topic.id == topic_id => texts.push(text),
                _ => grouped.push((
                    Topic {
                        id: topic_id,
                        display_name: name,
                        active: true,
                    },
                    vec![text],
                )),
            }
        }

        Ok(grouped
            .into_iter()
            .filter_map(|(topic, texts)| ResponseCatalog::new(texts).map(|catalog| (topic, catalog)))
            .collect())
    }
}

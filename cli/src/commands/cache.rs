// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `chorus cache` - run one refresh cycle against the store and print what
//! agents would see. Expired restriction rows are purged as part of the cycle.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use chorus_core::application::{CacheRefresher, ConfigCache};
use chorus_core::domain::clock::SystemClock;
use chorus_core::domain::coordinator_config::CoordinatorConfigManifest;
use chorus_core::infrastructure::repositories::{PostgresRestrictionRepository, PostgresTopicRepository};
use chorus_core::infrastructure::EventBus;

use crate::bootstrap::connect_database;

pub async fn execute(config_override: Option<PathBuf>) -> Result<()> {
    let config = CoordinatorConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let database = connect_database(&config).await?;
    let pool = database.get_pool().clone();

    let cache = Arc::new(ConfigCache::new());
    let refresher = CacheRefresher::new(
        Arc::new(PostgresTopicRepository::new(pool.clone())),
        Arc::new(PostgresRestrictionRepository::new(pool)),
        cache.clone(),
        EventBus::with_default_capacity(),
        Arc::new(SystemClock),
        config.spec.cache.refresh_interval,
    );

    let summary = refresher.refresh_once().await?;
    let snapshot = cache.load();

    println!("{}", "Topics:".bold());
    if snapshot.catalogs().is_empty() {
        println!("  {}", "(none active)".dimmed());
    }
    for topic_id in snapshot.topic_ids() {
        if let Some(entry) = snapshot.catalogs().get(&topic_id) {
            println!(
                "  {:>14}  {:>3} response(s)  {}",
                topic_id.0,
                entry.responses.len(),
                entry.topic.display_name.as_deref().unwrap_or("-")
            );
        }
    }
    println!();

    println!("{}", "Live restrictions:".bold());
    if snapshot.restrictions().is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for restriction in snapshot.restrictions().iter() {
        println!(
            "  agent {:>6}  topic {:>14}  until {}",
            restriction.agent_id.0,
            restriction.topic_id.0,
            restriction.expires_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!();

    println!(
        "{}",
        format!(
            "✓ {} topic(s), {} restriction(s), {} expired row(s) purged",
            summary.topics, summary.restrictions, summary.purged
        )
        .green()
    );
    Ok(())
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `chorus roster` - list active agents in roster order.
//!
//! Indices are the ones every coordinator process derives at start-up, so
//! this is what `chorus schedule` positions map onto.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use chorus_core::domain::coordinator_config::CoordinatorConfigManifest;
use chorus_core::domain::repository::AgentRepository;
use chorus_core::infrastructure::repositories::PostgresAgentRepository;

use crate::bootstrap::connect_database;

pub async fn execute(config_override: Option<PathBuf>) -> Result<()> {
    let config = CoordinatorConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let database = connect_database(&config).await?;
    let repository = PostgresAgentRepository::new(database.get_pool().clone());

    let agents = repository
        .list_active()
        .await
        .context("Failed to list agents")?;

    if agents.is_empty() {
        println!("{}", "No active agents registered.".yellow());
        return Ok(());
    }

    println!("{:>5}  {:>8}  {:<16}  {}", "INDEX", "ID", "FINGERPRINT", "NAME");
    for (index, agent) in agents.iter().enumerate() {
        println!(
            "{:>5}  {:>8}  {:<16}  {}",
            index,
            agent.id.0,
            agent.credential.fingerprint().to_string(),
            agent.display_name.as_deref().unwrap_or("-")
        );
    }
    println!();
    println!("{} active agent(s)", agents.len().to_string().bold());

    Ok(())
}

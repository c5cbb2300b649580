// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Database commands
//!
//! `chorus db init` creates any missing tables. Safe to run repeatedly.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use chorus_core::domain::coordinator_config::CoordinatorConfigManifest;

use crate::bootstrap::connect_database;

#[derive(Subcommand)]
pub enum DbCommand {
    /// Create the schema if it does not exist
    Init,
}

pub async fn handle_command(command: DbCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        DbCommand::Init => init(config_override).await,
    }
}

async fn init(config_override: Option<PathBuf>) -> Result<()> {
    let config = CoordinatorConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;

    println!("Connecting to database...");
    let database = connect_database(&config).await?;
    database
        .ensure_schema()
        .await
        .context("Failed to create schema")?;

    println!("{}", "✓ Database schema is ready.".green());
    Ok(())
}

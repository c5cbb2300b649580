// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Chorus Operator CLI
//!
//! The `chorus` binary inspects and prepares a coordinator deployment. The
//! coordinator itself is started by embedders through
//! [`chorus_cli::bootstrap::run_coordinator`] together with their transport.
//!
//! ## Commands
//!
//! - `chorus config show|validate|generate` - Configuration management
//! - `chorus schedule --event-id N --agents M` - Dispatch order for one event
//! - `chorus db init` - Create the database schema
//! - `chorus roster` - Active agents in roster order
//! - `chorus cache` - One cache refresh against the store

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use chorus_cli::commands::{self, ConfigCommand, DbCommand, ScheduleCommand};
use chorus_core::domain::coordinator_config::{CoordinatorConfigManifest, LoggingConfig};

/// Chorus - coordinated responses from a pool of agents
#[derive(Parser)]
#[command(name = "chorus")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "CHORUS_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "CHORUS_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Show the dispatch order for an event
    #[command(name = "schedule")]
    Schedule {
        #[command(flatten)]
        command: ScheduleCommand,
    },

    /// Database management
    #[command(name = "db")]
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },

    /// List active agents with their roster index
    #[command(name = "roster")]
    Roster,

    /// Refresh the config cache once and print it
    #[command(name = "cache")]
    Cache,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let logging = configured_logging(cli.config.clone());
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.as_ref().map(|l| l.level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let json = logging.as_ref().is_some_and(|l| l.format == "json");
    init_logging(&level, json)?;

    match cli.command {
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Schedule { command }) => commands::schedule::execute(command, cli.config).await,
        Some(Commands::Db { command }) => commands::db::handle_command(command, cli.config).await,
        Some(Commands::Roster) => commands::roster::execute(cli.config).await,
        Some(Commands::Cache) => commands::cache::execute(cli.config).await,
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Logging section of the configuration, if one can be loaded. Errors are
/// reported later by the command that needs the configuration.
fn configured_logging(config_path: Option<PathBuf>) -> Option<LoggingConfig> {
    CoordinatorConfigManifest::load_or_default(config_path)
        .ok()
        .and_then(|config| config.spec.observability)
        .and_then(|observability| observability.logging)
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

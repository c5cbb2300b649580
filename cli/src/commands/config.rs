// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use chorus_core::domain::coordinator_config::{CoordinatorConfigManifest, SAMPLE_CONFIG_YAML};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the resolved manifest as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./chorus-config.yaml)
        #[arg(short, long, default_value = "./chorus-config.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, force } => generate(output, force),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = CoordinatorConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. CHORUS_CONFIG_PATH: {}",
            std::env::var("CHORUS_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./chorus-config.yaml");
        println!("  4. ~/.chorus/config.yaml");
        println!("  5. /etc/chorus/config.yaml");
        println!();
    }

    if as_yaml {
        let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
        println!("{}", yaml);
        return Ok(());
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Node:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Database:".bold());
    println!("  URL: {}", redact_url(&spec.database.url));
    println!("  Max connections: {}", spec.database.max_connections);
    println!();

    println!("{}", "Dispatch:".bold());
    println!("  Base unit: {:?}", spec.dispatch.base_unit);
    println!(
        "  Jitter: {:?} .. {:?}",
        spec.dispatch.jitter_min, spec.dispatch.jitter_max
    );
    println!("  Seen-event capacity: {}", spec.dispatch.seen_event_capacity);
    println!();

    println!("{}", "Cache:".bold());
    println!("  Refresh interval: {:?}", spec.cache.refresh_interval);
    println!();

    println!("{}", "Restrictions:".bold());
    println!(
        "  Permanent after: {} days",
        spec.restrictions.permanent_after.as_secs() / 86_400
    );
    println!("  Rate-limit margin: {:?}", spec.restrictions.rate_limit_margin);
    println!();

    println!("{}", "Notifications:".bold());
    match &spec.notifications {
        Some(n) => {
            println!("  Endpoint: {}", n.endpoint);
            println!("  Chat: {}", n.chat_id);
        }
        None => println!("  {}", "(log only)".dimmed()),
    }

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = CoordinatorConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn generate(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    std::fs::write(&output, SAMPLE_CONFIG_YAML)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

/// Hide the password part of a connection string.
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.split_once('@') {
        Some((userinfo, host)) => {
            let user = userinfo.split(':').next().unwrap_or_default();
            format!("{scheme}://{user}:***@{host}")
        }
        None => url.to_string(),
    }
}

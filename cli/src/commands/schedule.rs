// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `chorus schedule` - show who responds first to an event and when the
//! others follow. Pure computation, no store or transport access.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use chorus_core::domain::coordinator_config::CoordinatorConfigManifest;
use chorus_schedule::DispatchScheduler;

#[derive(Args)]
pub struct ScheduleCommand {
    /// Event identifier used as the seed
    #[arg(long)]
    event_id: i64,

    /// Number of agents in the roster
    #[arg(long)]
    agents: usize,
}

/// One row of the printed plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRow {
    pub position: usize,
    pub roster_index: usize,
    pub min_delay_ms: u128,
    pub max_delay_ms: u128,
}

pub fn plan(scheduler: &DispatchScheduler, event_id: i64, agents: usize) -> Result<Vec<PlanRow>> {
    let order = DispatchScheduler::dispatch_order(event_id, agents)?;
    Ok(order
        .into_iter()
        .enumerate()
        .map(|(position, roster_index)| {
            let (min, max) = scheduler.delay_window(position);
            PlanRow {
                position,
                roster_index,
                min_delay_ms: min.as_millis(),
                max_delay_ms: max.as_millis(),
            }
        })
        .collect())
}

pub async fn execute(command: ScheduleCommand, config_override: Option<PathBuf>) -> Result<()> {
    let config = CoordinatorConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let scheduler = config
        .spec
        .dispatch
        .scheduler()
        .context("Invalid dispatch settings")?;

    let rows = plan(&scheduler, command.event_id, command.agents)?;

    println!(
        "{}",
        format!(
            "Dispatch order for event {} ({} agents)",
            command.event_id, command.agents
        )
        .bold()
    );
    println!("{:>8}  {:>12}  {}", "POSITION", "ROSTER INDEX", "DELAY");
    for row in rows {
        let delay = if row.position == 0 {
            "immediate".green().to_string()
        } else {
            format!("{}..{} ms", row.min_delay_ms, row.max_delay_ms)
        };
        println!("{:>8}  {:>12}  {}", row.position, row.roster_index, delay);
    }

    Ok(())
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the chorus CLI

pub mod cache;
pub mod config;
pub mod db;
pub mod roster;
pub mod schedule;

pub use self::config::ConfigCommand;
pub use self::db::DbCommand;
pub use self::schedule::ScheduleCommand;

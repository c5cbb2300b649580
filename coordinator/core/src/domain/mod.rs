// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Domain model for coordinated response dispatch.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Aggregates, value objects, pure policies and port traits

pub mod agent;
pub mod clock;
pub mod coordinator_config;
pub mod events;
pub mod failure;
pub mod notifier;
pub mod repository;
pub mod restriction;
pub mod topic;
pub mod transport;

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Coordinated response dispatch for a pool of credential-bearing agents.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain types, application services and store/notification adapters

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;

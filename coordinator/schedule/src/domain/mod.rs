// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Scheduling Domain Layer
//!
//! Pure scheduling types. No I/O, no clocks, no shared state.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`schedule`] | `DispatchScheduler`, `DispatchSlot`, `JitterWindow` |

pub mod schedule;

pub use schedule::*;

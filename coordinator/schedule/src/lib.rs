// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `chorus-schedule` - Deterministic Dispatch Ordering
//!
//! Lets N independently running agents agree on who responds first to an
//! event, and how long everybody else waits, without exchanging a single
//! message. Every agent derives the same permutation of the roster from the
//! event identifier alone.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `DispatchScheduler`, `DispatchSlot`, `JitterWindow`, `ScheduleError` |
//!
//! ## Key Concepts
//!
//! - **Dispatch order**: a permutation of `[0, agent_count)` seeded solely by the
//!   event id. Position 0 is the first responder and never waits.
//! - **Delay window**: position `p > 0` waits `p * base_unit` plus a jitter drawn
//!   from a window no wider than `base_unit`, so windows of consecutive
//!   positions never overlap.
//!
//! The permutation is drawn from a ChaCha8 stream keyed by the event id, so it
//! is stable across builds and platforms.

pub mod domain;

pub use domain::*;

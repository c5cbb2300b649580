// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Dispatch Scheduler
//!
//! Maps `(event_seed, agent_count, agent_index)` to a [`DispatchSlot`]:
//!
//! - [`DispatchScheduler::dispatch_order`] - the seeded permutation shared by all agents.
//! - [`DispatchScheduler::slot`] - this agent's position and deterministic base delay.
//! - [`DispatchScheduler::delay`] - base delay plus human-plausible jitter.
//!
//! ## Delay Table
//! | Position | Delay |
//! |----------|-------|
//! | 0 | zero |
//! | p > 0 | `p * base_unit + jitter`, `jitter ∈ [min, max]` |
//!
//! Because `max - min <= base_unit` is enforced at construction, the latest
//! possible delay of position `p` never exceeds the earliest possible delay of
//! position `p + 1`.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Uniform jitter range added to every non-zero delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitterWindow {
    pub min: Duration,
    pub max: Duration,
}

impl JitterWindow {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Width of the window.
    pub fn span(&self) -> Duration {
        self.max.saturating_sub(self.min)
    }
}

impl Default for JitterWindow {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(100),
            max: Duration::from_millis(400),
        }
    }
}

/// Errors raised while building a scheduler or computing a slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("Agent count must be positive")]
    EmptyRoster,

    #[error("Agent index {index} is outside a roster of {count}")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Base unit must be positive")]
    ZeroBaseUnit,

    #[error("Jitter minimum {min:?} exceeds maximum {max:?}")]
    InvertedJitter { min: Duration, max: Duration },

    #[error("Jitter window {span:?} is wider than the base unit {base_unit:?}")]
    JitterTooWide { span: Duration, base_unit: Duration },
}

/// One agent's place in the dispatch order for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSlot {
    /// Position in the seeded permutation; 0 responds immediately.
    pub position: usize,
    /// Roster size the permutation was computed for.
    pub agent_count: usize,
    /// `position * base_unit`, the deterministic part of the delay.
    pub base_delay: Duration,
}

impl DispatchSlot {
    pub fn is_first(&self) -> bool {
        self.position == 0
    }
}

/// Communication-free scheduler shared by every agent in the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchScheduler {
    base_unit: Duration,
    jitter: JitterWindow,
}

impl DispatchScheduler {
    pub fn new(base_unit: Duration, jitter: JitterWindow) -> Result<Self, ScheduleError> {
        if base_unit.is_zero() {
            return Err(ScheduleError::ZeroBaseUnit);
        }
        if jitter.min > jitter.max {
            return Err(ScheduleError::InvertedJitter {
                min: jitter.min,
                max: jitter.max,
            });
        }
        if jitter.span() > base_unit {
            return Err(ScheduleError::JitterTooWide {
                span: jitter.span(),
                base_unit,
            });
        }
        Ok(Self { base_unit, jitter })
    }

    pub fn base_unit(&self) -> Duration {
        self.base_unit
    }

    pub fn jitter(&self) -> JitterWindow {
        self.jitter
    }

    /// Seeded permutation of `[0, agent_count)`.
    ///
    /// `order[p]` is the roster index of the agent at position `p`. The result
    /// depends on nothing but the two arguments: the ChaCha8 key is the
    /// little-endian seed and the shuffle reduces raw 64-bit outputs itself, so
    /// processes built against different `rand` releases still agree.
    pub fn dispatch_order(event_seed: i64, agent_count: usize) -> Result<Vec<usize>, ScheduleError> {
        if agent_count == 0 {
            return Err(ScheduleError::EmptyRoster);
        }
        let mut key = [0u8; 32];
        key[..8].copy_from_slice(&event_seed.to_le_bytes());
        let mut rng = ChaCha8Rng::from_seed(key);

        // Fisher-Yates, j = floor(u64 * (i + 1) / 2^64)
        let mut order: Vec<usize> = (0..agent_count).collect();
        for i in (1..agent_count).rev() {
            let bound = (i + 1) as u128;
            let j = ((u128::from(rng.next_u64()) * bound) >> 64) as usize;
            order.swap(i, j);
        }
        Ok(order)
    }

    /// Position of `agent_index` in the order for `event_seed`.
    pub fn slot(
        &self,
        event_seed: i64,
        agent_count: usize,
        agent_index: usize,
    ) -> Result<DispatchSlot, ScheduleError> {
        if agent_index >= agent_count {
            return Err(ScheduleError::IndexOutOfRange {
                index: agent_index,
                count: agent_count,
            });
        }
        let order = Self::dispatch_order(event_seed, agent_count)?;
        let position = order
            .iter()
            .position(|&index| index == agent_index)
            .ok_or(ScheduleError::IndexOutOfRange {
                index: agent_index,
                count: agent_count,
            })?;

        Ok(DispatchSlot {
            position,
            agent_count,
            base_delay: self.base_unit * position as u32,
        })
    }

    /// Earliest and latest delay an agent at `position` can be assigned.
    pub fn delay_window(&self, position: usize) -> (Duration, Duration) {
        if position == 0 {
            return (Duration::ZERO, Duration::ZERO);
        }
        let base = self.base_unit * position as u32;
        (base + self.jitter.min, base + self.jitter.max)
    }

    /// Full delay for `slot`. The jitter source does not need to be seeded.
    pub fn delay<R: Rng + ?Sized>(&self, slot: &DispatchSlot, rng: &mut R) -> Duration {
        if slot.is_first() {
            return Duration::ZERO;
        }
        let jitter = if self.jitter.span().is_zero() {
            self.jitter.min
        } else {
            rng.random_range(self.jitter.min..=self.jitter.max)
        };
        slot.base_delay + jitter
    }
}

impl Default for DispatchScheduler {
    fn default() -> Self {
        Self {
            base_unit: Duration::from_millis(500),
            jitter: JitterWindow::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn scheduler() -> DispatchScheduler {
        DispatchScheduler::default()
    }

    #[test]
    fn test_positions_form_a_permutation() {
        let scheduler = scheduler();
        for agent_count in 1..=12usize {
            for seed in [-7i64, 0, 1, 42, 9_999, i64::MAX] {
                let positions: HashSet<usize> = (0..agent_count)
                    .map(|index| scheduler.slot(seed, agent_count, index).unwrap().position)
                    .collect();
                let expected: HashSet<usize> = (0..agent_count).collect();
                assert_eq!(positions, expected, "seed {seed}, count {agent_count}");
            }
        }
    }

    #[test]
    fn test_exactly_one_first_responder() {
        let scheduler = scheduler();
        let mut rng = rand::rng();
        for seed in 0..200i64 {
            let zero_delays = (0..5)
                .map(|index| scheduler.slot(seed, 5, index).unwrap())
                .filter(|slot| scheduler.delay(slot, &mut rng).is_zero())
                .count();
            assert_eq!(zero_delays, 1, "seed {seed}");
        }
    }

    #[test]
    fn test_slot_is_deterministic() {
        let scheduler = scheduler();
        let first = scheduler.slot(123_456, 7, 3).unwrap();
        for _ in 0..50 {
            assert_eq!(scheduler.slot(123_456, 7, 3).unwrap(), first);
        }
        assert_eq!(
            DispatchScheduler::dispatch_order(123_456, 7).unwrap(),
            DispatchScheduler::dispatch_order(123_456, 7).unwrap()
        );
    }

    #[test]
    fn test_dispatch_order_is_pinned() {
        // ChaCha8 keystream values; must hold for every build of the crate
        let cases: [(i64, usize, &[usize]); 5] = [
            (42, 3, &[2, 0, 1]),
            (42, 5, &[2, 0, 3, 4, 1]),
            (7, 8, &[2, 5, 7, 4, 1, 0, 3, 6]),
            (-1, 4, &[3, 1, 0, 2]),
            (0, 6, &[1, 2, 4, 0, 3, 5]),
        ];
        for (seed, count, expected) in cases {
            assert_eq!(
                DispatchScheduler::dispatch_order(seed, count).unwrap(),
                expected,
                "seed {seed}, count {count}"
            );
        }
        assert_eq!(DispatchScheduler::dispatch_order(99, 1).unwrap(), vec![0]);
    }

    #[test]
    fn test_delay_stays_inside_window() {
        let scheduler = scheduler();
        let mut rng = rand::rng();
        for index in 0..4 {
            let slot = scheduler.slot(42, 4, index).unwrap();
            let (min, max) = scheduler.delay_window(slot.position);
            for _ in 0..100 {
                let delay = scheduler.delay(&slot, &mut rng);
                assert!(delay >= min && delay <= max, "{delay:?} outside {min:?}..={max:?}");
            }
        }
    }

    #[test]
    fn test_windows_never_overlap() {
        let scheduler = scheduler();
        for position in 0..20 {
            let (_, latest) = scheduler.delay_window(position);
            let (earliest_next, _) = scheduler.delay_window(position + 1);
            assert!(latest < earliest_next, "position {position}");
        }
    }

    #[test]
    fn test_three_agents_event_42() {
        let scheduler = scheduler();
        let mut slots: Vec<DispatchSlot> = (0..3)
            .map(|index| scheduler.slot(42, 3, index).unwrap())
            .collect();
        slots.sort_by_key(|slot| slot.position);

        assert_eq!(
            slots.iter().map(|s| s.position).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(slots[0].base_delay.is_zero());
        assert!(scheduler.delay_window(1).0 < scheduler.delay_window(2).0);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert_eq!(
            DispatchScheduler::dispatch_order(1, 0),
            Err(ScheduleError::EmptyRoster)
        );
        assert_eq!(
            scheduler().slot(1, 3, 3),
            Err(ScheduleError::IndexOutOfRange { index: 3, count: 3 })
        );
        assert_eq!(
            DispatchScheduler::new(Duration::ZERO, JitterWindow::default()),
            Err(ScheduleError::ZeroBaseUnit)
        );
        assert!(matches!(
            DispatchScheduler::new(
                Duration::from_millis(500),
                JitterWindow::new(Duration::from_millis(300), Duration::from_millis(100)),
            ),
            Err(ScheduleError::InvertedJitter { .. })
        ));
        assert!(matches!(
            DispatchScheduler::new(
                Duration::from_millis(100),
                JitterWindow::new(Duration::ZERO, Duration::from_millis(400)),
            ),
            Err(ScheduleError::JitterTooWide { .. })
        ));
    }

    #[test]
    fn test_fixed_jitter_window() {
        let scheduler = DispatchScheduler::new(
            Duration::from_millis(200),
            JitterWindow::new(Duration::from_millis(50), Duration::from_millis(50)),
        )
        .unwrap();
        let slot = DispatchSlot {
            position: 2,
            agent_count: 3,
            base_delay: Duration::from_millis(400),
        };
        assert_eq!(
            scheduler.delay(&slot, &mut rand::rng()),
            Duration::from_millis(450)
        );
    }

    #[test]
    fn test_slot_serializes() {
        let slot = scheduler().slot(42, 3, 0).unwrap();
        let json = serde_json::to_value(slot).unwrap();
        assert_eq!(json["agent_count"], 3);
    }
}

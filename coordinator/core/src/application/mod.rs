// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent_runner;
pub mod config_cache;
pub mod coordinator;
pub mod dispatcher;
pub mod notifications;
pub mod refresher;
pub mod restriction_tracker;

// Re-export services for convenience
pub use agent_runner::{AgentRunner, AgentServices};
pub use config_cache::{ConfigCache, ConfigSnapshot, TopicCatalog};
pub use coordinator::{Coordinator, CoordinatorPorts, CoordinatorSettings};
pub use dispatcher::{AgentContext, DispatchOutcome, DispatchPolicy, ResponseDispatcher};
pub use notifications::NotificationSink;
pub use refresher::{CacheRefresher, RefreshSummary};
pub use restriction_tracker::RestrictionTracker;

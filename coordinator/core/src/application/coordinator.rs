// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Coordinator
//!
//! Top-level wiring for one process:
//!
//! 1. Perform the first cache refresh (startup fails if it fails).
//! 2. Read the roster of active agents, ordered by id.
//! 3. Start the refresh loop.
//! 4. Start one [`AgentRunner`] per agent with its fixed [`RosterSlot`].
//! 5. Wait for every runner to end, then stop the refresh loop.
//!
//! Runners are never restarted. The roster is read once; agents added or
//! removed later take effect on the next start.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use chorus_schedule::DispatchScheduler;

use crate::application::agent_runner::{AgentRunner, AgentServices};
use crate::application::config_cache::ConfigCache;
use crate::application::dispatcher::{DispatchPolicy, ResponseDispatcher};
use crate::application::notifications::NotificationSink;
use crate::application::refresher::CacheRefresher;
use crate::application::restriction_tracker::RestrictionTracker;
use crate::domain::agent::{AgentExit, AgentId, RosterSlot};
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::coordinator_config::CoordinatorConfigSpec;
use crate::domain::notifier::AdminNotifier;
use crate::domain::repository::{AgentRepository, RestrictionRepository, TopicRepository};
use crate::domain::transport::TransportConnector;
use crate::infrastructure::event_bus::EventBus;

/// External dependencies of the coordinator.
#[derive(Clone)]
pub struct CoordinatorPorts {
    pub agents: Arc<dyn AgentRepository>,
    pub topics: Arc<dyn TopicRepository>,
    pub restrictions: Arc<dyn RestrictionRepository>,
    pub connector: Arc<dyn TransportConnector>,
    pub notifier: Arc<dyn AdminNotifier>,
}

/// Tunables resolved from configuration.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorSettings {
    pub scheduler: DispatchScheduler,
    pub policy: DispatchPolicy,
    pub refresh_interval: Duration,
    pub seen_event_capacity: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            scheduler: DispatchScheduler::default(),
            policy: DispatchPolicy::default(),
            refresh_interval: Duration::from_secs(60),
            seen_event_capacity: 1024,
        }
    }
}

impl CoordinatorSettings {
    pub fn from_spec(spec: &CoordinatorConfigSpec) -> Result<Self> {
        Ok(Self {
            scheduler: spec
                .dispatch
                .scheduler()
                .context("Invalid dispatch settings")?,
            policy: DispatchPolicy::from_config(&spec.restrictions)
                .context("Invalid restriction settings")?,
            refresh_interval: spec.cache.refresh_interval,
            seen_event_capacity: spec.dispatch.seen_event_capacity,
        })
    }
}

pub struct Coordinator {
    ports: CoordinatorPorts,
    settings: CoordinatorSettings,
    cache: Arc<ConfigCache>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
}

impl Coordinator {
    pub fn new(ports: CoordinatorPorts, settings: CoordinatorSettings) -> Self {
        Self {
            ports,
            settings,
            cache: Arc::new(ConfigCache::new()),
            event_bus: EventBus::with_default_capacity(),
            clock: Arc::new(SystemClock),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn cache(&self) -> Arc<ConfigCache> {
        self.cache.clone()
    }

    pub fn event_bus(&self) -> EventBus {
        self.event_bus.clone()
    }

    /// Cancelling this token stops every runner and the refresh loop.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until every agent has ended. Returns each agent's exit.
    pub async fn run(&self) -> Result<Vec<(AgentId, AgentExit)>> {
        let refresher = Arc::new(CacheRefresher::new(
            self.ports.topics.clone(),
            self.ports.restrictions.clone(),
            self.cache.clone(),
            self.event_bus.clone(),
            self.clock.clone(),
            self.settings.refresh_interval,
        ));

        let summary = refresher
            .refresh_once()
            .await
            .context("Initial config cache refresh failed")?;
        metrics::counter!("chorus_cache_refreshes_total", "result" => "ok").increment(1);
        info!(
            topics = summary.topics,
            restrictions = summary.restrictions,
            "Config cache loaded"
        );

        let roster = self
            .ports
            .agents
            .list_active()
            .await
            .context("Failed to read agent roster")?;
        if roster.is_empty() {
            warn!("No active agents registered, nothing to run");
            return Ok(Vec::new());
        }

        let refresh_shutdown = self.shutdown.child_token();
        let refresh_handle = tokio::spawn({
            let refresher = refresher.clone();
            let token = refresh_shutdown.clone();
            async move { refresher.run(token).await }
        });

        let services = self.services();
        let count = roster.len();
        info!(agents = count, "Starting agents");

        let mut handles = Vec::with_capacity(count);
        for (index, agent) in roster.into_iter().enumerate() {
            let agent_id = agent.id;
            let runner = AgentRunner::new(
                agent,
                RosterSlot { index, count },
                services.clone(),
                self.shutdown.child_token(),
            );
            handles.push((agent_id, tokio::spawn(async move { runner.run().await })));
        }

        let mut exits = Vec::with_capacity(count);
        for (agent_id, handle) in handles {
            match handle.await {
                Ok(exit) => {
                    info!(agent_id = %agent_id, exit = ?exit, "Agent finished");
                    exits.push((agent_id, exit));
                }
                Err(e) => {
                    warn!(agent_id = %agent_id, error = %e, "Agent task aborted");
                    exits.push((
                        agent_id,
                        AgentExit::Terminated {
                            reason: e.to_string(),
                        },
                    ));
                }
            }
        }

        refresh_shutdown.cancel();
        if let Err(e) = refresh_handle.await {
            warn!(error = %e, "Refresh task aborted");
        }

        Ok(exits)
    }

    fn services(&self) -> AgentServices {
        let notifications = NotificationSink::new(self.ports.notifier.clone());
        let tracker = Arc::new(RestrictionTracker::new(
            self.ports.restrictions.clone(),
            self.cache.clone(),
        ));
        let dispatcher = Arc::new(ResponseDispatcher::new(
            self.cache.clone(),
            tracker.clone(),
            notifications.clone(),
            self.event_bus.clone(),
            self.clock.clone(),
            self.settings.policy,
        ));

        AgentServices {
            connector: self.ports.connector.clone(),
            cache: self.cache.clone(),
            tracker,
            dispatcher,
            scheduler: self.settings.scheduler,
            notifications,
            event_bus: self.event_bus.clone(),
            clock: self.clock.clone(),
            seen_event_capacity: self.settings.seen_event_capacity,
        }
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Runner
//!
//! Long-lived run loop for one agent:
//!
//! ```text
//! Connecting → Authorizing → Warming → Listening → (Terminated | Disconnected)
//! ```
//!
//! For every event received while listening the runner checks, in order:
//! de-duplication, the topic catalog, abandoned topics, rate-limit holds and
//! the restriction gate. The gates are checked again once the delay elapses. It then computes the agent's dispatch slot, draws the delay and a
//! response text, and hands the rest to a detached task so intake never waits
//! on a response.
//!
//! A runner never restarts itself. Fatal session errors and transport
//! disconnection end the loop; both release the transport session. When the
//! runner stops before listening, it waits for the operator notice to be
//! delivered before returning.

use futures::StreamExt;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chorus_schedule::DispatchScheduler;

use crate::application::config_cache::ConfigCache;
use crate::application::dispatcher::{AgentContext, ResponseDispatcher};
use crate::application::notifications::{messages, NotificationSink};
use crate::application::restriction_tracker::RestrictionTracker;
use crate::domain::agent::{Agent, AgentExit, AgentState, RosterSlot};
use crate::domain::clock::Clock;
use crate::domain::events::{DispatchEvent, SkipReason};
use crate::domain::restriction::RestrictionKey;
use crate::domain::topic::TopicId;
use crate::domain::transport::{EventId, IncomingEvent, SessionIdentity, TransportConnector, TransportError};
use crate::infrastructure::event_bus::EventBus;

/// Name used when neither the session nor the store knows one.
pub const UNKNOWN_AGENT_NAME: &str = "unknown";

/// Services shared by every runner in the process.
#[derive(Clone)]
pub struct AgentServices {
    pub connector: Arc<dyn TransportConnector>,
    pub cache: Arc<ConfigCache>,
    pub tracker: Arc<RestrictionTracker>,
    pub dispatcher: Arc<ResponseDispatcher>,
    pub scheduler: DispatchScheduler,
    pub notifications: NotificationSink,
    pub event_bus: EventBus,
    pub clock: Arc<dyn Clock>,
    pub seen_event_capacity: usize,
}

pub struct AgentRunner {
    agent: Agent,
    slot: RosterSlot,
    services: AgentServices,
    // event ids are only unique within a topic
    seen: Mutex<LruCache<(TopicId, EventId), ()>>,
    shutdown: CancellationToken,
}

impl AgentRunner {
    pub fn new(agent: Agent, slot: RosterSlot, services: AgentServices, shutdown: CancellationToken) -> Self {
        let capacity = NonZeroUsize::new(services.seen_event_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            agent,
            slot,
            services,
            seen: Mutex::new(LruCache::new(capacity)),
            shutdown,
        }
    }

    /// Drive the agent until it terminates or its transport disconnects.
    pub async fn run(&self) -> AgentExit {
        let agent_id = self.agent.id;
        let stored_name = self.agent.display_name.as_deref().unwrap_or(UNKNOWN_AGENT_NAME);

        self.transition(AgentState::Connecting);
        let session = match self.services.connector.connect(&self.agent.credential).await {
            Ok(session) => session,
            Err(e) => {
                warn!(agent_id = %agent_id, fingerprint = %self.agent.credential.fingerprint(), error = %e, "Failed to connect agent");
                self.services
                    .notifications
                    .send(&messages::connect_failed(stored_name, &e.to_string()))
                    .await;
                return self.finish(AgentExit::Terminated {
                    reason: e.to_string(),
                });
            }
        };

        self.transition(AgentState::Authorizing);
        match session.is_authorized().await {
            Ok(true) => {}
            Ok(false) => {
                warn!(agent_id = %agent_id, "Agent session is not authorized");
                self.services
                    .notifications
                    .send(&messages::session_revoked(stored_name))
                    .await;
                session.disconnect().await;
                return self.finish(AgentExit::Terminated {
                    reason: "session revoked".to_string(),
                });
            }
            Err(e) => {
                warn!(agent_id = %agent_id, error = %e, "Authorization check failed");
                self.services
                    .notifications
                    .send(&messages::connect_failed(stored_name, &e.to_string()))
                    .await;
                session.disconnect().await;
                return self.finish(AgentExit::Terminated {
                    reason: e.to_string(),
                });
            }
        }

        let identity = session.identity().await.ok();
        let display_name = resolve_display_name(identity.as_ref(), self.agent.display_name.as_deref());

        let ctx = Arc::new(AgentContext::new(
            agent_id,
            self.agent.credential.fingerprint(),
            display_name,
            session.clone(),
            self.shutdown.child_token(),
        ));

        self.transition(AgentState::Warming);
        self.warm_up(&ctx).await;
        self.services
            .notifications
            .post(messages::started(&ctx.display_name, self.slot.index));

        self.transition(AgentState::Listening);
        info!(agent_id = %agent_id, name = %ctx.display_name, index = self.slot.index, "Agent listening");
        let exit = self.listen(&ctx).await;

        session.disconnect().await;
        self.finish(exit)
    }

    /// Best-effort topic label prefetch.
    async fn warm_up(&self, ctx: &AgentContext) {
        let topics = self.services.cache.load().topic_ids();
        for topic in topics {
            self.services.dispatcher.resolve_label(ctx, topic).await;
        }
        debug!(agent_id = %ctx.agent_id, "Topic labels warmed");
    }

    async fn listen(&self, ctx: &Arc<AgentContext>) -> AgentExit {
        let mut events = match ctx.session.subscribe().await {
            Ok(events) => events,
            Err(TransportError::Disconnected) => {
                info!(agent_id = %ctx.agent_id, "Transport disconnected");
                return AgentExit::Disconnected;
            }
            Err(e) => return self.terminate_on(ctx, e),
        };

        loop {
            tokio::select! {
                _ = ctx.cancellation().cancelled() => {
                    let reason = ctx.termination_reason().unwrap_or_else(|| "shutdown".to_string());
                    info!(agent_id = %ctx.agent_id, reason = %reason, "Agent stopping");
                    return AgentExit::Terminated { reason };
                }
                next = events.next() => match next {
                    Some(Ok(event)) => self.on_event(ctx, event),
                    Some(Err(TransportError::Disconnected)) | None => {
                        info!(agent_id = %ctx.agent_id, "Transport disconnected");
                        return AgentExit::Disconnected;
                    }
                    Some(Err(e @ (TransportError::SessionInvalid(_) | TransportError::Auth(_)))) => {
                        return self.terminate_on(ctx, e);
                    }
                    Some(Err(e)) => {
                        warn!(agent_id = %ctx.agent_id, error = %e, "Event stream error");
                    }
                },
            }
        }
    }

    fn terminate_on(&self, ctx: &AgentContext, error: TransportError) -> AgentExit {
        let reason = match &error {
            TransportError::SessionInvalid(reason) => reason.to_string(),
            other => other.to_string(),
        };
        warn!(agent_id = %ctx.agent_id, reason = %reason, "Agent session terminated");
        self.services
            .notifications
            .post(messages::session_terminated(&ctx.display_name, &reason));
        ctx.terminate(reason.clone());
        AgentExit::Terminated { reason }
    }

    /// Decide whether and when to respond to `event`; the response itself runs detached.
    fn on_event(&self, ctx: &Arc<AgentContext>, event: IncomingEvent) {
        if self.seen.lock().put((event.topic_id, event.id), ()).is_some() {
            self.skip(ctx, &event, SkipReason::AlreadyHandled);
            return;
        }

        let Some(catalog) = self.services.cache.responses(event.topic_id) else {
            self.skip(ctx, &event, SkipReason::NoCatalog);
            return;
        };

        if let Some(reason) = closed_gate(ctx, &self.services.tracker, self.services.clock.as_ref(), event.topic_id) {
            self.skip(ctx, &event, reason);
            return;
        }

        let scheduler = &self.services.scheduler;
        let slot = match scheduler.slot(event.id.0, self.slot.count, self.slot.index) {
            Ok(slot) => slot,
            Err(e) => {
                warn!(agent_id = %ctx.agent_id, event_id = %event.id, error = %e, "Cannot schedule response");
                return;
            }
        };

        let (delay, text) = {
            let mut rng = rand::rng();
            (scheduler.delay(&slot, &mut rng), catalog.choose(&mut rng).to_string())
        };

        debug!(
            agent_id = %ctx.agent_id,
            topic_id = %event.topic_id,
            event_id = %event.id,
            position = slot.position,
            delay = ?delay,
            "Response scheduled"
        );
        self.services.event_bus.publish(DispatchEvent::ResponseScheduled {
            agent_id: ctx.agent_id,
            topic_id: event.topic_id,
            event_id: event.id,
            position: slot.position,
            delay,
        });

        let ctx = ctx.clone();
        let dispatcher = self.services.dispatcher.clone();
        let tracker = self.services.tracker.clone();
        let clock = self.services.clock.clone();
        let event_bus = self.services.event_bus.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = ctx.cancellation().cancelled() => {
                    debug!(agent_id = %ctx.agent_id, event_id = %event.id, "Scheduled response dropped, agent stopping");
                }
                _ = tokio::time::sleep(delay) => {
                    // the gate may have closed while this response was waiting
                    match closed_gate(&ctx, &tracker, clock.as_ref(), event.topic_id) {
                        Some(reason) => publish_skip(&event_bus, &ctx, &event, reason),
                        None => {
                            dispatcher.dispatch(&ctx, &event, &text).await;
                        }
                    }
                }
            }
        });
    }

    fn skip(&self, ctx: &AgentContext, event: &IncomingEvent, reason: SkipReason) {
        publish_skip(&self.services.event_bus, ctx, event, reason);
    }

    fn transition(&self, state: AgentState) {
        debug!(agent_id = %self.agent.id, state = ?state, "Agent state changed");
        self.services.event_bus.publish(DispatchEvent::AgentStateChanged {
            agent_id: self.agent.id,
            state,
            at: self.services.clock.now(),
        });
    }

    fn finish(&self, exit: AgentExit) -> AgentExit {
        self.transition(exit.state());
        exit
    }
}

/// Why `topic` is closed to this agent right now, if it is.
fn closed_gate(
    ctx: &AgentContext,
    tracker: &RestrictionTracker,
    clock: &dyn Clock,
    topic: TopicId,
) -> Option<SkipReason> {
    if ctx.is_abandoned(topic) {
        return Some(SkipReason::Abandoned);
    }
    if ctx.is_throttled(topic) {
        return Some(SkipReason::Throttled);
    }
    let key = RestrictionKey::new(ctx.agent_id, topic);
    if !tracker.check(&key, clock.now()).allows_attempt() {
        return Some(SkipReason::Restricted);
    }
    None
}

fn publish_skip(event_bus: &EventBus, ctx: &AgentContext, event: &IncomingEvent, reason: SkipReason) {
    debug!(agent_id = %ctx.agent_id, topic_id = %event.topic_id, event_id = %event.id, reason = reason.as_str(), "Response skipped");
    metrics::counter!("chorus_responses_skipped_total", "reason" => reason.as_str()).increment(1);
    event_bus.publish(DispatchEvent::ResponseSkipped {
        agent_id: ctx.agent_id,
        topic_id: event.topic_id,
        event_id: event.id,
        reason,
    });
}

/// Live session name, then the stored name, then [`UNKNOWN_AGENT_NAME`].
pub fn resolve_display_name(identity: Option<&SessionIdentity>, stored: Option<&str>) -> String {
    identity
        .and_then(SessionIdentity::display_name)
        .or_else(|| {
            stored
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| UNKNOWN_AGENT_NAME.to_string())
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Response Dispatcher
//!
//! Performs exactly one write attempt for a scheduled response and applies
//! the corrective action for whatever failure comes back.
//!
//! | Outcome | Action |
//! |---------|--------|
//! | sent | log, notify |
//! | `RateLimited` | throttle the topic for `wait + margin`, notify, sleep |
//! | `TemporaryRestriction` | record restriction, notify |
//! | `PermanentRestriction` | notify, leave topic, abandon topic for this run |
//! | `AccessRevoked` | notify |
//! | `FatalSession` | notify, cancel the agent's run loop |
//! | `Unclassified` | log, notify truncated detail |
//!
//! Nothing is retried. A throttled topic is not waited on here: the agent
//! runner skips events in it until the hold lapses, and the next event after
//! that gets a fresh attempt. The dispatcher never returns an error; every
//! failure is converted into a [`DispatchOutcome`].

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::config_cache::ConfigCache;
use crate::application::notifications::{messages, NotificationSink};
use crate::application::restriction_tracker::RestrictionTracker;
use crate::domain::agent::{AgentId, CredentialFingerprint};
use crate::domain::clock::Clock;
use crate::domain::coordinator_config::RestrictionPolicyConfig;
use crate::domain::events::DispatchEvent;
use crate::domain::failure::{classify, FailureOutcome};
use crate::domain::restriction::Restriction;
use crate::domain::topic::TopicId;
use crate::domain::transport::{IncomingEvent, TransportError, TransportSession};
use crate::infrastructure::event_bus::EventBus;

/// Thresholds applied when classifying and reacting to failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Restrictions lasting at least this long are treated as permanent.
    pub permanent_after: chrono::Duration,
    /// Added to every rate-limit wait.
    pub rate_limit_margin: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            permanent_after: chrono::Duration::days(366),
            rate_limit_margin: Duration::from_secs(2),
        }
    }
}

impl DispatchPolicy {
    pub fn from_config(config: &RestrictionPolicyConfig) -> anyhow::Result<Self> {
        Ok(Self {
            permanent_after: chrono::Duration::from_std(config.permanent_after)?,
            rate_limit_margin: config.rate_limit_margin,
        })
    }
}

/// Per-agent state shared between the run loop and its detached response tasks.
pub struct AgentContext {
    pub agent_id: AgentId,
    pub fingerprint: CredentialFingerprint,
    pub display_name: String,
    pub session: Arc<dyn TransportSession>,
    throttles: DashMap<TopicId, Instant>,
    abandoned: DashSet<TopicId>,
    cancel: CancellationToken,
    termination: Mutex<Option<String>>,
}

impl AgentContext {
    pub fn new(
        agent_id: AgentId,
        fingerprint: CredentialFingerprint,
        display_name: impl Into<String>,
        session: Arc<dyn TransportSession>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            agent_id,
            fingerprint,
            display_name: display_name.into(),
            session,
            throttles: DashMap::new(),
            abandoned: DashSet::new(),
            cancel,
            termination: Mutex::new(None),
        }
    }

    /// Stop responding in `topic` for the rest of this run.
    pub fn abandon(&self, topic: TopicId) {
        self.abandoned.insert(topic);
    }

    pub fn is_abandoned(&self, topic: TopicId) -> bool {
        self.abandoned.contains(&topic)
    }

    /// Hold further attempts in `topic` until `until`; never shortens an existing hold.
    pub fn throttle(&self, topic: TopicId, until: Instant) {
        self.throttles
            .entry(topic)
            .and_modify(|current| {
                if until > *current {
                    *current = until;
                }
            })
            .or_insert(until);
    }

    /// True while a rate-limit hold on `topic` is in force.
    pub fn is_throttled(&self, topic: TopicId) -> bool {
        self.throttles
            .get(&topic)
            .is_some_and(|entry| *entry.value() > Instant::now())
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stop the agent's run loop; the first reason given wins.
    pub fn terminate(&self, reason: impl Into<String>) {
        self.termination.lock().get_or_insert_with(|| reason.into());
        self.cancel.cancel();
    }

    pub fn termination_reason(&self) -> Option<String> {
        self.termination.lock().clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Failed(FailureOutcome),
}

pub struct ResponseDispatcher {
    cache: Arc<ConfigCache>,
    tracker: Arc<RestrictionTracker>,
    notifications: NotificationSink,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    policy: DispatchPolicy,
}

impl ResponseDispatcher {
    pub fn new(
        cache: Arc<ConfigCache>,
        tracker: Arc<RestrictionTracker>,
        notifications: NotificationSink,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            cache,
            tracker,
            notifications,
            event_bus,
            clock,
            policy,
        }
    }

    /// Topic label for logs and notifications: cache, then transport lookup,
    /// then an id placeholder.
    pub async fn resolve_label(&self, ctx: &AgentContext, topic: TopicId) -> String {
        if let Some(label) = self.cache.label(topic) {
            return label;
        }
        match ctx.session.topic_label(topic).await {
            Ok(label) => {
                self.cache.remember_label(topic, label.clone());
                label
            }
            Err(e) => {
                debug!(topic_id = %topic, error = %e, "Topic label lookup failed");
                format!("ID: {}", topic)
            }
        }
    }

    /// Send `text` in reply to `event` and handle the result.
    pub async fn dispatch(&self, ctx: &AgentContext, event: &IncomingEvent, text: &str) -> DispatchOutcome {
        let topic = event.topic_id;
        let label = self.resolve_label(ctx, topic).await;

        let error = match ctx.session.send(topic, event.id, text).await {
            Ok(()) => {
                self.on_sent(ctx, event, &label, text);
                return DispatchOutcome::Sent;
            }
            Err(error) => error,
        };

        let now = self.clock.now();
        let membership = match &error {
            TransportError::WriteForbidden => match ctx.session.membership(topic).await {
                Ok(status) => Some(status),
                Err(e) => {
                    debug!(agent_id = %ctx.agent_id, topic_id = %topic, error = %e, "Membership lookup failed");
                    None
                }
            },
            _ => None,
        };
        let outcome = classify(&error, membership.as_ref(), now, self.policy.permanent_after);

        metrics::counter!("chorus_response_failures_total", "outcome" => outcome.kind()).increment(1);
        self.event_bus.publish(DispatchEvent::ResponseFailed {
            agent_id: ctx.agent_id,
            topic_id: topic,
            event_id: event.id,
            outcome: outcome.clone(),
        });

        self.apply(ctx, topic, &label, &outcome).await;

        DispatchOutcome::Failed(outcome)
    }

    fn on_sent(&self, ctx: &AgentContext, event: &IncomingEvent, label: &str, text: &str) {
        info!(
            agent_id = %ctx.agent_id,
            topic_id = %event.topic_id,
            event_id = %event.id,
            "Response sent to {}",
            label
        );
        metrics::counter!("chorus_responses_sent_total").increment(1);
        self.notifications
            .post(messages::sent(&ctx.display_name, label, text));
        self.event_bus.publish(DispatchEvent::ResponseSent {
            agent_id: ctx.agent_id,
            topic_id: event.topic_id,
            event_id: event.id,
            text: text.to_string(),
            at: self.clock.now(),
        });
    }

    async fn apply(
        &self,
        ctx: &AgentContext,
        topic: TopicId,
        label: &str,
        outcome: &FailureOutcome,
    ) {
        let name = ctx.display_name.as_str();
        match outcome {
            FailureOutcome::RateLimited { wait } => {
                let pause = *wait + self.policy.rate_limit_margin;
                warn!(agent_id = %ctx.agent_id, topic_id = %topic, wait = ?wait, "Rate limited");
                ctx.throttle(topic, Instant::now() + pause);
                self.notifications
                    .post(messages::rate_limited(name, label, *wait));
                tokio::time::sleep(pause).await;
            }
            FailureOutcome::TemporaryRestriction { until } => {
                info!(agent_id = %ctx.agent_id, topic_id = %topic, until = %until, "Temporarily restricted");
                self.tracker
                    .record(Restriction {
                        agent_id: ctx.agent_id,
                        topic_id: topic,
                        credential_fingerprint: ctx.fingerprint.clone(),
                        expires_at: *until,
                    })
                    .await;
                self.notifications
                    .post(messages::restricted_until(name, label, *until));
            }
            FailureOutcome::PermanentRestriction => {
                warn!(agent_id = %ctx.agent_id, topic_id = %topic, "Permanently restricted, leaving topic");
                ctx.abandon(topic);
                self.notifications.post(messages::banned(name, label));
                if let Err(e) = ctx.session.leave(topic).await {
                    warn!(agent_id = %ctx.agent_id, topic_id = %topic, error = %e, "Failed to leave topic");
                }
            }
            FailureOutcome::AccessRevoked => {
                warn!(agent_id = %ctx.agent_id, topic_id = %topic, "Topic inaccessible");
                self.notifications
                    .post(messages::access_revoked(name, label));
            }
            FailureOutcome::FatalSession { reason } => {
                warn!(agent_id = %ctx.agent_id, reason = %reason, "Session invalid, stopping agent");
                self.notifications
                    .post(messages::session_terminated(name, reason));
                ctx.terminate(reason.clone());
            }
            FailureOutcome::Unclassified { detail } => {
                warn!(agent_id = %ctx.agent_id, topic_id = %topic, "Response failed: {}", detail);
                self.notifications
                    .post(messages::unclassified(name, label, detail));
            }
        }
    }
}

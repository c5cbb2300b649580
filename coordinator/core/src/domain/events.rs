// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events published on the in-process [`crate::infrastructure::event_bus::EventBus`].

use crate::domain::agent::{AgentId, AgentState};
use crate::domain::failure::FailureOutcome;
use crate::domain::topic::TopicId;
use crate::domain::transport::EventId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Why an agent did not attempt a response to an event it received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyHandled,
    NoCatalog,
    Throttled,
    Restricted,
    Abandoned,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::AlreadyHandled => "already_handled",
            SkipReason::NoCatalog => "no_catalog",
            SkipReason::Throttled => "throttled",
            SkipReason::Restricted => "restricted",
            SkipReason::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    AgentStateChanged {
        agent_id: AgentId,
        state: AgentState,
        at: DateTime<Utc>,
    },
    ResponseScheduled {
        agent_id: AgentId,
        topic_id: TopicId,
        event_id: EventId,
        position: usize,
        delay: Duration,
    },
    ResponseSkipped {
        agent_id: AgentId,
        topic_id: TopicId,
        event_id: EventId,
        reason: SkipReason,
    },
    ResponseSent {
        agent_id: AgentId,
        topic_id: TopicId,
        event_id: EventId,
        text: String,
        at: DateTime<Utc>,
    },
    ResponseFailed {
        agent_id: AgentId,
        topic_id: TopicId,
        event_id: EventId,
        outcome: FailureOutcome,
    },
    CacheRefreshed {
        topics: usize,
        restrictions: usize,
        at: DateTime<Utc>,
    },
}

impl DispatchEvent {
    /// Agent the event concerns, if any.
    pub fn agent_id(&self) -> Option<AgentId> {
        match self {
            DispatchEvent::AgentStateChanged { agent_id, .. }
            | DispatchEvent::ResponseScheduled { agent_id, .. }
            | DispatchEvent::ResponseSkipped { agent_id, .. }
            | DispatchEvent::ResponseSent { agent_id, .. }
            | DispatchEvent::ResponseFailed { agent_id, .. } => Some(*agent_id),
            DispatchEvent::CacheRefreshed { .. } => None,
        }
    }
}

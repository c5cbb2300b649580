// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Transport Port
//!
//! Boundary to the external client that owns authentication, session
//! management and event delivery. The core only ever talks to a transport
//! through [`TransportConnector`] and [`TransportSession`].
//!
//! Write failures surface as a closed [`TransportError`] set; the failure
//! classifier in [`crate::domain::failure`] turns them into outcomes.

use crate::domain::agent::Credential;
use crate::domain::topic::TopicId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Transport-assigned, monotonically increasing event identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub i64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One occurrence in the shared stream. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingEvent {
    pub id: EventId,
    pub topic_id: TopicId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionInvalidReason {
    /// The account behind the credential was deactivated.
    Deactivated,
    /// The credential is in use by another session.
    Duplicated,
    /// The credential was revoked or never authorized.
    Revoked,
}

impl fmt::Display for SessionInvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionInvalidReason::Deactivated => f.write_str("account deactivated"),
            SessionInvalidReason::Duplicated => f.write_str("session duplicated elsewhere"),
            SessionInvalidReason::Revoked => f.write_str("session revoked"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited, retry after {wait:?}")]
    RateLimited { wait: Duration },

    #[error("Write forbidden")]
    WriteForbidden,

    #[error("Topic is inaccessible")]
    AccessDenied,

    #[error("Session invalid: {0}")]
    SessionInvalid(SessionInvalidReason),

    #[error("Transport disconnected")]
    Disconnected,

    #[error("{0}")]
    Other(String),
}

/// What the transport reports about this agent's standing in a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipStatus {
    Member,
    /// Banned or muted; `until: None` means no expiry.
    Restricted { until: Option<DateTime<Utc>> },
    NotMember,
}

/// Identity of the account behind a live session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl SessionIdentity {
    /// Joined, trimmed name; `None` when both parts are blank.
    pub fn display_name(&self) -> Option<String> {
        let joined = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let trimmed = joined.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// Infinite event sequence; ends only when the transport disconnects.
pub type EventStream = BoxStream<'static, Result<IncomingEvent, TransportError>>;

#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Open a session for `credential`. Fails with `TransportError::Auth` when
    /// no session can be established.
    async fn connect(&self, credential: &Credential) -> Result<Arc<dyn TransportSession>, TransportError>;
}

#[async_trait]
pub trait TransportSession: Send + Sync {
    async fn is_authorized(&self) -> Result<bool, TransportError>;

    async fn identity(&self) -> Result<SessionIdentity, TransportError>;

    /// Not restartable: a second subscription requires a new session.
    async fn subscribe(&self) -> Result<EventStream, TransportError>;

    /// Respond to `reply_to` in `topic`.
    async fn send(&self, topic: TopicId, reply_to: EventId, text: &str) -> Result<(), TransportError>;

    async fn topic_label(&self, topic: TopicId) -> Result<String, TransportError>;

    async fn membership(&self, topic: TopicId) -> Result<MembershipStatus, TransportError>;

    async fn leave(&self, topic: TopicId) -> Result<(), TransportError>;

    async fn disconnect(&self);
}

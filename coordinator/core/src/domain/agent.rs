// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Store-assigned agent identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub i64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque session credential. Never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short SHA-256 prefix safe for logs and restriction records.
    pub fn fingerprint(&self) -> CredentialFingerprint {
        let digest = Sha256::digest(self.0.as_bytes());
        CredentialFingerprint(hex::encode(&digest[..8]))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialFingerprint(pub String);

impl fmt::Display for CredentialFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered, credential-bearing agent. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub credential: Credential,
    pub display_name: Option<String>,
    pub active: bool,
}

impl Agent {
    pub fn new(id: AgentId, credential: Credential) -> Self {
        Self {
            id,
            credential,
            display_name: None,
            active: true,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Fixed place of one agent in the roster snapshot every process started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSlot {
    pub index: usize,
    pub count: usize,
}

/// Lifecycle of one agent's run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Connecting,
    Authorizing,
    Warming,
    Listening,
    Terminated,
    Disconnected,
}

impl AgentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Terminated | AgentState::Disconnected)
    }
}

/// How a run loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentExit {
    /// Session could not be used any more; the reason was notified.
    Terminated { reason: String },
    /// The event stream ended.
    Disconnected,
}

impl AgentExit {
    pub fn state(&self) -> AgentState {
        match self {
            AgentExit::Terminated { .. } => AgentState::Terminated,
            AgentExit::Disconnected => AgentState::Disconnected,
        }
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Fire-and-forget wrapper around an [`AdminNotifier`]. Delivery failures are
//! logged here and never reach the caller.

use std::sync::Arc;
use tracing::warn;

use crate::domain::notifier::AdminNotifier;

#[derive(Clone)]
pub struct NotificationSink {
    notifier: Arc<dyn AdminNotifier>,
}

impl NotificationSink {
    pub fn new(notifier: Arc<dyn AdminNotifier>) -> Self {
        Self { notifier }
    }

    /// Send in the background; returns immediately.
    pub fn post(&self, text: impl Into<String>) {
        let notifier = self.notifier.clone();
        let text = text.into();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&text).await {
                warn!(error = %e, "Admin notification not delivered");
            }
        });
    }

    /// Send and wait for delivery, still swallowing failures. For callers
    /// that are about to stop.
    pub async fn send(&self, text: &str) {
        if let Err(e) = self.notifier.notify(text).await {
            warn!(error = %e, "Admin notification not delivered");
        }
    }
}

/// Operator-facing message texts.
pub mod messages {
    use chrono::{DateTime, Utc};
    use std::time::Duration;

    pub fn sent(name: &str, label: &str, text: &str) -> String {
        format!("✅ {name} → {label}\n💬 {text}")
    }

    pub fn rate_limited(name: &str, label: &str, wait: Duration) -> String {
        format!("⏳ {name}: rate limited ({}s) in {label}, paused", wait.as_secs())
    }

    pub fn restricted_until(name: &str, label: &str, until: DateTime<Utc>) -> String {
        format!(
            "⏳ {name}: writing restricted in {label} until {}",
            until.format("%Y-%m-%d %H:%M")
        )
    }

    pub fn banned(name: &str, label: &str) -> String {
        format!("🚫 {name}: permanently banned in {label}, leaving")
    }

    pub fn access_revoked(name: &str, label: &str) -> String {
        format!("🔒 {name}: {label} is private or the account was removed")
    }

    pub fn session_terminated(name: &str, reason: &str) -> String {
        format!("❌ {name}: session terminated ({reason})")
    }

    pub fn unclassified(name: &str, label: &str, detail: &str) -> String {
        format!("⚠️ {name}: error in {label} - {detail}")
    }

    pub fn started(name: &str, index: usize) -> String {
        format!("🚀 {name} started (index {index})")
    }

    pub fn session_revoked(name: &str) -> String {
        format!("❌ {name}: session is not authorized (revoked)")
    }

    pub fn connect_failed(name: &str, detail: &str) -> String {
        format!("🔴 {name}: connection failed - {detail}")
    }
}

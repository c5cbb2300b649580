// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Administrative notification port. Delivery is best-effort; callers go
//! through [`crate::application::notifications::NotificationSink`], which never
//! propagates failures.

use async_trait::async_trait;

#[async_trait]
pub trait AdminNotifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification endpoint returned HTTP {0}")]
    Status(u16),

    #[error("Notification request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Request(err.to_string())
    }
}

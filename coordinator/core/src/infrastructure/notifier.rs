// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Admin notification adapters.
//!
//! - [`HttpBotNotifier`] posts to a bot API `sendMessage` endpoint.
//! - [`LogNotifier`] writes notifications to the log when no endpoint is configured.

use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use crate::domain::coordinator_config::{resolve_env_ref, NotificationConfig};
use crate::domain::notifier::{AdminNotifier, NotifyError};

pub struct HttpBotNotifier {
    client: reqwest::Client,
    url: String,
    chat_id: String,
}

impl HttpBotNotifier {
    pub fn new(endpoint: &str, bot_token: &str, chat_id: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/bot{}/sendMessage", endpoint.trim_end_matches('/'), bot_token),
            chat_id: chat_id.into(),
        })
    }

    /// Build from configuration, resolving "env:" references.
    pub fn from_config(config: &NotificationConfig) -> anyhow::Result<Self> {
        let token = resolve_env_ref(&config.bot_token)?;
        let chat_id = resolve_env_ref(&config.chat_id)?;
        Ok(Self::new(&config.endpoint, &token, chat_id)?)
    }
}

#[async_trait]
impl AdminNotifier for HttpBotNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .form(&[("chat_id", self.chat_id.as_str()), ("text", text)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl AdminNotifier for LogNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        info!(notification = %text, "Admin notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_posts_form_to_send_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("chat_id".into(), "42".into()),
                mockito::Matcher::UrlEncoded("text".into(), "hello admin".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let notifier = HttpBotNotifier::new(&server.url(), "TOKEN", "42").unwrap();
        notifier.notify("hello admin").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .with_status(429)
            .create_async()
            .await;

        let notifier = HttpBotNotifier::new(&server.url(), "TOKEN", "42").unwrap();
        let err = notifier.notify("hello").await.unwrap_err();
        assert!(matches!(err, NotifyError::Status(429)));
    }

    #[test]
    fn test_from_config_resolves_env() {
        std::env::set_var("CHORUS_TEST_NOTIFIER_TOKEN", "abc");
        let config = NotificationConfig {
            endpoint: "https://bots.example.org/".to_string(),
            bot_token: "env:CHORUS_TEST_NOTIFIER_TOKEN".to_string(),
            chat_id: "7".to_string(),
        };
        let notifier = HttpBotNotifier::from_config(&config).unwrap();
        assert_eq!(notifier.url, "https://bots.example.org/botabc/sendMessage");
        assert_eq!(notifier.chat_id, "7");
    }
}

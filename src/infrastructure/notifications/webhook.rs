//! `Notifier` adapter that posts kill-rule and run-lifecycle events to a
//! configured webhook, mirroring the teacher's HTTP client + retry
//! middleware pattern (`infrastructure/core/http_client_factory.rs`).

use crate::domain::ports::Notifier;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::time::Duration;
use tracing::warn;

pub struct WebhookNotifier {
    client: ClientWithMiddleware,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Self { client, url }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &str, payload: serde_json::Value) -> Result<()> {
        let body = serde_json::json!({ "event": event, "payload": payload });
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .context("failed to post webhook notification")?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(event, %status, "webhook notification rejected by receiver");
        }
        Ok(())
    }
}

/// No-op notifier used when no webhook is configured. Mirrors the teacher's
/// `infrastructure/mock.rs` pattern of a null adapter behind the same trait.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _event: &str, _payload: serde_json::Value) -> Result<()> {
        Ok(())
    }
}

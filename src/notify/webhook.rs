use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{ModNotification, ModNotifier, UserNote};

/// Posts notifications and notes as JSON to one webhook, retrying with
/// exponential backoff (500ms, 1s, 2s, ...).
#[derive(Clone)]
pub struct WebhookNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WebhookPayload<'a> {
    ModNotification(&'a ModNotification),
    UserNote(&'a UserNote),
}

impl WebhookNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    async fn post(&self, payload: &WebhookPayload<'_>) -> Result<()> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("webhook HTTP error: {e}"),
                },
                Err(e) => anyhow!("webhook request failed: {e}"),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            tracing::debug!(target: "escalate", attempt, "webhook retry: {err:#}");
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }
}

#[async_trait]
impl ModNotifier for WebhookNotifier {
    async fn send_notification(&self, msg: &ModNotification) -> Result<()> {
        self.post(&WebhookPayload::ModNotification(msg)).await
    }

    async fn add_user_note(&self, note: &UserNote) -> Result<()> {
        self.post(&WebhookPayload::UserNote(note)).await
    }
}

//! Outbound moderator notifications and user notes.

pub mod escalation;
pub mod webhook;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

pub use escalation::{should_escalate, EscalationNotifier, EscalationReport, EscalationRequest};
pub use webhook::WebhookNotifier;

/// Message to the community's moderators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModNotification {
    pub community_id: String,
    pub subject: String,
    pub body: String,
}

/// Labelled note attached to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserNote {
    pub community_id: String,
    pub user_id: String,
    pub note: String,
    pub label: String,
}

#[async_trait]
pub trait ModNotifier: Send + Sync {
    async fn send_notification(&self, msg: &ModNotification) -> Result<()>;
    async fn add_user_note(&self, note: &UserNote) -> Result<()>;
}

/// Logs instead of sending; used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl ModNotifier for LogNotifier {
    async fn send_notification(&self, msg: &ModNotification) -> Result<()> {
        tracing::info!(
            target: "escalate",
            community = %msg.community_id,
            subject = %msg.subject,
            "mod notification (log only)"
        );
        Ok(())
    }

    async fn add_user_note(&self, note: &UserNote) -> Result<()> {
        tracing::info!(
            target: "escalate",
            community = %note.community_id,
            user = %note.user_id,
            label = %note.label,
            "user note (log only)"
        );
        Ok(())
    }
}

// src/config/service.rs
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub const ENV_BIND_ADDR: &str = "STRIKE_BIND_ADDR";
pub const ENV_SETTINGS_PATH: &str = "STRIKE_SETTINGS_PATH";
pub const ENV_STATE_PATH: &str = "STRIKE_STATE_PATH";
pub const ENV_MODLOG_URL: &str = "STRIKE_MODLOG_URL";
pub const ENV_MODLOG_TOKEN: &str = "STRIKE_MODLOG_TOKEN";
pub const ENV_NOTIFY_WEBHOOK: &str = "STRIKE_NOTIFY_WEBHOOK";
pub const ENV_COMMUNITY_ID: &str = "STRIKE_COMMUNITY_ID";
pub const ENV_COMMUNITY_NAME: &str = "STRIKE_COMMUNITY_NAME";
pub const ENV_MODLOG_RETRY_MS: &str = "STRIKE_MODLOG_RETRY_MS";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "STRIKE_HTTP_TIMEOUT_SECS";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_SETTINGS_PATH: &str = "config/strike.toml";
pub const DEFAULT_STATE_PATH: &str = "state/strikes.json";
pub const DEFAULT_MODLOG_RETRY_MS: u64 = 900;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 5;

/// Process-level wiring read once at startup (after `dotenvy`).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub settings_path: PathBuf,
    pub state_path: PathBuf,
    /// Base URL of the moderation-log API; `None` disables evidence lookups.
    pub modlog_url: Option<String>,
    pub modlog_token: Option<String>,
    /// Webhook receiving moderator notifications and notes; `None` logs only.
    pub notify_webhook: Option<String>,
    pub community_id: Option<String>,
    pub community_name: Option<String>,
    pub modlog_retry_delay: Duration,
    /// Per-request timeout for mod-log queries and webhook posts.
    pub http_timeout_secs: u64,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as `from_env` but with an injectable lookup (tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_raw = non_empty(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_raw
            .parse()
            .with_context(|| format!("{ENV_BIND_ADDR} is not a socket address: {bind_raw}"))?;

        let modlog_retry_delay = match non_empty(ENV_MODLOG_RETRY_MS) {
            Some(raw) => Duration::from_millis(
                raw.parse::<u64>()
                    .with_context(|| format!("{ENV_MODLOG_RETRY_MS} must be milliseconds: {raw}"))?,
            ),
            None => Duration::from_millis(DEFAULT_MODLOG_RETRY_MS),
        };

        let http_timeout_secs = match non_empty(ENV_HTTP_TIMEOUT_SECS) {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| format!("{ENV_HTTP_TIMEOUT_SECS} must be whole seconds > 0: {raw}"))?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        Ok(Self {
            bind_addr,
            settings_path: non_empty(ENV_SETTINGS_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH)),
            state_path: non_empty(ENV_STATE_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH)),
            modlog_url: non_empty(ENV_MODLOG_URL),
            modlog_token: non_empty(ENV_MODLOG_TOKEN),
            notify_webhook: non_empty(ENV_NOTIFY_WEBHOOK),
            community_id: non_empty(ENV_COMMUNITY_ID),
            community_name: non_empty(ENV_COMMUNITY_NAME),
            modlog_retry_delay,
            http_timeout_secs,
        })
    }
}

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use super::{ModLogListing, ModLogQuery, ModLogRequest};

/// Mod-log reader over HTTP:
/// `GET {base}/r/{community}/about/log.json?limit=N[&type=ACTION]`.
#[derive(Clone)]
pub struct HttpModLog {
    base_url: String,
    bearer: Option<String>,
    client: Client,
    timeout: Duration,
}

impl HttpModLog {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bearer: None,
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn url_for(&self, req: &ModLogRequest) -> String {
        format!("{}/r/{}/about/log.json", self.base_url, req.community_name)
    }
}

#[async_trait]
impl ModLogQuery for HttpModLog {
    async fn fetch(&self, req: &ModLogRequest) -> Result<ModLogListing> {
        let mut query: Vec<(&str, String)> = vec![("limit", req.limit.to_string())];
        if let Some(t) = &req.action_type {
            query.push(("type", t.clone()));
        }

        let mut rb = self
            .client
            .get(self.url_for(req))
            .timeout(self.timeout)
            .query(&query);
        if let Some(token) = &self.bearer {
            rb = rb.bearer_auth(token);
        }

        let body: serde_json::Value = rb
            .send()
            .await
            .context("mod log request")?
            .error_for_status()
            .context("mod log non-2xx")?
            .json()
            .await
            .context("mod log body")?;

        Ok(ModLogListing::from_value(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_has_no_double_slash() {
        let c = HttpModLog::new("https://oauth.example.test/".into());
        let req = ModLogRequest {
            community_name: "rustjerk".into(),
            action_type: None,
            limit: 250,
        };
        assert_eq!(
            c.url_for(&req),
            "https://oauth.example.test/r/rustjerk/about/log.json"
        );
    }

    #[test]
    fn timeout_and_blank_bearer() {
        let c = HttpModLog::new("https://oauth.example.test".into())
            .with_timeout(12)
            .with_bearer(Some(String::new()));
        assert_eq!(c.timeout, Duration::from_secs(12));
        assert!(c.bearer.is_none());
    }
}

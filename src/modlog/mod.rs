//! Moderation-log evidence lookup.
//!
//! A removal only counts when its stated reason can be read back from the
//! mod log. The log API is eventually consistent and its response shape
//! varies by query mode, so:
//! - listings are decoded leniently (bare array, `children`, `data.children`,
//!   entries flat or wrapped in `{kind, data}`);
//! - target ids are compared loosely (with and without the `t1_`/`t3_` prefix,
//!   substring either way);
//! - the lookup walks a fixed ladder: filtered, unfiltered, pause, filtered,
//!   unfiltered. Query errors count as "no entries".

pub mod http;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::debug::DebugLog;
use crate::event::REMOVAL_REASON_ACTION;

pub const PAGE_LIMIT: u32 = 250;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(900);

/* ----------------------------
Query boundary
---------------------------- */

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModLogRequest {
    pub community_name: String,
    /// Server-side action filter; `None` asks for everything.
    pub action_type: Option<String>,
    pub limit: u32,
}

#[async_trait]
pub trait ModLogQuery: Send + Sync {
    async fn fetch(&self, req: &ModLogRequest) -> Result<ModLogListing>;
}

/// The shapes a listing has been seen in.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ModLogListing {
    Items(Vec<Value>),
    Children { children: Vec<Value> },
    Data { data: ListingData },
    Other(Value),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingData {
    #[serde(default)]
    pub children: Vec<Value>,
}

impl ModLogListing {
    pub fn from_value(v: Value) -> Self {
        serde_json::from_value(v.clone()).unwrap_or(ModLogListing::Other(v))
    }

    /// Decoded entries; anything that does not look like an entry is skipped.
    pub fn into_entries(self) -> Vec<ModLogEntry> {
        let raw = match self {
            ModLogListing::Items(v) => v,
            ModLogListing::Children { children } => children,
            ModLogListing::Data { data } => data.children,
            ModLogListing::Other(_) => Vec::new(),
        };
        raw.into_iter().filter_map(ModLogEntry::from_raw).collect()
    }
}

/* ----------------------------
Entries
---------------------------- */

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogTarget {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub permalink: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModLogEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub action: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub details: Option<String>,
    #[serde(rename = "moderatorName", default, deserialize_with = "lenient_string")]
    pub moderator_name: Option<String>,
    #[serde(rename = "mod", default, deserialize_with = "lenient_string")]
    pub moderator: Option<String>,
    #[serde(default, deserialize_with = "lenient_target")]
    pub target: Option<LogTarget>,
    #[serde(rename = "targetId", default, deserialize_with = "lenient_string")]
    pub target_id: Option<String>,
    #[serde(rename = "targetFullname", default, deserialize_with = "lenient_string")]
    pub target_fullname: Option<String>,
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_target<'de, D: Deserializer<'de>>(d: D) -> Result<Option<LogTarget>, D::Error> {
    Ok(Option::<Value>::deserialize(d)?
        .filter(Value::is_object)
        .and_then(|v| serde_json::from_value(v).ok()))
}

impl ModLogEntry {
    /// Decode one raw listing element, unwrapping `{kind, data: {...}}`.
    pub fn from_raw(v: Value) -> Option<Self> {
        let Value::Object(mut map) = v else {
            return None;
        };
        if !map.contains_key("action") && !map.contains_key("type") {
            if let Some(Value::Object(inner)) = map.remove("data") {
                map = inner;
            }
        }
        serde_json::from_value(Value::Object(map)).ok()
    }

    /// `action`, falling back to `type`, lower-cased.
    pub fn action_lower(&self) -> String {
        self.action
            .as_deref()
            .or(self.kind.as_deref())
            .unwrap_or_default()
            .to_lowercase()
    }

    pub fn target_id(&self) -> &str {
        self.target
            .as_ref()
            .and_then(|t| t.id.as_deref())
            .or(self.target_id.as_deref())
            .or(self.target_fullname.as_deref())
            .unwrap_or_default()
    }

    fn moderator(&self) -> &str {
        self.moderator_name
            .as_deref()
            .or(self.moderator.as_deref())
            .unwrap_or_default()
    }

    /// `key=value` pairs joined by ` | `, empty values omitted.
    pub fn flatten(&self) -> String {
        let t = self.target.clone().unwrap_or_default();
        let action = self.action_lower();
        let fields: [(&str, &str); 8] = [
            ("action", action.as_str()),
            ("target", self.target_id()),
            ("moderator", self.moderator()),
            ("description", self.description.as_deref().unwrap_or_default()),
            ("details", self.details.as_deref().unwrap_or_default()),
            ("title", t.title.as_deref().unwrap_or_default()),
            ("body", t.body.as_deref().unwrap_or_default()),
            ("permalink", t.permalink.as_deref().unwrap_or_default()),
        ];
        fields
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim()
            .to_string()
    }
}

/* ----------------------------
Target matching
---------------------------- */

pub fn strip_type_prefix(id: &str) -> &str {
    id.strip_prefix("t1_")
        .or_else(|| id.strip_prefix("t3_"))
        .unwrap_or(id)
}

/// Loose id comparison: exact, prefix-stripped, or substring either way.
/// Short or shared-prefix ids can produce false positives; kept as-is.
pub fn target_matches(log_target_id: &str, target_id: &str) -> bool {
    let short = strip_type_prefix(target_id);
    if log_target_id == target_id || log_target_id == short {
        return true;
    }
    if log_target_id.is_empty() {
        return false;
    }
    [target_id, short].iter().filter(|f| !f.is_empty()).any(|form| {
        log_target_id.contains(form) || form.contains(log_target_id)
    })
}

/* ----------------------------
Resolver
---------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryMode {
    Filtered,
    Unfiltered,
}

/// One pass tries these in order; the ladder runs two passes with one pause
/// between them.
const PASS: [QueryMode; 2] = [QueryMode::Filtered, QueryMode::Unfiltered];
const PASSES: usize = 2;

pub struct EvidenceResolver {
    query: Arc<dyn ModLogQuery>,
    retry_delay: Duration,
}

impl EvidenceResolver {
    pub fn new(query: Arc<dyn ModLogQuery>) -> Self {
        Self {
            query,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Evidence text for `target_id`, or `""` if nothing was found.
    pub async fn resolve(&self, community_name: &str, target_id: &str, dbg: &DebugLog) -> String {
        for pass in 0..PASSES {
            if pass > 0 {
                tokio::time::sleep(self.retry_delay).await;
            }
            for mode in PASS {
                let entries = self.fetch(community_name, mode, dbg).await;
                if let Some(text) = find_evidence(&entries, target_id, dbg) {
                    return text;
                }
            }
        }
        String::new()
    }

    async fn fetch(&self, community_name: &str, mode: QueryMode, dbg: &DebugLog) -> Vec<ModLogEntry> {
        let filtered = mode == QueryMode::Filtered;
        let req = ModLogRequest {
            community_name: community_name.to_string(),
            action_type: filtered.then(|| REMOVAL_REASON_ACTION.to_string()),
            limit: PAGE_LIMIT,
        };
        match self.query.fetch(&req).await {
            Ok(listing) => {
                let entries = listing.into_entries();
                dbg.step_with(
                    "[MODLOG] query returned",
                    &serde_json::json!({ "useTypeFilter": filtered, "length": entries.len() }),
                );
                entries
            }
            Err(e) => {
                counter!("strike_modlog_query_errors_total").increment(1);
                tracing::warn!(target: "modlog", filtered, "mod log query failed: {e:#}");
                dbg.step_with(
                    "[MODLOG] ERROR query",
                    &serde_json::json!({ "useTypeFilter": filtered, "error": format!("{e:#}") }),
                );
                Vec::new()
            }
        }
    }
}

/// First removal-reason entry for `target_id`, flattened.
pub fn find_evidence(entries: &[ModLogEntry], target_id: &str, dbg: &DebugLog) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    let hit = entries.iter().find(|it| {
        it.action_lower() == REMOVAL_REASON_ACTION && target_matches(it.target_id(), target_id)
    });
    match hit {
        Some(it) => {
            dbg.step_with("[MODLOG] matched addremovalreason entry", it);
            Some(it.flatten())
        }
        None => {
            dbg.step_with(
                &format!("[MODLOG] no addremovalreason match for target {target_id}. Sample entries:"),
                &entries.iter().take(3).collect::<Vec<_>>(),
            );
            None
        }
    }
}

/// Always empty; used when no mod-log backend is configured.
pub struct NoModLog;

#[async_trait]
impl ModLogQuery for NoModLog {
    async fn fetch(&self, _req: &ModLogRequest) -> Result<ModLogListing> {
        Ok(ModLogListing::Items(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn listing_shapes_all_decode() {
        let entry = json!({"type": "addremovalreason", "target": {"id": "t3_a"}});
        let shapes = [
            json!([entry.clone()]),
            json!({"children": [entry.clone()]}),
            json!({"data": {"children": [{"kind": "modaction", "data": entry.clone()}]}}),
        ];
        for s in shapes {
            let entries = ModLogListing::from_value(s).into_entries();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].target_id(), "t3_a");
        }
        assert!(ModLogListing::from_value(json!({"weird": true}))
            .into_entries()
            .is_empty());
    }

    #[test]
    fn odd_entries_are_skipped_not_fatal() {
        let entries = ModLogListing::from_value(json!([
            "string",
            42,
            {"action": "addremovalreason", "targetId": 123, "target": "not-an-object"}
        ]))
        .into_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].target_id(), "123");
    }

    #[test]
    fn flatten_omits_empty_fields() {
        let e = ModLogEntry {
            kind: Some("AddRemovalReason".into()),
            moderator_name: Some("mod1".into()),
            description: Some("Rule 3 #strike".into()),
            details: Some(String::new()),
            target: Some(LogTarget {
                id: Some("t3_abc".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            e.flatten(),
            "action=addremovalreason | target=t3_abc | moderator=mod1 | description=Rule 3 #strike"
        );
    }

    #[test]
    fn target_matching_tolerates_namespace_drift() {
        assert!(target_matches("t3_abc", "t3_abc"));
        assert!(target_matches("abc", "t3_abc"));
        assert!(target_matches("t3_abc_extra", "t3_abc"));
        assert!(target_matches("xyz/abc", "t1_abc"));
        // Containment the other way round.
        assert!(target_matches("ab", "t3_abc"));
        assert!(!target_matches("", "t3_abc"));
        assert!(!target_matches("t3_zzz", "t3_abc"));
    }

    #[test]
    fn find_evidence_requires_action_and_target() {
        let dbg = DebugLog::new(false);
        let entries = vec![
            ModLogEntry {
                action: Some("removelink".into()),
                target_id: Some("t3_abc".into()),
                ..Default::default()
            },
            ModLogEntry {
                action: Some("addremovalreason".into()),
                target_id: Some("t3_other".into()),
                ..Default::default()
            },
        ];
        assert!(find_evidence(&entries, "t3_abc", &dbg).is_none());
        assert!(find_evidence(&[], "t3_abc", &dbg).is_none());
    }
}

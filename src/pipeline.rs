//! # Strike Decision Pipeline
//! One pass per incoming mod action:
//!
//! 1) enabled  2) automation actor  3) target present  4) scope
//! 5) action is `addremovalreason`  6) dedup  7) author present
//! 8) evidence (required unless configured otherwise)  9) tag match
//! 10) load → prune → append → save  11) escalation
//!
//! Every early stop is a normal outcome, logged and counted, never an error:
//! most mod actions are simply irrelevant.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use tracing::Instrument;

use crate::config::{load_config, Scope, SettingsStore, StrikeConfig};
use crate::debug::DebugLog;
use crate::dedup::DedupGuard;
use crate::event::{ModActionEvent, TargetKind};
use crate::kv::KvStore;
use crate::modlog::{EvidenceResolver, ModLogQuery};
use crate::notify::escalation::EscalationReport;
use crate::notify::{EscalationNotifier, EscalationRequest, ModNotifier};
use crate::strikes::{StrikeRecord, StrikeStore};
use crate::tags::match_tags;

pub const UNKNOWN_COMMUNITY_NAME: &str = "unknown-subreddit";
pub const UNKNOWN_COMMUNITY_ID: &str = "unknown";

/// Community the event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventContext {
    pub community_id: String,
    pub community_name: String,
}

impl EventContext {
    pub fn new(community_id: impl Into<String>, community_name: impl Into<String>) -> Self {
        Self {
            community_id: community_id.into(),
            community_name: community_name.into(),
        }
    }

    /// Community from the event itself, else the fallbacks, else placeholders.
    pub fn from_event(
        ev: &ModActionEvent,
        fallback_id: Option<&str>,
        fallback_name: Option<&str>,
    ) -> Self {
        let sr = ev.subreddit.as_ref();
        let pick = |from_event: Option<&String>, fallback: Option<&str>, last: &str| {
            from_event
                .map(String::as_str)
                .filter(|s| !s.is_empty())
                .or(fallback.filter(|s| !s.is_empty()))
                .unwrap_or(last)
                .to_string()
        };
        Self {
            community_id: pick(
                sr.and_then(|s| s.id.as_ref()),
                fallback_id,
                UNKNOWN_COMMUNITY_ID,
            ),
            community_name: pick(
                sr.and_then(|s| s.name.as_ref()),
                fallback_name,
                UNKNOWN_COMMUNITY_NAME,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    AutomationActor,
    NoTarget,
    OutOfScope,
    NotRemovalReason,
    Deduplicated,
    MissingAuthor,
    NoEvidence,
    NoTagMatch,
    StoreUnavailable,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Disabled => "disabled",
            SkipReason::AutomationActor => "automation_actor",
            SkipReason::NoTarget => "no_target",
            SkipReason::OutOfScope => "out_of_scope",
            SkipReason::NotRemovalReason => "not_removal_reason",
            SkipReason::Deduplicated => "deduplicated",
            SkipReason::MissingAuthor => "missing_author",
            SkipReason::NoEvidence => "no_evidence",
            SkipReason::NoTagMatch => "no_tag_match",
            SkipReason::StoreUnavailable => "store_unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Skipped {
        reason: SkipReason,
    },
    Counted {
        count: usize,
        matched_tags: Vec<String>,
        escalated: bool,
        notification_sent: bool,
        note_added: bool,
    },
}

impl Outcome {
    pub fn skipped_reason(&self) -> Option<SkipReason> {
        match self {
            Outcome::Skipped { reason } => Some(*reason),
            Outcome::Counted { .. } => None,
        }
    }
}

fn in_scope(scope: Scope, kind: TargetKind) -> bool {
    match scope {
        Scope::Both => true,
        Scope::Posts => kind == TargetKind::Post,
        Scope::Comments => kind == TargetKind::Comment,
    }
}

pub struct StrikePipeline {
    settings: Arc<dyn SettingsStore>,
    dedup: DedupGuard,
    resolver: EvidenceResolver,
    strikes: StrikeStore,
    escalation: EscalationNotifier,
}

impl StrikePipeline {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        kv: Arc<dyn KvStore>,
        modlog: Arc<dyn ModLogQuery>,
        notifier: Arc<dyn ModNotifier>,
    ) -> Self {
        Self {
            settings,
            dedup: DedupGuard::new(kv.clone()),
            resolver: EvidenceResolver::new(modlog),
            strikes: StrikeStore::new(kv),
            escalation: EscalationNotifier::new(notifier),
        }
    }

    /// Pause between the two mod-log lookup passes.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.resolver = self.resolver.with_retry_delay(delay);
        self
    }

    pub fn strikes(&self) -> &StrikeStore {
        &self.strikes
    }

    /// Current settings snapshot (same read the pipeline does per event).
    pub async fn config(&self) -> StrikeConfig {
        load_config(self.settings.as_ref()).await
    }

    pub async fn handle(&self, ctx: &EventContext, ev: &ModActionEvent) -> Outcome {
        self.handle_at(ctx, ev, Utc::now().timestamp_millis()).await
    }

    /// `handle` with an explicit clock (epoch ms).
    pub async fn handle_at(&self, ctx: &EventContext, ev: &ModActionEvent, now_ms: i64) -> Outcome {
        counter!("strike_events_total").increment(1);
        let span = tracing::info_span!("mod_action", community = %ctx.community_name);
        let outcome = self.run(ctx, ev, now_ms).instrument(span).await;
        match &outcome {
            Outcome::Skipped { reason } => {
                counter!("strike_skipped_total", "reason" => reason.as_str()).increment(1);
            }
            Outcome::Counted { .. } => counter!("strike_counted_total").increment(1),
        }
        outcome
    }

    async fn run(&self, ctx: &EventContext, ev: &ModActionEvent, now_ms: i64) -> Outcome {
        let cfg = load_config(self.settings.as_ref()).await;
        let dbg = DebugLog::new(cfg.debug);
        let skip = |reason: SkipReason, msg: &str| {
            dbg.step(&format!("[SKIP] {msg}"));
            tracing::debug!(target: "strike", reason = reason.as_str(), "skipped");
            Outcome::Skipped { reason }
        };

        dbg.step("========================");
        dbg.step(&format!("[EVENT] ModAction at {}", Utc::now().to_rfc3339()));
        dbg.step_with("[EVENT] raw", ev);

        // 1) master switch
        if !cfg.enabled {
            return skip(SkipReason::Disabled, "disabled");
        }

        // 2) automation actor
        if !cfg.include_automod && ev.is_automation_actor() {
            return skip(
                SkipReason::AutomationActor,
                "automod removal and include automod=OFF",
            );
        }

        // 3) target
        let Some(target) = ev.target() else {
            return skip(SkipReason::NoTarget, "no targetId");
        };
        let target_id = target.id().to_string();
        let kind = target.kind();

        // 4) scope
        if !in_scope(cfg.scope, kind) {
            return skip(
                SkipReason::OutOfScope,
                &format!("apply to={:?}, target {target_id} is a {}", cfg.scope, kind.as_str()),
            );
        }

        // 5) action type
        if !ev.is_removal_reason() {
            dbg.step_with(
                "[INFO] not addremovalreason (no strike count on this action)",
                &serde_json::json!({ "action": ev.action_lower(), "targetId": target_id }),
            );
            return Outcome::Skipped {
                reason: SkipReason::NotRemovalReason,
            };
        }

        // 6) dedup
        if self
            .dedup
            .should_suppress(&ctx.community_id, &target_id, cfg.dedupe_minutes, now_ms)
            .await
        {
            return skip(SkipReason::Deduplicated, &format!("dedupe hit {target_id}"));
        }

        // 7) author
        let Some(author) = ev.author() else {
            dbg.step_with(
                "[SKIP] missing targetUser id/name on addremovalreason",
                &ev.target_user,
            );
            return Outcome::Skipped {
                reason: SkipReason::MissingAuthor,
            };
        };

        // 8) evidence
        let evidence = self
            .resolver
            .resolve(&ctx.community_name, &target_id, &dbg)
            .await;
        if cfg.require_removal_reason && evidence.is_empty() {
            return skip(
                SkipReason::NoEvidence,
                "require removal reason=ON but could not resolve modlog text",
            );
        }
        dbg.step_with("[INFO] modActionText", &serde_json::json!({ "modActionText": evidence }));

        // 9) classification
        let matched = match_tags(&evidence, &cfg.strike_tags);
        if matched.is_empty() {
            dbg.step_with(
                "[SKIP] no strike tags matched",
                &serde_json::json!({ "strikeTags": cfg.strike_tags }),
            );
            return Outcome::Skipped {
                reason: SkipReason::NoTagMatch,
            };
        }
        dbg.step_with("[MATCH] tags", &serde_json::json!({ "matchedTags": matched }));

        // 10) accounting
        let record = StrikeRecord {
            t: now_ms,
            kind,
            target_id: target_id.clone(),
        };
        let log = match self
            .strikes
            .record_strike(
                &ctx.community_id,
                &author.id,
                record,
                cfg.window_days,
                now_ms,
                &dbg,
            )
            .await
        {
            Ok(log) => log,
            Err(e) => {
                tracing::warn!(target: "store", user = %author.name, "strike not recorded: {e:#}");
                return skip(SkipReason::StoreUnavailable, "strike store unavailable");
            }
        };

        // 11) escalation
        let req = EscalationRequest {
            community_id: ctx.community_id.clone(),
            community_name: ctx.community_name.clone(),
            user_id: author.id.clone(),
            username: author.name.clone(),
            count: log.len(),
            kind,
            target_id: target_id.clone(),
            matched_tags: matched.clone(),
            evidence,
        };
        let EscalationReport {
            triggered,
            notification_sent,
            note_added,
        } = self.escalation.maybe_escalate(&req, &cfg, &dbg).await;

        dbg.step_with(
            "[DONE] processed addremovalreason",
            &serde_json::json!({ "targetId": target_id, "authorName": author.name }),
        );
        tracing::info!(
            target: "strike",
            user = %author.name,
            count = log.len(),
            threshold = cfg.threshold,
            escalated = triggered,
            "strike recorded"
        );

        Outcome::Counted {
            count: log.len(),
            matched_tags: matched,
            escalated: triggered,
            notification_sent,
            note_added,
        }
    }
}

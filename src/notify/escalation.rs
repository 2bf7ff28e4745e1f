//! Threshold policy and the two escalation side effects.
//!
//! Policy, for `count >= threshold`:
//! - repeat on: every qualifying strike escalates;
//! - repeat off: only the strike that lands exactly on the threshold does.
//!
//! The notification and the note are independent: either may fail without
//! stopping the other, and nothing already done is rolled back.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;

use super::{ModNotification, ModNotifier, UserNote};
use crate::config::StrikeConfig;
use crate::debug::DebugLog;
use crate::event::TargetKind;
use crate::template::render;

pub fn should_escalate(count: usize, threshold: u32, repeat_notify: bool) -> bool {
    let threshold = threshold as usize;
    count >= threshold && (repeat_notify || count == threshold)
}

/// Everything the templates can reference about the strike just counted.
#[derive(Debug, Clone, Serialize)]
pub struct EscalationRequest {
    pub community_id: String,
    pub community_name: String,
    pub user_id: String,
    pub username: String,
    pub count: usize,
    pub kind: TargetKind,
    pub target_id: String,
    pub matched_tags: Vec<String>,
    pub evidence: String,
}

/// What actually happened, for logs and callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EscalationReport {
    pub triggered: bool,
    pub notification_sent: bool,
    pub note_added: bool,
}

impl EscalationRequest {
    /// Template variables: `username, count, threshold, windowDays, kind,
    /// targetId, subreddit, matchedTagText, modActionText`.
    pub fn vars(&self, cfg: &StrikeConfig) -> HashMap<String, String> {
        let matched = if self.matched_tags.is_empty() {
            "(none)".to_string()
        } else {
            self.matched_tags.join(", ")
        };
        let evidence = if self.evidence.is_empty() {
            "(empty)".to_string()
        } else {
            self.evidence.replace('\n', " ")
        };
        HashMap::from([
            ("username".to_string(), self.username.clone()),
            ("count".to_string(), self.count.to_string()),
            ("threshold".to_string(), cfg.threshold.to_string()),
            ("windowDays".to_string(), cfg.window_days.to_string()),
            ("kind".to_string(), self.kind.as_str().to_string()),
            ("targetId".to_string(), self.target_id.clone()),
            ("subreddit".to_string(), self.community_name.clone()),
            ("matchedTagText".to_string(), matched),
            ("modActionText".to_string(), evidence),
        ])
    }
}

pub struct EscalationNotifier {
    notifier: Arc<dyn ModNotifier>,
}

impl EscalationNotifier {
    pub fn new(notifier: Arc<dyn ModNotifier>) -> Self {
        Self { notifier }
    }

    pub async fn maybe_escalate(
        &self,
        req: &EscalationRequest,
        cfg: &StrikeConfig,
        dbg: &DebugLog,
    ) -> EscalationReport {
        let mut report = EscalationReport::default();

        if req.count < cfg.threshold as usize {
            dbg.step(&format!("[ESCALATE] no: {} < {}", req.count, cfg.threshold));
            return report;
        }
        if !should_escalate(req.count, cfg.threshold, cfg.repeat_notify) {
            dbg.step(&format!(
                "[ESCALATE] no: repeat notify OFF and count={} not equal threshold",
                req.count
            ));
            return report;
        }
        report.triggered = true;
        counter!("strike_escalations_total").increment(1);

        let vars = req.vars(cfg);
        let msg = ModNotification {
            community_id: req.community_id.clone(),
            subject: render(&cfg.modmail_subject, &vars),
            body: render(&cfg.modmail_body_template, &vars),
        };

        dbg.step_with("[MODMAIL] sending", &serde_json::json!({ "subject": msg.subject }));
        match self.notifier.send_notification(&msg).await {
            Ok(()) => {
                report.notification_sent = true;
                dbg.step("[MODMAIL] sent OK");
            }
            Err(e) => {
                counter!("strike_side_effect_errors_total", "effect" => "notification").increment(1);
                tracing::warn!(target: "escalate", user = %req.username, "mod notification failed: {e:#}");
                dbg.step_with("[MODMAIL] ERROR", &serde_json::json!({ "error": format!("{e:#}") }));
            }
        }

        if cfg.add_mod_note {
            let note = UserNote {
                community_id: req.community_id.clone(),
                user_id: req.user_id.clone(),
                note: render(&cfg.mod_note_template, &vars),
                label: cfg.mod_note_label.clone(),
            };
            dbg.step_with("[MODNOTE] adding", &note);
            match self.notifier.add_user_note(&note).await {
                Ok(()) => {
                    report.note_added = true;
                    dbg.step("[MODNOTE] added OK");
                }
                Err(e) => {
                    counter!("strike_side_effect_errors_total", "effect" => "note").increment(1);
                    tracing::warn!(target: "escalate", user = %req.username, "user note failed: {e:#}");
                    dbg.step_with("[MODNOTE] ERROR", &serde_json::json!({ "error": format!("{e:#}") }));
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_once_policy() {
        let fired: Vec<bool> = (1..=4).map(|c| should_escalate(c, 3, false)).collect();
        assert_eq!(fired, vec![false, false, true, false]);
    }

    #[test]
    fn repeat_policy() {
        let fired: Vec<bool> = (1..=5).map(|c| should_escalate(c, 3, true)).collect();
        assert_eq!(fired, vec![false, false, true, true, true]);
    }

    #[test]
    fn vars_fill_placeholders_and_flatten_evidence() {
        let req = EscalationRequest {
            community_id: "t5_sr".into(),
            community_name: "rust".into(),
            user_id: "u1".into(),
            username: "bob".into(),
            count: 3,
            kind: TargetKind::Post,
            target_id: "t3_abc".into(),
            matched_tags: vec![],
            evidence: "line one\nline two".into(),
        };
        let vars = req.vars(&StrikeConfig::default());
        assert_eq!(vars["matchedTagText"], "(none)");
        assert_eq!(vars["modActionText"], "line one line two");
        assert_eq!(vars["windowDays"], "14");
        assert_eq!(vars["kind"], "post");
        assert_eq!(vars["subreddit"], "rust");
    }
}

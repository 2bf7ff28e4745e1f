// tests/evidence_resolver.rs
//
// Retry ladder behaviour of the mod-log evidence lookup.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::{reason_entry, ScriptedModLog};
use strike_tracker::debug::DebugLog;
use strike_tracker::modlog::{EvidenceResolver, PAGE_LIMIT};

fn resolver(log: &Arc<ScriptedModLog>) -> EvidenceResolver {
    EvidenceResolver::new(log.clone()).with_retry_delay(Duration::ZERO)
}

fn filtered() -> Option<String> {
    Some("addremovalreason".to_string())
}

#[tokio::test]
async fn ladder_alternates_filtered_and_unfiltered_over_two_passes() {
    let log = Arc::new(ScriptedModLog::default());
    let text = resolver(&log)
        .resolve("test", "t3_abc", &DebugLog::new(false))
        .await;

    assert_eq!(text, "");
    assert_eq!(log.filters(), vec![filtered(), None, filtered(), None]);
    let reqs = log.requests.lock();
    assert!(reqs.iter().all(|r| r.community_name == "test"));
    assert!(reqs.iter().all(|r| r.limit == PAGE_LIMIT));
}

#[tokio::test]
async fn stops_at_first_match() {
    let log = Arc::new(ScriptedModLog::new(vec![
        Ok(json!([])),
        Ok(json!([reason_entry("t3_abc", "#strike")])),
    ]));
    let text = resolver(&log)
        .resolve("test", "t3_abc", &DebugLog::new(false))
        .await;

    assert!(text.contains("description=#strike"));
    assert_eq!(log.calls(), 2);
}

#[tokio::test]
async fn errors_count_as_empty_and_later_pass_can_succeed() {
    let log = Arc::new(ScriptedModLog::new(vec![
        Err("boom".into()),
        Err("boom".into()),
        Ok(json!({ "data": { "children": [
            { "kind": "modaction", "data": reason_entry("abc", "late #strike") }
        ] } })),
    ]));
    let text = resolver(&log)
        .resolve("test", "t3_abc", &DebugLog::new(false))
        .await;

    assert!(text.contains("late #strike"), "got {text:?}");
    assert_eq!(log.calls(), 3);
}

#[tokio::test]
async fn entries_for_other_targets_or_actions_are_ignored() {
    let mut other_action = reason_entry("t3_abc", "#strike");
    other_action["type"] = json!("removelink");
    let log = Arc::new(ScriptedModLog::always(json!([
        reason_entry("t3_zzz", "#strike"),
        other_action,
    ])));
    let text = resolver(&log)
        .resolve("test", "t3_abc", &DebugLog::new(false))
        .await;

    assert_eq!(text, "");
    assert_eq!(log.calls(), 4);
}

#[tokio::test]
async fn retry_pause_is_applied_between_passes() {
    let log = Arc::new(ScriptedModLog::default());
    let started = tokio::time::Instant::now();
    EvidenceResolver::new(log.clone())
        .with_retry_delay(Duration::from_millis(50))
        .resolve("test", "t3_abc", &DebugLog::new(false))
        .await;

    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(log.calls(), 4);
}

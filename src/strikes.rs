//! # Strike Store
//! Per-(community, user) strike log over the key-value boundary.
//!
//! The log is one JSON array under one key. Reading never fails from the
//! caller's point of view: absent or corrupt data is an empty log. Pruning
//! to the rolling window happens on every accounting pass, before the new
//! record is appended.
//!
//! The KV store has no transactions, so `load → prune → append → save` is
//! guarded here by an in-process async mutex per (community, user). Separate
//! processes sharing one store can still race and lose an append.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::debug::DebugLog;
use crate::event::TargetKind;
use crate::kv::{strikes_key, KvStore};

pub const DAY_MS: i64 = 86_400_000;

/// One counted violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrikeRecord {
    /// Epoch milliseconds.
    pub t: i64,
    pub kind: TargetKind,
    pub target_id: String,
}

/// Strike records in append (nondecreasing time) order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrikeLog {
    pub records: Vec<StrikeRecord>,
}

impl StrikeLog {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Lenient decode: a non-array value is an empty log. Any element with a
    /// numeric `t` counts; a missing or unknown `kind` is taken from the
    /// target id prefix, a missing `targetId` is empty.
    pub fn decode(raw: &str) -> Self {
        let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) else {
            return Self::default();
        };
        let records = items.iter().filter_map(decode_record).collect();
        Self { records }
    }
}

fn decode_record(v: &Value) -> Option<StrikeRecord> {
    let t = v.get("t")?;
    let t = t
        .as_i64()
        .or_else(|| t.as_f64().filter(|x| x.is_finite()).map(|x| x.trunc() as i64))?;
    let target_id = v
        .get("targetId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let kind = v
        .get("kind")
        .cloned()
        .and_then(|k| serde_json::from_value::<TargetKind>(k).ok())
        .unwrap_or_else(|| TargetKind::from_id(&target_id));
    Some(StrikeRecord { t, kind, target_id })
}

/// Records with `t >= now - window_days`, order preserved.
pub fn prune(log: StrikeLog, window_days: u32, now_ms: i64) -> StrikeLog {
    let cutoff = now_ms.saturating_sub(i64::from(window_days).saturating_mul(DAY_MS));
    StrikeLog {
        records: log.records.into_iter().filter(|r| r.t >= cutoff).collect(),
    }
}

pub fn append(mut log: StrikeLog, record: StrikeRecord) -> StrikeLog {
    log.records.push(record);
    log
}

/// Async mutex per key, created on first use and dropped once nobody holds
/// or waits on it.
#[derive(Debug, Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        match self.locks.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.map()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Give back a handle from `lock_for`. Waiters hold their own clone, so a
    /// count of one under the map lock means the entry is idle.
    fn release(&self, key: &str, handle: Arc<tokio::sync::Mutex<()>>) {
        drop(handle);
        let mut g = self.map();
        if g.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            g.remove(key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map().len()
    }
}

pub struct StrikeStore {
    kv: Arc<dyn KvStore>,
    locks: KeyedLocks,
}

impl StrikeStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            locks: KeyedLocks::default(),
        }
    }

    /// Read the stored log. Backend errors are logged and read as empty.
    pub async fn load(&self, community_id: &str, user_id: &str) -> StrikeLog {
        match self.try_load(community_id, user_id).await {
            Ok(log) => log,
            Err(e) => {
                tracing::warn!(target: "store", user_id, "strike log read failed: {e:#}");
                StrikeLog::default()
            }
        }
    }

    async fn try_load(&self, community_id: &str, user_id: &str) -> Result<StrikeLog> {
        let key = strikes_key(community_id, user_id);
        let raw = self.kv.get(&key).await.context("kv get strike log")?;
        Ok(raw.as_deref().map(StrikeLog::decode).unwrap_or_default())
    }

    /// Overwrite the stored log (last writer wins).
    pub async fn save(&self, community_id: &str, user_id: &str, log: &StrikeLog) -> Result<()> {
        let key = strikes_key(community_id, user_id);
        let json = serde_json::to_string(log).context("serialize strike log")?;
        self.kv.set(&key, json).await.context("kv set strike log")
    }

    /// Load, prune to the window, append `record`, save. Returns the saved log.
    ///
    /// A failed read aborts instead of falling back to empty, so a backend
    /// blip cannot wipe the user's history on the following save.
    pub async fn record_strike(
        &self,
        community_id: &str,
        user_id: &str,
        record: StrikeRecord,
        window_days: u32,
        now_ms: i64,
        dbg: &DebugLog,
    ) -> Result<StrikeLog> {
        let key = strikes_key(community_id, user_id);
        let lock = self.locks.lock_for(&key);
        let res = {
            let _guard = lock.lock().await;
            self.record_strike_locked(community_id, user_id, record, window_days, now_ms, dbg)
                .await
        };
        self.locks.release(&key, lock);
        res
    }

    async fn record_strike_locked(
        &self,
        community_id: &str,
        user_id: &str,
        record: StrikeRecord,
        window_days: u32,
        now_ms: i64,
        dbg: &DebugLog,
    ) -> Result<StrikeLog> {
        let existing = self.try_load(community_id, user_id).await?;
        dbg.step_with(
            "[STORE] existing strikes",
            &serde_json::json!({ "count": existing.len() }),
        );

        let before = existing.len();
        let pruned = prune(existing, window_days, now_ms);
        if pruned.len() != before {
            dbg.step_with(
                "[STORE] pruned",
                &serde_json::json!({ "before": before, "after": pruned.len() }),
            );
        }

        let updated = append(pruned, record.clone());
        self.save(community_id, user_id, &updated).await?;
        dbg.step_with(
            "[STORE] saved",
            &serde_json::json!({ "newCount": updated.len(), "added": record }),
        );
        Ok(updated)
    }
}

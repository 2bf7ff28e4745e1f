// src/dedup.rs
use std::sync::Arc;

use crate::kv::{last_counted_key, KvStore};

const MINUTE_MS: i64 = 60_000;

/// Cool-down gate keyed by (community, target).
/// - `dedupe_minutes <= 0` disables it entirely (no reads, no writes).
/// - A marker younger than the window suppresses and is NOT refreshed, so a
///   burst of duplicates cannot keep extending the window.
/// - Otherwise the marker is set to `now` and processing proceeds.
///
/// Check-then-set is not atomic; two simultaneous duplicates may both pass.
pub struct DedupGuard {
    kv: Arc<dyn KvStore>,
}

impl DedupGuard {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn should_suppress(
        &self,
        community_id: &str,
        target_id: &str,
        dedupe_minutes: i64,
        now_ms: i64,
    ) -> bool {
        if dedupe_minutes <= 0 {
            return false;
        }
        let key = last_counted_key(community_id, target_id);

        let last = match self.kv.get(&key).await {
            Ok(raw) => raw.and_then(|s| s.trim().parse::<i64>().ok()).unwrap_or(0),
            Err(e) => {
                tracing::warn!(target: "store", target_id, "dedup marker read failed: {e:#}");
                0
            }
        };

        let window_ms = dedupe_minutes.saturating_mul(MINUTE_MS);
        if last != 0 && now_ms.saturating_sub(last) < window_ms {
            return true;
        }

        if let Err(e) = self.kv.set(&key, now_ms.to_string()).await {
            tracing::warn!(target: "store", target_id, "dedup marker write failed: {e:#}");
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;

    #[tokio::test]
    async fn first_passes_repeat_suppressed_then_expires() {
        let kv = Arc::new(MemoryKv::new());
        let guard = DedupGuard::new(kv.clone());
        let t0 = 1_700_000_000_000;

        assert!(!guard.should_suppress("sr", "t3_abc", 10, t0).await);
        assert_eq!(
            kv.get(&last_counted_key("sr", "t3_abc")).await.unwrap(),
            Some(t0.to_string())
        );
        assert!(guard.should_suppress("sr", "t3_abc", 10, t0 + 1_000).await);
        assert!(!guard.should_suppress("sr", "t3_abc", 10, t0 + 11 * MINUTE_MS).await);
    }

    #[tokio::test]
    async fn suppression_does_not_move_the_anchor() {
        let kv = Arc::new(MemoryKv::new());
        let guard = DedupGuard::new(kv.clone());
        let t0 = 1_000_000;

        assert!(!guard.should_suppress("sr", "t1_x", 10, t0).await);
        // Duplicates at 5 and 9 minutes must not extend the window.
        assert!(guard.should_suppress("sr", "t1_x", 10, t0 + 5 * MINUTE_MS).await);
        assert!(guard.should_suppress("sr", "t1_x", 10, t0 + 9 * MINUTE_MS).await);
        assert!(!guard.should_suppress("sr", "t1_x", 10, t0 + 10 * MINUTE_MS).await);
    }

    #[tokio::test]
    async fn disabled_never_touches_storage() {
        let kv = Arc::new(MemoryKv::new());
        let guard = DedupGuard::new(kv.clone());
        assert!(!guard.should_suppress("sr", "t3_a", 0, 5).await);
        assert!(!guard.should_suppress("sr", "t3_a", -3, 5).await);
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn garbage_marker_counts_as_absent() {
        let kv = Arc::new(MemoryKv::new());
        kv.set(&last_counted_key("sr", "t3_a"), "NaN".into())
            .await
            .unwrap();
        let guard = DedupGuard::new(kv);
        assert!(!guard.should_suppress("sr", "t3_a", 10, 5_000).await);
    }
}

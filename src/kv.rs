//! Key-value persistence boundary: plain get/set of strings, no transactions,
//! no TTL. Key layout for everything the tracker persists lives here too.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;

/// Bump to migrate the persisted schema without touching old data.
pub const KEY_VERSION: &str = "v3";

pub fn strikes_key(community_id: &str, user_id: &str) -> String {
    format!("strike:{KEY_VERSION}:{community_id}:user:{user_id}:records")
}

pub fn last_counted_key(community_id: &str, target_id: &str) -> String {
    format!("strike:{KEY_VERSION}:{community_id}:target:{target_id}:lastCountedAt")
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
}

/// Process-memory store. Lost on restart.
#[derive(Debug, Default)]
pub struct MemoryKv {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let g = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("kv mutex poisoned"))?;
        Ok(g.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut g = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("kv mutex poisoned"))?;
        g.insert(key.to_string(), value);
        Ok(())
    }
}

/// Single JSON object on disk, rewritten on every `set` (tmp file + rename).
/// Reads are served from memory.
#[derive(Debug)]
pub struct FileKv {
    path: PathBuf,
    inner: tokio::sync::Mutex<HashMap<String, String>>,
}

impl FileKv {
    /// Open (or start) the store at `path`. An unreadable or corrupt file is
    /// logged and replaced by an empty store on the next write.
    pub async fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let map = match fs::read_to_string(&path).await {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                tracing::warn!(target: "store", path = %path.display(), "corrupt state file: {e}");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            inner: tokio::sync::Mutex::new(map),
        }
    }

    async fn flush(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_vec(map).context("serialize kv state")?;
        fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for FileKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut g = self.inner.lock().await;
        g.insert(key.to_string(), value);
        self.flush(&g).await
    }
}

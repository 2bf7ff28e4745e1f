//! Installation settings: untyped key lookups turned into one typed
//! `StrikeConfig` per event. All default coercion lives here.
//!
//! Stores:
//! - `MemorySettings`: in-process map, handy for tests and embedding.
//! - `FileSettings`: flat TOML (or JSON by extension) file, hot-reloaded on
//!   mtime change so edits apply to the next event without a restart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::tags::parse_tags;

pub const KEY_DEBUG: &str = "strike_debug_logging";
pub const KEY_ENABLED: &str = "strike_enabled";
pub const KEY_TAGS: &str = "strike_tags";
pub const KEY_THRESHOLD: &str = "strike_threshold";
pub const KEY_WINDOW_DAYS: &str = "strike_window_days";
pub const KEY_INCLUDE_AUTOMOD: &str = "strike_include_automod";
pub const KEY_REQUIRE_REASON: &str = "strike_require_removal_reason";
pub const KEY_REPEAT_NOTIFY: &str = "strike_notify_every_time_over_threshold";
pub const KEY_ADD_NOTE: &str = "strike_add_mod_note";
pub const KEY_NOTE_LABEL: &str = "strike_mod_note_label";
pub const KEY_NOTE_TEMPLATE: &str = "strike_mod_note_template";
pub const KEY_SUBJECT: &str = "strike_modmail_subject";
pub const KEY_BODY_TEMPLATE: &str = "strike_modmail_body_template";
pub const KEY_DEDUPE_MINUTES: &str = "strike_dedupe_minutes";
pub const KEY_APPLY_TO: &str = "strike_apply_to";

pub const DEFAULT_TAGS: &str = "#strike,3 strike";
pub const DEFAULT_THRESHOLD: u32 = 3;
pub const DEFAULT_WINDOW_DAYS: u32 = 14;
pub const DEFAULT_DEDUPE_MINUTES: i64 = 10;
pub const DEFAULT_NOTE_LABEL: &str = "Abuse Warning";
pub const DEFAULT_NOTE_TEMPLATE: &str = "StrikeBot: u/{username} at {count}/{threshold} strikes in {windowDays}d. Latest: {kind} {targetId}. Tags: {matchedTagText}";
pub const DEFAULT_SUBJECT: &str = "Strike alert: u/{username} ({count}/{threshold} in {windowDays}d)";
pub const DEFAULT_BODY_TEMPLATE: &str = "User: u/{username}\n\n**Strike status:** {count}/{threshold} strikes in the last {windowDays} days\n\n**Latest removal:** {kind} `{targetId}`\n\n**Matched tags:** {matchedTagText}\n\n**Moderation log text:**\n> {modActionText}";

/// Which target kinds count toward strikes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Posts,
    Comments,
    Both,
}

impl Scope {
    /// Unknown values behave like `both`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "posts" => Scope::Posts,
            "comments" => Scope::Comments,
            _ => Scope::Both,
        }
    }
}

/// One immutable view of the settings, taken at the start of each event.
#[derive(Debug, Clone, Serialize)]
pub struct StrikeConfig {
    pub enabled: bool,
    pub debug: bool,
    pub strike_tags: Vec<String>,
    pub threshold: u32,
    pub window_days: u32,
    pub scope: Scope,
    pub include_automod: bool,
    pub require_removal_reason: bool,
    pub repeat_notify: bool,
    pub add_mod_note: bool,
    pub mod_note_label: String,
    pub mod_note_template: String,
    pub modmail_subject: String,
    pub modmail_body_template: String,
    pub dedupe_minutes: i64,
}

impl Default for StrikeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: true,
            strike_tags: parse_tags(DEFAULT_TAGS),
            threshold: DEFAULT_THRESHOLD,
            window_days: DEFAULT_WINDOW_DAYS,
            scope: Scope::Both,
            include_automod: false,
            require_removal_reason: true,
            repeat_notify: true,
            add_mod_note: true,
            mod_note_label: DEFAULT_NOTE_LABEL.to_string(),
            mod_note_template: DEFAULT_NOTE_TEMPLATE.to_string(),
            modmail_subject: DEFAULT_SUBJECT.to_string(),
            modmail_body_template: DEFAULT_BODY_TEMPLATE.to_string(),
            dedupe_minutes: DEFAULT_DEDUPE_MINUTES,
        }
    }
}

/// Settings source. `Ok(None)` means "not set"; the caller applies defaults.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
}

/// Read every setting and coerce it. A failing lookup is logged and treated
/// as unset, so a flaky settings backend degrades to defaults.
pub async fn load_config(store: &dyn SettingsStore) -> StrikeConfig {
    let d = StrikeConfig::default();

    let tags = match fetch(store, KEY_TAGS).await {
        Some(v) => as_string(&v).map(|s| parse_tags(&s)).unwrap_or(d.strike_tags),
        None => d.strike_tags,
    };

    StrikeConfig {
        enabled: get_bool(store, KEY_ENABLED, d.enabled).await,
        debug: get_bool(store, KEY_DEBUG, d.debug).await,
        strike_tags: tags,
        threshold: get_int(store, KEY_THRESHOLD)
            .await
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(d.threshold),
        window_days: get_int(store, KEY_WINDOW_DAYS)
            .await
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(d.window_days),
        scope: get_string(store, KEY_APPLY_TO)
            .await
            .map(|s| Scope::parse(&s))
            .unwrap_or(d.scope),
        include_automod: get_bool(store, KEY_INCLUDE_AUTOMOD, d.include_automod).await,
        require_removal_reason: get_bool(store, KEY_REQUIRE_REASON, d.require_removal_reason)
            .await,
        repeat_notify: get_bool(store, KEY_REPEAT_NOTIFY, d.repeat_notify).await,
        add_mod_note: get_bool(store, KEY_ADD_NOTE, d.add_mod_note).await,
        mod_note_label: get_string(store, KEY_NOTE_LABEL)
            .await
            .unwrap_or(d.mod_note_label),
        mod_note_template: get_string(store, KEY_NOTE_TEMPLATE)
            .await
            .unwrap_or(d.mod_note_template),
        modmail_subject: get_string(store, KEY_SUBJECT)
            .await
            .unwrap_or(d.modmail_subject),
        modmail_body_template: get_string(store, KEY_BODY_TEMPLATE)
            .await
            .unwrap_or(d.modmail_body_template),
        dedupe_minutes: get_int(store, KEY_DEDUPE_MINUTES)
            .await
            .unwrap_or(d.dedupe_minutes),
    }
}

async fn fetch(store: &dyn SettingsStore, key: &str) -> Option<Value> {
    match store.get(key).await {
        Ok(Some(Value::Null)) | Ok(None) => None,
        Ok(Some(v)) => Some(v),
        Err(e) => {
            tracing::warn!(target: "strike", key, error = ?e, "settings lookup failed; using default");
            None
        }
    }
}

async fn get_bool(store: &dyn SettingsStore, key: &str, default: bool) -> bool {
    fetch(store, key)
        .await
        .and_then(|v| as_bool(&v))
        .unwrap_or(default)
}

async fn get_int(store: &dyn SettingsStore, key: &str) -> Option<i64> {
    fetch(store, key).await.and_then(|v| as_int(&v))
}

async fn get_string(store: &dyn SettingsStore, key: &str) -> Option<String> {
    fetch(store, key).await.and_then(|v| as_string(&v))
}

fn as_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|x| x != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|x| x.is_finite()).map(|x| x.trunc() as i64)),
        Value::String(s) => {
            let t = s.trim();
            t.parse::<i64>().ok().or_else(|| {
                t.parse::<f64>()
                    .ok()
                    .filter(|x| x.is_finite())
                    .map(|x| x.trunc() as i64)
            })
        }
        _ => None,
    }
}

fn as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/* ----------------------------
Stores
---------------------------- */

/// In-memory settings.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, Value>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<V: Into<Value>>(self, key: &str, value: V) -> Self {
        self.set(key, value);
        self
    }

    pub fn set<V: Into<Value>>(&self, key: &str, value: V) {
        if let Ok(mut g) = self.values.write() {
            g.insert(key.to_string(), value.into());
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let g = self
            .values
            .read()
            .map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
        Ok(g.get(key).cloned())
    }
}

/// File-backed settings, reloaded whenever the file's mtime changes.
/// A missing file means "everything unset".
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    inner: RwLock<FileState>,
}

#[derive(Debug, Default)]
struct FileState {
    values: Map<String, Value>,
    last_modified: Option<SystemTime>,
}

impl FileSettings {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            inner: RwLock::new(FileState::default()),
        }
    }

    fn refresh(&self) -> Result<()> {
        let mtime = match std::fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => {
                let mut g = self
                    .inner
                    .write()
                    .map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
                *g = FileState::default();
                return Ok(());
            }
        };

        {
            let g = self
                .inner
                .read()
                .map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
            if g.last_modified == Some(mtime) {
                return Ok(());
            }
        }

        let mut g = self
            .inner
            .write()
            .map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
        // A broken edit keeps the last good values until the file changes again.
        match load_settings_file(&self.path) {
            Ok(values) => g.values = values,
            Err(e) => tracing::warn!(
                target: "strike",
                path = %self.path.display(),
                "settings reload failed, keeping previous values: {e:#}"
            ),
        }
        g.last_modified = Some(mtime);
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for FileSettings {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.refresh()?;
        let g = self
            .inner
            .read()
            .map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
        Ok(g.values.get(key).cloned())
    }
}

/// Parse a flat settings file. `.json` is read as a JSON object, anything
/// else as TOML.
pub fn load_settings_file(path: &Path) -> Result<Map<String, Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("parsing JSON settings {}", path.display()))
    } else {
        toml::from_str(&content).with_context(|| format!("parsing TOML settings {}", path.display()))
    }
}

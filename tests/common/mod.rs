// tests/common/mod.rs
//
// Hand-written fakes for the pipeline's collaborators.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use strike_tracker::config::{settings, MemorySettings};
use strike_tracker::kv::MemoryKv;
use strike_tracker::modlog::{ModLogListing, ModLogQuery, ModLogRequest};
use strike_tracker::notify::{ModNotification, ModNotifier, UserNote};
use strike_tracker::{ModActionEvent, StrikePipeline};

/// Mod log returning scripted responses in call order, then empty listings.
#[derive(Default)]
pub struct ScriptedModLog {
    script: Mutex<VecDeque<Result<Value, String>>>,
    pub requests: Mutex<Vec<ModLogRequest>>,
}

impl ScriptedModLog {
    pub fn new(script: Vec<Result<Value, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every call returns the same listing.
    pub fn always(listing: Value) -> Self {
        Self::new(vec![Ok(listing); 4])
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn filters(&self) -> Vec<Option<String>> {
        self.requests
            .lock()
            .iter()
            .map(|r| r.action_type.clone())
            .collect()
    }
}

#[async_trait]
impl ModLogQuery for ScriptedModLog {
    async fn fetch(&self, req: &ModLogRequest) -> Result<ModLogListing> {
        self.requests.lock().push(req.clone());
        match self.script.lock().pop_front() {
            Some(Ok(v)) => Ok(ModLogListing::from_value(v)),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Ok(ModLogListing::Items(Vec::new())),
        }
    }
}

/// Records every notification and note; either side can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    pub notifications: Mutex<Vec<ModNotification>>,
    pub notes: Mutex<Vec<UserNote>>,
    pub fail_notifications: bool,
    pub fail_notes: bool,
}

#[async_trait]
impl ModNotifier for RecordingNotifier {
    async fn send_notification(&self, msg: &ModNotification) -> Result<()> {
        if self.fail_notifications {
            return Err(anyhow!("notification service down"));
        }
        self.notifications.lock().push(msg.clone());
        Ok(())
    }

    async fn add_user_note(&self, note: &UserNote) -> Result<()> {
        if self.fail_notes {
            return Err(anyhow!("note service down"));
        }
        self.notes.lock().push(note.clone());
        Ok(())
    }
}

/// Mod-log entry attaching a removal reason to `target`.
pub fn reason_entry(target: &str, description: &str) -> Value {
    json!({
        "type": "addremovalreason",
        "moderatorName": "mod_alice",
        "description": description,
        "details": "",
        "target": { "id": target, "title": "Some post", "permalink": "/r/test/comments/abc" }
    })
}

/// A removal-reason event for `target` by `author`.
pub fn removal_event(target: &str, author_id: &str, author_name: &str) -> ModActionEvent {
    serde_json::from_value(json!({
        "action": "addremovalreason",
        "moderator": { "name": "mod_alice" },
        "targetId": target,
        "targetUser": { "id": author_id, "name": author_name }
    }))
    .expect("valid event json")
}

pub struct Harness {
    pub settings: Arc<MemorySettings>,
    pub kv: Arc<MemoryKv>,
    pub modlog: Arc<ScriptedModLog>,
    pub notifier: Arc<RecordingNotifier>,
    pub pipeline: StrikePipeline,
}

impl Harness {
    pub fn new(modlog: ScriptedModLog, notifier: RecordingNotifier) -> Self {
        let settings = Arc::new(MemorySettings::new().with(settings::KEY_DEBUG, false));
        let kv = Arc::new(MemoryKv::new());
        let modlog = Arc::new(modlog);
        let notifier = Arc::new(notifier);
        let pipeline = StrikePipeline::new(
            settings.clone(),
            kv.clone(),
            modlog.clone(),
            notifier.clone(),
        )
        .with_retry_delay(Duration::ZERO);
        Self {
            settings,
            kv,
            modlog,
            notifier,
            pipeline,
        }
    }
}

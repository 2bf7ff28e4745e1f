// src/lib.rs
// Public library surface for the service binary and integration tests.

pub mod api;
pub mod config;
pub mod debug;
pub mod dedup;
pub mod event;
pub mod kv;
pub mod metrics;
pub mod modlog;
pub mod notify;
pub mod pipeline;
pub mod strikes;
pub mod tags;
pub mod template;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::{load_config, SettingsStore, StrikeConfig};
pub use crate::event::{ModActionEvent, TargetKind};
pub use crate::kv::KvStore;
pub use crate::modlog::{EvidenceResolver, ModLogQuery};
pub use crate::notify::{ModNotifier, ModNotification, UserNote};
pub use crate::pipeline::{EventContext, Outcome, SkipReason, StrikePipeline};

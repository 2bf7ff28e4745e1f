//! Configuration: per-event installation settings and process wiring.

pub mod service;
pub mod settings;

pub use service::ServiceConfig;
pub use settings::{
    load_config, FileSettings, MemorySettings, Scope, SettingsStore, StrikeConfig,
};

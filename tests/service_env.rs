// tests/service_env.rs
//
// ServiceConfig::from_env against the real process environment.
// Serialized because the environment is process-global.

use std::time::Duration;

use strike_tracker::config::service::{
    ENV_BIND_ADDR, ENV_COMMUNITY_NAME, ENV_MODLOG_RETRY_MS, ENV_MODLOG_URL, ENV_NOTIFY_WEBHOOK,
};
use strike_tracker::config::ServiceConfig;

const ALL: [&str; 5] = [
    ENV_BIND_ADDR,
    ENV_COMMUNITY_NAME,
    ENV_MODLOG_RETRY_MS,
    ENV_MODLOG_URL,
    ENV_NOTIFY_WEBHOOK,
];

fn clear() {
    for k in ALL {
        std::env::remove_var(k);
    }
}

#[test]
#[serial_test::serial]
fn from_env_reads_overrides() {
    clear();
    std::env::set_var(ENV_BIND_ADDR, "127.0.0.1:9099");
    std::env::set_var(ENV_MODLOG_URL, "https://modlog.example.test");
    std::env::set_var(ENV_COMMUNITY_NAME, "test");
    std::env::set_var(ENV_MODLOG_RETRY_MS, "0");

    let cfg = ServiceConfig::from_env().expect("valid env");
    assert_eq!(cfg.bind_addr.port(), 9099);
    assert_eq!(cfg.modlog_url.as_deref(), Some("https://modlog.example.test"));
    assert_eq!(cfg.community_name.as_deref(), Some("test"));
    assert_eq!(cfg.modlog_retry_delay, Duration::ZERO);
    assert!(cfg.notify_webhook.is_none());
    clear();
}

#[test]
#[serial_test::serial]
fn from_env_rejects_bad_retry_delay() {
    clear();
    std::env::set_var(ENV_MODLOG_RETRY_MS, "soon");
    let err = ServiceConfig::from_env().unwrap_err();
    assert!(err.to_string().contains(ENV_MODLOG_RETRY_MS));
    clear();
}

//! Prometheus exposition for the strike pipeline.
//!
//! Series (all counters):
//! - `strike_events_total`: mod actions received
//! - `strike_skipped_total{reason}`: events stopped at a gate
//! - `strike_counted_total`: strikes recorded
//! - `strike_escalations_total`: strikes that met the escalation policy
//! - `strike_side_effect_errors_total{effect}`: failed notification or note
//! - `strike_modlog_query_errors_total`: mod-log queries treated as empty

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and describe the strike series.
    /// Call once per process; counters recorded before this are lost.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_series();
        Ok(Self { handle })
    }

    /// Exposition text, same as `GET /metrics`.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe_series() {
    describe_counter!("strike_events_total", "Mod action events received.");
    describe_counter!(
        "strike_skipped_total",
        "Events that stopped at a pipeline gate, by reason."
    );
    describe_counter!("strike_counted_total", "Strikes recorded.");
    describe_counter!(
        "strike_escalations_total",
        "Strikes that met the escalation policy."
    );
    describe_counter!(
        "strike_side_effect_errors_total",
        "Failed notifications or notes, by effect."
    );
    describe_counter!(
        "strike_modlog_query_errors_total",
        "Mod log queries that failed and were treated as empty."
    );
}

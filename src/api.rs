use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tower_http::cors::CorsLayer;

use crate::event::ModActionEvent;
use crate::pipeline::{EventContext, Outcome, StrikePipeline};
use crate::strikes::{prune, StrikeRecord};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<StrikePipeline>,
    /// Used when an event does not name its community.
    pub community_id: Option<String>,
    pub community_name: Option<String>,
}

impl AppState {
    pub fn new(pipeline: Arc<StrikePipeline>) -> Self {
        Self {
            pipeline,
            community_id: None,
            community_name: None,
        }
    }

    pub fn with_community(mut self, id: Option<String>, name: Option<String>) -> Self {
        self.community_id = id;
        self.community_name = name;
        self
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/events/mod-action", post(mod_action))
        .route("/strikes/{community}/{user}", get(user_strikes))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn mod_action(State(state): State<AppState>, Json(ev): Json<ModActionEvent>) -> Json<Outcome> {
    let ctx = EventContext::from_event(
        &ev,
        state.community_id.as_deref(),
        state.community_name.as_deref(),
    );
    Json(state.pipeline.handle(&ctx, &ev).await)
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct StrikesOut {
    community: String,
    user: String,
    window_days: u32,
    threshold: u32,
    count: usize,
    records: Vec<StrikeRecord>,
}

/// Read-only view of a user's in-window strikes; nothing is written back.
async fn user_strikes(
    State(state): State<AppState>,
    Path((community, user)): Path<(String, String)>,
) -> Json<StrikesOut> {
    let cfg = state.pipeline.config().await;
    let log = state.pipeline.strikes().load(&community, &user).await;
    let log = prune(log, cfg.window_days, Utc::now().timestamp_millis());
    Json(StrikesOut {
        community,
        user,
        window_days: cfg.window_days,
        threshold: cfg.threshold,
        count: log.len(),
        records: log.records,
    })
}

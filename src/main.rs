//! Strike tracker service binary.
//! Wires settings, storage, mod-log client and notifier into the pipeline and
//! serves the event ingress API.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use strike_tracker::config::{FileSettings, ServiceConfig};
use strike_tracker::kv::FileKv;
use strike_tracker::metrics::Metrics;
use strike_tracker::modlog::{http::HttpModLog, ModLogQuery, NoModLog};
use strike_tracker::notify::{LogNotifier, ModNotifier, WebhookNotifier};
use strike_tracker::{create_router, AppState, StrikePipeline};

/// `RUST_LOG` wins over the default filter; `STRIKE_LOG_JSON=1` switches to
/// one JSON object per line for log shippers.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("strike_tracker=info,strike=info,warn"));
    let json = std::env::var("STRIKE_LOG_JSON").is_ok_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = ServiceConfig::from_env()?;
    info!(bind = %cfg.bind_addr, settings = %cfg.settings_path.display(), "starting strike tracker");

    // Recorder first: anything counted or described before it is dropped.
    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!("metrics disabled: {e:#}");
            None
        }
    };

    let settings = Arc::new(FileSettings::new(&cfg.settings_path));
    let kv = Arc::new(FileKv::open(&cfg.state_path).await);

    let modlog: Arc<dyn ModLogQuery> = match &cfg.modlog_url {
        Some(url) => Arc::new(
            HttpModLog::new(url.clone())
                .with_bearer(cfg.modlog_token.clone())
                .with_timeout(cfg.http_timeout_secs),
        ),
        None => {
            warn!("STRIKE_MODLOG_URL not set; removal reasons cannot be resolved");
            Arc::new(NoModLog)
        }
    };
    let notifier: Arc<dyn ModNotifier> = match &cfg.notify_webhook {
        Some(url) => {
            Arc::new(WebhookNotifier::new(url.clone()).with_timeout(cfg.http_timeout_secs))
        }
        None => {
            info!("STRIKE_NOTIFY_WEBHOOK not set; escalations are logged only");
            Arc::new(LogNotifier)
        }
    };

    let pipeline = StrikePipeline::new(settings, kv, modlog, notifier)
        .with_retry_delay(cfg.modlog_retry_delay);

    let state = AppState::new(Arc::new(pipeline))
        .with_community(cfg.community_id.clone(), cfg.community_name.clone());

    let mut router = create_router(state);
    if let Some(m) = metrics {
        router = router.merge(m.router());
    }

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    axum::serve(listener, router).await.context("serving http")?;
    Ok(())
}

//! Application entry point for the `codemetal-weathercast` backend service.
//!
//! This binary orchestrates the full startup sequence for the ingest and
//! forecast API, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Selecting storage: a PostgreSQL pool (schema created if missing) or the
//!   in-memory demo store when `DATABASE_URL` is unset
//! - Selecting the forecast engine: the configured model service or the
//!   built-in persistence baseline
//! - Mounting all API routes via the `routes` gateway (EMBP pattern)
//! - Binding the Axum HTTP server and serving until Ctrl-C
//!
//! # Environment Variables
//! - `JWT_SECRET` (**required**) – bearer token secret
//! - `DATABASE_URL` (optional) – PostgreSQL connection string
//! - `AXUM_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `AXUM_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the complete list.
use std::{env, io::IsTerminal, net::SocketAddr, sync::Arc, time::Duration};

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

use weathercast::engine::{ForecastEngine, HttpForecastEngine, PersistenceEngine};
use weathercast::store::{MemoryStorage, PgStorage, Storage};
use weathercast::{audit, config, routes, schema, AppState, Config};

/// How long the forecast worker may take to drain after the server stops.
const WORKER_GRACE: Duration = Duration::from_secs(5);

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let storage = connect_storage(&cfg).await?;
    let engine = build_engine(&cfg)?;

    let addr: SocketAddr = cfg
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid BIND_ADDR '{}': {}", cfg.bind_addr, e))?;

    let (state, worker) = AppState::new(cfg, storage, engine);

    // Build app from routes gateway (EMBP)
    let app = routes::router(state);

    audit::log_system_event(
        "application_startup",
        "weathercast",
        serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }),
    );
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // The router (and with it every job queue handle) is gone; let the worker drain
    if tokio::time::timeout(WORKER_GRACE, worker).await.is_err() {
        tracing::warn!("Forecast worker did not stop within {:?}", WORKER_GRACE);
    }
    tracing::info!("Application shutdown complete");

    Ok(())
}

// ---

async fn connect_storage(cfg: &Config) -> Result<Arc<dyn Storage>> {
    // ---
    let Some(db_url) = cfg.db_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using in-memory storage (data is lost on exit)");
        return Ok(Arc::new(MemoryStorage::new()));
    };

    let masked = cfg.masked_db_url().unwrap_or_default();
    tracing::info!("Attempting to connect to database: {}", masked);

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(db_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database '{}': {}", masked, e))?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;
    Ok(Arc::new(PgStorage::new(pool)))
}

fn build_engine(cfg: &Config) -> Result<Arc<dyn ForecastEngine>> {
    // ---
    match cfg.model_url.as_deref() {
        Some(url) => {
            let timeout = Duration::from_secs(u64::from(cfg.model_timeout_secs));
            let engine = HttpForecastEngine::new(url, timeout)?;
            tracing::info!("Using forecast model at {}", url);
            Ok(Arc::new(engine))
        }
        None => {
            tracing::info!("No forecast model configured, using persistence baseline");
            Ok(Arc::new(PersistenceEngine))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `AXUM_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `AXUM_LOG_LEVEL` env var
///
/// Audit records use the `audit` target and can be filtered separately,
/// e.g. `RUST_LOG=info,audit=info`.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to AXUM_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AXUM_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}

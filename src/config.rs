//! Configuration loader for the `codemetal-weathercast` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
//!
use std::env;

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional boolean environment variable with a default value.
macro_rules! parse_env_bool {
    ($var_name:expr, $default:expr) => {
        match env::var($var_name).ok().as_deref() {
            None => $default,
            Some("1") | Some("true") | Some("yes") => true,
            Some("0") | Some("false") | Some("no") => false,
            Some(other) => return Err(anyhow!("Invalid {}: {}", $var_name, other)),
        }
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173";

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string. `None` runs on in-memory storage.
    pub db_url: Option<String>,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Socket address the HTTP server binds to.
    pub bind_addr: String,

    /// HS256 secret for bearer token validation.
    pub jwt_secret: String,

    /// Forecast model base URL. `None` selects the built-in baseline.
    pub model_url: Option<String>,

    /// Timeout applied by the HTTP forecast engine to each model call.
    pub model_timeout_secs: u32,

    /// Capacity of the background forecast job queue.
    pub job_queue_capacity: u32,

    /// Origins allowed by CORS.
    pub cors_origins: Vec<String>,

    /// Mount the unauthenticated dashboard endpoints.
    pub public_api: bool,

    /// Take the client address from `X-Forwarded-For`. Only safe behind a
    /// reverse proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `JWT_SECRET` – secret used to validate bearer tokens
///
/// Optional:
/// - `DATABASE_URL` – PostgreSQL connection string (default: in-memory storage)
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `BIND_ADDR` – listen address (default: `0.0.0.0:8080`)
/// - `FORECAST_MODEL_URL` – forecast model service (default: persistence baseline)
/// - `FORECAST_MODEL_TIMEOUT_SECS` – model call timeout (default: 10)
/// - `FORECAST_QUEUE_CAPACITY` – background job queue size (default: 256)
/// - `CORS_ORIGINS` – comma separated origins (default: local dashboard)
/// - `PUBLIC_API_ENABLED` – mount `/api/v1/public/*` (default: true)
/// - `TRUST_FORWARDED_FOR` – key clients by `X-Forwarded-For` (default: false)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let jwt_secret = require_env!("JWT_SECRET");
    let db_url = env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
    let model_url = env::var("FORECAST_MODEL_URL")
        .ok()
        .filter(|v| !v.is_empty());
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);
    let model_timeout_secs = parse_env_u32!("FORECAST_MODEL_TIMEOUT_SECS", 10);
    let job_queue_capacity = parse_env_u32!("FORECAST_QUEUE_CAPACITY", 256);
    let public_api = parse_env_bool!("PUBLIC_API_ENABLED", true);
    let trust_forwarded_for = parse_env_bool!("TRUST_FORWARDED_FOR", false);
    let cors_origins = parse_origins(
        &env::var("CORS_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string()),
    );

    if job_queue_capacity == 0 {
        return Err(anyhow!("FORECAST_QUEUE_CAPACITY must be at least 1"));
    }

    Ok(Config {
        db_url,
        db_pool_max,
        bind_addr,
        jwt_secret,
        model_url,
        model_timeout_secs,
        job_queue_capacity,
        cors_origins,
        public_api,
        trust_forwarded_for,
    })
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Replace the password of a connection URL with `****`.
fn mask_db_url(db_url: &str) -> String {
    // ---
    if let Some(at_pos) = db_url.rfind('@') {
        if let Some(colon_pos) = db_url[..at_pos].rfind(':') {
            // `postgres://host` has its scheme colon right before the slashes
            if !db_url[colon_pos..].starts_with("://") {
                return format!("{}:****{}", &db_url[..colon_pos], &db_url[at_pos..]);
            }
        }
    }
    db_url.to_string()
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords and the token
    /// secret while showing all other configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        let masked_db_url = self
            .db_url
            .as_deref()
            .map(mask_db_url)
            .unwrap_or_else(|| "<unset: in-memory storage>".to_string());

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL        : {}", masked_db_url);
        tracing::info!("  DB_POOL_MAX         : {}", self.db_pool_max);
        tracing::info!("  BIND_ADDR           : {}", self.bind_addr);
        tracing::info!("  JWT_SECRET          : ****");
        tracing::info!(
            "  FORECAST_MODEL_URL  : {}",
            self.model_url.as_deref().unwrap_or("<unset: persistence baseline>")
        );
        tracing::info!("  MODEL_TIMEOUT_SECS  : {}", self.model_timeout_secs);
        tracing::info!("  QUEUE_CAPACITY      : {}", self.job_queue_capacity);
        tracing::info!("  CORS_ORIGINS        : {}", self.cors_origins.join(","));
        tracing::info!("  PUBLIC_API_ENABLED  : {}", self.public_api);
        tracing::info!("  TRUST_FORWARDED_FOR : {}", self.trust_forwarded_for);
    }

    /// Database URL safe to print.
    pub fn masked_db_url(&self) -> Option<String> {
        self.db_url.as_deref().map(mask_db_url)
    }
}

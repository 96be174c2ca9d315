// src/routes/health.rs
//! API health check endpoint for the weathercast backend.
//!
//! This module defines the `/healthz` route used by container orchestrators
//! (e.g., Docker, Kubernetes) and CI pipelines to verify that the service is
//! running and able to respond to HTTP requests. It follows the Explicit
//! Module Boundary Pattern (EMBP):
//! - Internal to this file: endpoint handler(s) and related types
//! - Exports to the gateway (`mod.rs`): a subrouter containing the `/healthz` route

use axum::{routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::rate_limit::{self, ClientKey};

/// JSON response body for the `/healthz` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

/// Handle `GET /healthz`.
///
/// Deliberately lightweight: does not touch the database or the forecast
/// engine.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}

/// Create a subrouter containing the `/healthz` route, limited to 100
/// requests per minute per client.
///
/// # Type Parameters
/// - `S`: Application state type shared by all routes in the gateway.
pub fn router<S>(clients: ClientKey) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    rate_limit::limit(Router::new().route("/healthz", get(health)), 100, clients)
}

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Extension, Json, Router,
};
use tracing::info;

use crate::auth::AuthUser;
use crate::models::{IngestAck, IngestPayload};
use crate::rate_limit::{self, ClientKey};
use crate::{AppError, AppResult, AppState};

// ---

pub fn router(path: &str, clients: ClientKey) -> Router<AppState> {
    // ---
    rate_limit::limit(Router::new().route(path, post(handler)), 60, clients)
}

async fn handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<IngestPayload>, JsonRejection>,
) -> AppResult<Json<IngestAck>> {
    // ---
    let Json(payload) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    info!(
        "POST /api/v1/ingest - device {} from {}",
        payload.device_id, user.subject
    );

    let ack = state
        .ingest
        .ingest(payload, &user.subject, &user.origin)
        .await?;
    Ok(Json(ack))
}

use axum::{extract::State, routing::get, Json, Router};

use super::DeviceParam;
use crate::models::LatestOut;
use crate::rate_limit::{self, ClientKey};
use crate::{AppResult, AppState};

// ---

pub fn router(path: &str, clients: ClientKey) -> Router<AppState> {
    // ---
    rate_limit::limit(Router::new().route(path, get(handler)), 100, clients)
}

/// Latest reading of a device, or `null` when it has none.
async fn handler(
    State(state): State<AppState>,
    DeviceParam(device_id): DeviceParam,
) -> AppResult<Json<Option<LatestOut>>> {
    // ---
    let latest = state.storage.latest(&device_id).await?;
    Ok(Json(latest.map(LatestOut::from)))
}

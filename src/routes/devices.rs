use axum::{extract::State, routing::get, Json, Router};

use crate::models::DeviceOut;
use crate::rate_limit::{self, ClientKey};
use crate::{AppResult, AppState};

// ---

pub fn router(path: &str, clients: ClientKey) -> Router<AppState> {
    // ---
    rate_limit::limit(Router::new().route(path, get(handler)), 50, clients)
}

async fn handler(State(state): State<AppState>) -> AppResult<Json<Vec<DeviceOut>>> {
    // ---
    let devices = state.storage.list_devices().await?;
    tracing::debug!("Listing {} devices", devices.len());
    Ok(Json(devices.into_iter().map(DeviceOut::from).collect()))
}

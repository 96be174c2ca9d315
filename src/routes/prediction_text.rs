use axum::{extract::State, routing::get, Json, Router};

use super::DeviceParam;
use crate::forecast::PredictionTextOut;
use crate::rate_limit::{self, ClientKey};
use crate::{AppResult, AppState};

// ---

pub fn router(path: &str, clients: ClientKey) -> Router<AppState> {
    // ---
    rate_limit::limit(Router::new().route(path, get(handler)), 30, clients)
}

async fn handler(
    State(state): State<AppState>,
    DeviceParam(device_id): DeviceParam,
) -> AppResult<Json<PredictionTextOut>> {
    Ok(Json(state.forecasts.prediction_text(&device_id).await?))
}

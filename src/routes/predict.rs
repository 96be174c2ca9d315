use axum::{extract::State, routing::get, Json, Router};
use tracing::info;

use super::DeviceParam;
use crate::models::ForecastOut;
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
) -> AppResult<Json<ForecastOut>> {
    // ---
    let forecast = state.forecasts.forecast(&device_id).await?;
    info!(
        "Forecast for {}: {} ({} steps)",
        device_id,
        forecast.model_version,
        forecast.for_ts.len()
    );
    Ok(Json(forecast))
}

use axum::{
    extract::{rejection::QueryRejection, FromRequestParts, Query},
    http::{header, request::Parts, HeaderValue, Method},
    middleware, Router,
};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{auth, AppError, AppState};

mod devices;
mod health;
mod ingest;
mod latest;
mod metrics;
mod predict;
mod prediction_text;

// ---

#[derive(Debug, Deserialize)]
struct DeviceQuery {
    device_id: String,
}

/// `?device_id=` of the per-device endpoints. A missing or malformed query
/// is a validation error.
pub struct DeviceParam(pub String);

impl<S> FromRequestParts<S> for DeviceParam
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // ---
        let Query(query) = Query::<DeviceQuery>::from_request_parts(parts, state)
            .await
            .map_err(|e: QueryRejection| AppError::Validation(e.body_text()))?;
        Ok(Self(query.device_id))
    }
}

pub fn router(state: AppState) -> Router {
    // ---
    let clients = state.clients;
    let api = Router::new()
        .merge(ingest::router("/api/v1/ingest", clients))
        .merge(devices::router("/api/v1/devices", clients))
        .merge(latest::router("/api/v1/latest", clients))
        .merge(predict::router("/api/v1/predict", clients))
        .merge(prediction_text::router("/api/v1/prediction-text", clients))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let mut app = Router::new()
        .merge(health::router(clients))
        .merge(metrics::router())
        .merge(api);

    // Unauthenticated dashboard mirror; same handlers and quotas, no token
    if state.config.public_api {
        app = app
            .merge(devices::router("/api/v1/public/devices", clients))
            .merge(latest::router("/api/v1/public/latest", clients))
            .merge(predict::router("/api/v1/public/predict", clients))
            .merge(prediction_text::router("/api/v1/public/prediction-text", clients));
    }

    app.layer(cors_layer(&state.config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    // ---
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::AppState;

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(handler))
}

async fn handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

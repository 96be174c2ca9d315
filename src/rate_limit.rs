//! Per-route request quotas.
//!
//! Every route gets its own [`GovernorLayer`], so quotas are independent
//! across endpoints. A quota of N per minute is a bucket of N requests that
//! refills one request every `60s / N`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::ConnectInfo,
    http::{header::RETRY_AFTER, Extensions, HeaderMap, HeaderName, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::KeyExtractor, GovernorError, GovernorLayer,
};

use crate::error::AppError;

/// Key shared by every caller whose address cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_RATELIMIT_AFTER: &str = "x-ratelimit-after";

// ---

/// Identifies the calling client for quotas and audit records.
///
/// The TCP peer address is used unless `trust_forwarded_for` is set, in which
/// case the first `X-Forwarded-For` hop written by the fronting proxy wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientKey {
    trust_forwarded_for: bool,
}

impl ClientKey {
    pub fn new(trust_forwarded_for: bool) -> Self {
        Self {
            trust_forwarded_for,
        }
    }

    pub fn origin(&self, headers: &HeaderMap, extensions: &Extensions) -> String {
        // ---
        let forwarded = if self.trust_forwarded_for {
            headers
                .get(X_FORWARDED_FOR)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        } else {
            None
        };

        forwarded
            .or_else(|| {
                extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }
}

impl KeyExtractor for ClientKey {
    type Key = String;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        Ok(self.origin(req.headers(), req.extensions()))
    }
}

/// Milliseconds between two refills of a `per_minute` bucket.
fn refill_interval_ms(per_minute: u32) -> u64 {
    (60_000 / u64::from(per_minute.max(1))).max(1)
}

/// Limit every route of `router` to `per_minute` requests per client.
pub fn limit<S>(router: Router<S>, per_minute: u32, clients: ClientKey) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    // ---
    let Some(config) = GovernorConfigBuilder::default()
        .key_extractor(clients)
        .per_millisecond(refill_interval_ms(per_minute))
        .burst_size(per_minute)
        .finish()
    else {
        tracing::warn!("Ignoring invalid quota of {} requests per minute", per_minute);
        return router;
    };

    router
        .route_layer(GovernorLayer::new(Arc::new(config)))
        .route_layer(middleware::map_response(rate_limited_envelope))
}

/// Replace the governor's plain-text 429 with the API error body, keeping
/// its retry hints.
async fn rate_limited_envelope(response: Response) -> Response {
    // ---
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }

    let mut envelope = AppError::RateLimited.into_response();
    for name in [RETRY_AFTER, HeaderName::from_static(X_RATELIMIT_AFTER)] {
        if let Some(value) = response.headers().get(&name) {
            envelope.headers_mut().insert(name.clone(), value.clone());
        }
    }
    envelope
}

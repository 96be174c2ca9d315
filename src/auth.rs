//! Bearer token authentication.
//!
//! Tokens are HS256 JWTs whose `sub` names the caller. The middleware puts an
//! [`AuthUser`] into the request extensions for handlers that need an actor.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::AppState;

// ---

/// Authenticated caller.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub subject: String,
    /// Client address, used as the audit origin.
    pub origin: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
    iat: i64,
}

/// Verification key and rules, cloned into the middleware.
#[derive(Clone)]
pub struct JwtAuth {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuth {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    /// Subject of a valid token.
    pub fn verify(&self, token: &str) -> Result<String, AppError> {
        // ---
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims.sub)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::Unauthorized("token expired".into()),
                _ => AppError::Unauthorized("invalid token".into()),
            })
    }
}

/// Mint a token for `subject` valid for `ttl`.
pub fn issue_token(
    secret: &str,
    subject: &str,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    // ---
    let now = Utc::now();
    let claims = Claims {
        sub: subject.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Reject requests without a valid `Authorization: Bearer` token.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // ---
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        return AppError::Unauthorized("missing or invalid Authorization header".into())
            .into_response();
    };

    let subject = match state.auth.verify(token) {
        Ok(sub) => sub,
        Err(e) => return e.into_response(),
    };

    let origin = state.clients.origin(request.headers(), request.extensions());
    request.extensions_mut().insert(AuthUser { subject, origin });

    next.run(request).await
}

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use crate::config::ServerConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("No auth token found.")]
    MissingToken,
    #[error("Invalid auth token found.")]
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Rejects requests whose bearer token does not match `AUTH_TOKEN`.
/// Without a configured token every request passes.
pub async fn validated_request(
    State(config): State<Arc<ServerConfig>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if let Some(expected) = config.auth_token.as_deref() {
        if let Err(err) = check_token(req.headers(), expected) {
            warn!(path = %req.uri().path(), reason = %err, "request rejected");
            return Err(err);
        }
    }
    Ok(next.run(req).await)
}

fn check_token(headers: &HeaderMap, expected: &str) -> Result<(), AuthError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_whitespace().nth(1));

    match token {
        None => Err(AuthError::MissingToken),
        Some(token) if token != expected => Err(AuthError::InvalidToken),
        Some(_) => Ok(()),
    }
}

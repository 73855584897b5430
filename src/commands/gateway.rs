use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::{
    app::AppState,
    body::{content_type, normalize_body, BodyError},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/v/{command}", post(dispatch))
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid interface command")]
    UnknownCommand { commands: Vec<String> },
    #[error(transparent)]
    Body(#[from] BodyError),
    #[error("command `{command}` returned a non-object result")]
    NonObjectResult { command: String },
    #[error("{0}")]
    Failed(anyhow::Error),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = match &self {
            GatewayError::UnknownCommand { commands } => json!({
                "message": self.to_string(),
                "commands": commands,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// `POST /v/{command}`: run one registered command with the request body.
pub async fn dispatch(
    State(state): State<AppState>,
    Path(command): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Map<String, Value>>, GatewayError> {
    let Some(handler) = state.commands.get(&command) else {
        warn!(%command, "invalid interface command");
        return Err(GatewayError::UnknownCommand {
            commands: state.commands.names(),
        });
    };

    let args = normalize_body(content_type(&headers), &body).map_err(|err| {
        error!(%command, error = ?err, "failed to normalize command body");
        GatewayError::from(err)
    })?;

    debug!(%command, "dispatching interface command");
    match handler(args).await {
        Ok(Value::Object(fields)) => Ok(Json(fields)),
        Ok(other) => {
            error!(%command, result = %other, "command returned a non-object result");
            Err(GatewayError::NonObjectResult { command })
        }
        Err(err) => {
            error!(%command, error = ?err, "interface command failed");
            Err(GatewayError::Failed(err))
        }
    }
}

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use tracing::warn;

use crate::{app::AppState, config::VectorDbConfig};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/setup-complete", get(setup_complete))
        .route("/system/system-vectors", get(system_vectors))
}

async fn ping() -> Json<Value> {
    Json(json!({ "online": true }))
}

// Secrets are only ever reported as present or absent.
async fn setup_complete(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    let (environment, index, has_key) = match &config.vector_db {
        VectorDbConfig::Pinecone(p) => (p.environment.clone(), p.index.clone(), true),
        VectorDbConfig::Memory { .. } => (None, None, false),
    };

    Json(json!({
        "results": {
            "VectorDB": config.vector_db.backend(),
            "PineConeEnvironment": environment,
            "PineConeIndex": index,
            "PineConeKey": has_key,
            "AuthToken": config.auth_token.is_some(),
        }
    }))
}

async fn system_vectors(State(state): State<AppState>) -> Json<Value> {
    match state.vector_db.index_stats().await {
        Ok(stats) => Json(json!({ "vectorCount": stats.total_vector_count })),
        Err(e) => {
            warn!(error = ?e, "failed to read index stats");
            Json(json!({ "vectorCount": 0, "error": e.to_string() }))
        }
    }
}

use std::sync::Arc;

use axum::{http::StatusCode, middleware::from_fn_with_state, routing::get, Router};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    chat,
    commands::{self, vector_commands, CommandRegistry},
    config::ServerConfig,
    middleware::validated_request,
    system,
    vector_db::VectorDatabase,
    workspace::{self, WorkspaceStore},
};

// ------------------------------------------------------------
// SHARED STATE
// ------------------------------------------------------------
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub vector_db: Arc<dyn VectorDatabase>,
    pub commands: Arc<CommandRegistry>,
    pub workspaces: WorkspaceStore,
}

impl AppState {
    pub fn new(config: ServerConfig, vector_db: Arc<dyn VectorDatabase>) -> Self {
        let commands = vector_commands(Arc::clone(&vector_db));
        Self {
            config: Arc::new(config),
            vector_db,
            commands: Arc::new(commands),
            workspaces: WorkspaceStore::default(),
        }
    }

    #[cfg(test)]
    pub fn with_commands(self, commands: CommandRegistry) -> Self {
        Self {
            commands: Arc::new(commands),
            ..self
        }
    }
}

// ------------------------------------------------------------
// ROUTER
// ------------------------------------------------------------
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .merge(system::router())
        .merge(workspace::router())
        .merge(chat::router())
        .merge(commands::router())
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        // token check runs before every route, including the fallback
        .layer(from_fn_with_state(
            Arc::clone(&state.config),
            validated_request,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::mirror_request())
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> &'static str {
    "Vector gateway is up and running!"
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

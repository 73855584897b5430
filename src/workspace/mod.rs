use axum::{
    routing::{get, post},
    Router,
};

use crate::app::AppState;

pub mod handlers;
pub mod store;

pub use store::WorkspaceStore;

use handlers::{create_workspace, delete_workspace, get_workspace, list_workspaces, update_embeddings};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/workspace/new", post(create_workspace))
        .route("/workspaces", get(list_workspaces))
        .route(
            "/workspace/{slug}",
            get(get_workspace).delete(delete_workspace),
        )
        .route("/workspace/{slug}/update-embeddings", post(update_embeddings))
}

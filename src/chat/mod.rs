use axum::{routing::post, Router};

use crate::app::AppState;

pub mod handlers;

pub fn router() -> Router<AppState> {
    Router::new().route("/workspace/{slug}/chat", post(handlers::workspace_chat))
}

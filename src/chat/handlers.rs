use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    app::AppState,
    body::{lenient, ReqBody},
    vector_db::QueryMatch,
};

const DEFAULT_TOP_K: usize = 4;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "lenient::numbers")]
    pub vector: Vec<f32>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text_response: Option<String>,
    pub sources: Vec<Value>,
    pub close: bool,
    pub error: Option<String>,
}

impl ChatResponse {
    fn abort(error: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: "abort",
            text_response: None,
            sources: Vec::new(),
            close: true,
            error: Some(error.into()),
        }
    }
}

/// Retrieval over the workspace namespace: the caller supplies the embedded
/// query vector and gets back the matching context.
pub async fn workspace_chat(
    Path(slug): Path<String>,
    State(state): State<AppState>,
    body: ReqBody,
) -> Json<ChatResponse> {
    let req: ChatRequest = match body.parse() {
        Ok(req) => req,
        Err(e) => return Json(ChatResponse::abort(e.to_string())),
    };

    if state.workspaces.get(&slug).await.is_none() {
        return Json(ChatResponse::abort(format!(
            "Workspace {slug} is not a valid workspace."
        )));
    }
    if req.message.trim().is_empty() {
        return Json(ChatResponse::abort("Message is empty."));
    }
    if req.vector.is_empty() {
        return Json(ChatResponse::abort("No query vector was provided."));
    }

    let top_k = req.top_k.unwrap_or(DEFAULT_TOP_K).max(1);
    debug!(%slug, top_k, message = %req.message, "workspace chat");

    match state.vector_db.query(&slug, &req.vector, top_k).await {
        Ok(matches) => Json(answer(&req.message, matches)),
        Err(e) => {
            warn!(%slug, error = ?e, "workspace chat query failed");
            Json(ChatResponse::abort(e.to_string()))
        }
    }
}

fn answer(message: &str, matches: Vec<QueryMatch>) -> ChatResponse {
    let context = matches
        .iter()
        .filter_map(|m| m.metadata.as_ref()?.get("text")?.as_str())
        .collect::<Vec<_>>();

    let text_response = if context.is_empty() {
        format!("No relevant context was found for \"{message}\".")
    } else {
        context.join("\n\n")
    };

    let sources = matches
        .into_iter()
        .map(|m| {
            let mut source = match m.metadata {
                Some(Value::Object(fields)) => fields,
                _ => serde_json::Map::new(),
            };
            source.insert("id".into(), json!(m.id));
            source.insert("score".into(), json!(m.score));
            Value::Object(source)
        })
        .collect();

    ChatResponse {
        id: Uuid::new_v4(),
        kind: "textResponse",
        text_response: Some(text_response),
        sources,
        close: true,
        error: None,
    }
}

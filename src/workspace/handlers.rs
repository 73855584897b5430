use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::{app::AppState, body::ReqBody, vector_db::VectorRecord};

#[derive(Debug, Deserialize)]
pub struct NewWorkspaceRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEmbeddingsRequest {
    #[serde(default)]
    pub adds: Vec<VectorRecord>,
    #[serde(default)]
    pub deletes: Vec<String>,
}

fn rejected(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "workspace": null, "message": message.into() })),
    )
}

pub async fn create_workspace(
    State(state): State<AppState>,
    body: ReqBody,
) -> (StatusCode, Json<Value>) {
    let req: NewWorkspaceRequest = match body.parse() {
        Ok(req) => req,
        Err(e) => return rejected(e.to_string()),
    };

    let name = req.name.unwrap_or_default();
    if name.trim().is_empty() {
        return rejected("name required");
    }

    let workspace = state.workspaces.create(&name).await;
    info!(slug = %workspace.slug, "workspace created");
    (
        StatusCode::OK,
        Json(json!({ "workspace": workspace, "message": null })),
    )
}

pub async fn list_workspaces(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "workspaces": state.workspaces.list().await }))
}

pub async fn get_workspace(
    Path(slug): Path<String>,
    State(state): State<AppState>,
) -> Json<Value> {
    Json(json!({ "workspace": state.workspaces.get(&slug).await }))
}

pub async fn update_embeddings(
    Path(slug): Path<String>,
    State(state): State<AppState>,
    body: ReqBody,
) -> (StatusCode, Json<Value>) {
    let Some(workspace) = state.workspaces.get(&slug).await else {
        return rejected(format!("No workspace found for slug {slug}"));
    };
    let req: UpdateEmbeddingsRequest = match body.parse() {
        Ok(req) => req,
        Err(e) => return rejected(e.to_string()),
    };

    let UpdateEmbeddingsRequest { adds, deletes } = req;
    let requested = adds.len();
    let result = async {
        state.vector_db.delete_vectors(&slug, &deletes).await?;
        state.vector_db.upsert(&slug, adds).await
    }
    .await;

    match result {
        Ok(upserted) => {
            info!(%slug, upserted, deleted = deletes.len(), "workspace embeddings updated");
            (
                StatusCode::OK,
                Json(json!({ "workspace": workspace, "message": null })),
            )
        }
        Err(e) => {
            error!(%slug, requested, error = ?e, "failed to update workspace embeddings");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "workspace": workspace, "message": e.to_string() })),
            )
        }
    }
}

pub async fn delete_workspace(
    Path(slug): Path<String>,
    State(state): State<AppState>,
) -> StatusCode {
    if state.workspaces.remove(&slug).await.is_none() {
        return StatusCode::BAD_REQUEST;
    }

    match state.vector_db.has_namespace(&slug).await {
        Ok(true) => {
            if let Err(e) = state.vector_db.delete_namespace(&slug).await {
                warn!(%slug, error = ?e, "workspace removed but its namespace was not");
            }
        }
        Ok(false) => {}
        Err(e) => warn!(%slug, error = ?e, "could not check workspace namespace"),
    }

    info!(%slug, "workspace deleted");
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Request},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::app::{build_router, testing};

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn name_is_required() {
        let app = build_router(testing::memory_state());
        let res = app
            .oneshot(json_request("POST", "/workspace/new", json!({ "name": "" })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            testing::json_body(res).await,
            json!({ "workspace": null, "message": "name required" })
        );
    }

    #[tokio::test]
    async fn workspace_lifecycle_tracks_its_namespace() {
        let state = testing::memory_state();
        let db = state.vector_db.clone();
        let app = build_router(state);

        let res = app
            .clone()
            .oneshot(json_request("POST", "/workspace/new", json!({ "name": "Team Docs" })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let created = testing::json_body(res).await;
        assert_eq!(created["workspace"]["slug"], "team-docs");
        assert_eq!(created["workspace"]["name"], "Team Docs");

        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/workspace/team-docs/update-embeddings",
                json!({
                    "adds": [
                        { "id": "a", "values": [1.0, 0.0] },
                        { "id": "b", "values": [0.0, 1.0] }
                    ],
                    "deletes": []
                }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(db.namespace("team-docs").await.unwrap().unwrap().vector_count, 2);

        let res = app
            .clone()
            .oneshot(json_request("GET", "/workspaces", json!({})))
            .await
            .unwrap();
        let listed = testing::json_body(res).await;
        assert_eq!(listed["workspaces"].as_array().unwrap().len(), 1);

        let res = app
            .clone()
            .oneshot(json_request("DELETE", "/workspace/team-docs", json!({})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(!db.has_namespace("team-docs").await.unwrap());

        let res = app
            .oneshot(json_request("GET", "/workspace/team-docs", json!({})))
            .await
            .unwrap();
        assert_eq!(testing::json_body(res).await, json!({ "workspace": null }));
    }

    #[tokio::test]
    async fn unknown_workspace_is_rejected() {
        let app = build_router(testing::memory_state());

        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/workspace/ghost/update-embeddings",
                json!({ "adds": [] }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = app
            .oneshot(json_request("DELETE", "/workspace/ghost", json!({})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}

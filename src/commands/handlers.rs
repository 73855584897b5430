use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use crate::{
    body::lenient,
    vector_db::{VectorDatabase, VectorRecord},
};

const DEFAULT_TOP_K: usize = 4;

#[derive(Debug, Deserialize)]
struct NamespaceArgs {
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpsertArgs {
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    vectors: Vec<VectorRecord>,
}

#[derive(Debug, Deserialize)]
struct DeleteArgs {
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryArgs {
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default, deserialize_with = "lenient::numbers")]
    vector: Vec<f32>,
    #[serde(default, deserialize_with = "lenient::number")]
    top_k: Option<usize>,
}

fn args<T: DeserializeOwned>(body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| anyhow!("invalid arguments: {e}"))
}

fn required(namespace: Option<String>) -> Result<String> {
    match namespace {
        Some(ns) if !ns.trim().is_empty() => Ok(ns),
        _ => bail!("namespace required"),
    }
}

pub async fn index_stats(db: Arc<dyn VectorDatabase>, _body: Value) -> Result<Value> {
    let stats = db.index_stats().await?;
    Ok(json!({
        "dimension": stats.dimension,
        "totalVectorCount": stats.total_vector_count,
        "namespaceCount": stats.namespaces.len(),
    }))
}

pub async fn namespace_stats(db: Arc<dyn VectorDatabase>, body: Value) -> Result<Value> {
    let namespace = required(args::<NamespaceArgs>(body)?.namespace)?;
    let Some(stats) = db.namespace(&namespace).await? else {
        bail!("Namespace by that name does not exist.");
    };
    Ok(json!({
        "namespace": namespace,
        "vectorCount": stats.vector_count,
    }))
}

pub async fn delete_namespace(db: Arc<dyn VectorDatabase>, body: Value) -> Result<Value> {
    let namespace = required(args::<NamespaceArgs>(body)?.namespace)?;
    let Some(stats) = db.namespace(&namespace).await? else {
        bail!("Namespace by that name does not exist.");
    };
    db.delete_namespace(&namespace).await?;
    Ok(json!({
        "message": format!(
            "Namespace {namespace} was deleted along with {} vectors.",
            stats.vector_count
        ),
    }))
}

pub async fn upsert_vectors(db: Arc<dyn VectorDatabase>, body: Value) -> Result<Value> {
    let UpsertArgs { namespace, vectors } = args(body)?;
    let namespace = required(namespace)?;
    if vectors.is_empty() {
        bail!("vectors required");
    }
    let upserted = db.upsert(&namespace, vectors).await?;
    Ok(json!({ "upsertedCount": upserted }))
}

pub async fn delete_vectors(db: Arc<dyn VectorDatabase>, body: Value) -> Result<Value> {
    let DeleteArgs { namespace, ids } = args(body)?;
    let namespace = required(namespace)?;
    if ids.is_empty() {
        bail!("ids required");
    }
    db.delete_vectors(&namespace, &ids).await?;
    Ok(json!({ "deletedCount": ids.len() }))
}

pub async fn query(db: Arc<dyn VectorDatabase>, body: Value) -> Result<Value> {
    let QueryArgs {
        namespace,
        vector,
        top_k,
    } = args(body)?;
    let namespace = required(namespace)?;
    if vector.is_empty() {
        bail!("vector required");
    }
    let top_k = top_k.unwrap_or(DEFAULT_TOP_K);
    if top_k == 0 {
        bail!("topK must be at least 1");
    }

    let matches = db.query(&namespace, &vector, top_k).await?;
    Ok(json!({ "matches": matches }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_db::MemoryVectorStore;

    fn db() -> Arc<dyn VectorDatabase> {
        Arc::new(MemoryVectorStore::new(None))
    }

    async fn seed(db: &Arc<dyn VectorDatabase>) {
        upsert_vectors(
            Arc::clone(db),
            json!({
                "namespace": "docs",
                "vectors": [
                    { "id": "a", "values": [1.0, 0.0], "metadata": { "text": "alpha" } },
                    { "id": "b", "values": [0.0, 1.0] }
                ]
            }),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn namespace_is_required() {
        let err = namespace_stats(db(), json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "namespace required");

        let err = delete_namespace(db(), json!({ "namespace": "  " }))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "namespace required");
    }

    #[tokio::test]
    async fn unknown_namespace_is_reported() {
        let err = namespace_stats(db(), json!({ "namespace": "ghost" }))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Namespace by that name does not exist.");
    }

    #[tokio::test]
    async fn stats_and_delete_report_vector_counts() {
        let db = db();
        seed(&db).await;

        let stats = namespace_stats(Arc::clone(&db), json!({ "namespace": "docs" }))
            .await
            .unwrap();
        assert_eq!(stats, json!({ "namespace": "docs", "vectorCount": 2 }));

        let totals = index_stats(Arc::clone(&db), json!({})).await.unwrap();
        assert_eq!(
            totals,
            json!({ "dimension": 2, "totalVectorCount": 2, "namespaceCount": 1 })
        );

        let deleted = delete_namespace(Arc::clone(&db), json!({ "namespace": "docs" }))
            .await
            .unwrap();
        assert_eq!(
            deleted["message"],
            "Namespace docs was deleted along with 2 vectors."
        );
        assert!(!db.has_namespace("docs").await.unwrap());
    }

    #[tokio::test]
    async fn query_defaults_top_k_and_returns_metadata() {
        let db = db();
        seed(&db).await;

        let out = query(
            Arc::clone(&db),
            json!({ "namespace": "docs", "vector": [1.0, 0.1] }),
        )
        .await
        .unwrap();
        let matches = out["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0]["id"], "a");
        assert_eq!(matches[0]["metadata"]["text"], "alpha");

        let err = query(db, json!({ "namespace": "docs", "vector": [1.0, 0.0], "topK": 0 }))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "topK must be at least 1");
    }

    #[tokio::test]
    async fn delete_vectors_counts_requested_ids() {
        let db = db();
        seed(&db).await;

        let out = delete_vectors(
            Arc::clone(&db),
            json!({ "namespace": "docs", "ids": ["a"] }),
        )
        .await
        .unwrap();
        assert_eq!(out, json!({ "deletedCount": 1 }));
        assert_eq!(db.namespace("docs").await.unwrap().unwrap().vector_count, 1);
    }

    #[tokio::test]
    async fn non_object_arguments_are_rejected() {
        let err = upsert_vectors(db(), json!(["not", "an", "object"]))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("invalid arguments"));
    }
}

use std::{collections::BTreeMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{body::lenient, config::VectorDbConfig};

pub mod memory;
pub mod pinecone;

pub use memory::MemoryVectorStore;
pub use pinecone::PineconeClient;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceStats {
    #[serde(default)]
    pub vector_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    #[serde(default)]
    pub dimension: Option<usize>,
    #[serde(default)]
    pub total_vector_count: u64,
    #[serde(default)]
    pub namespaces: BTreeMap<String, NamespaceStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    #[serde(deserialize_with = "lenient::numbers")]
    pub values: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// A vector index partitioned into namespaces.
///
/// Implementations own their concurrency discipline; callers may invoke any
/// method from many requests at once.
#[async_trait]
pub trait VectorDatabase: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn index_stats(&self) -> Result<IndexStats>;

    async fn namespace(&self, namespace: &str) -> Result<Option<NamespaceStats>> {
        let mut stats = self.index_stats().await?;
        Ok(stats.namespaces.remove(namespace))
    }

    async fn has_namespace(&self, namespace: &str) -> Result<bool> {
        Ok(self.namespace(namespace).await?.is_some())
    }

    /// Returns the number of records written.
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<usize>;

    async fn delete_vectors(&self, namespace: &str, ids: &[String]) -> Result<()>;

    async fn delete_namespace(&self, namespace: &str) -> Result<()>;

    /// Nearest neighbours of `vector`, best match first.
    async fn query(&self, namespace: &str, vector: &[f32], top_k: usize)
        -> Result<Vec<QueryMatch>>;
}

pub fn connect(config: &VectorDbConfig) -> Arc<dyn VectorDatabase> {
    match config {
        VectorDbConfig::Pinecone(pinecone) => Arc::new(PineconeClient::new(pinecone)),
        VectorDbConfig::Memory { dimension } => Arc::new(MemoryVectorStore::new(*dimension)),
    }
}

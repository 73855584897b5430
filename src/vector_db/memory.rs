use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{IndexStats, NamespaceStats, QueryMatch, VectorDatabase, VectorRecord};

#[derive(Debug, Default)]
struct Inner {
    dimension: Option<usize>,
    namespaces: HashMap<String, HashMap<String, VectorRecord>>,
}

/// Process-local vector index. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    inner: RwLock<Inner>,
}

impl MemoryVectorStore {
    pub fn new(dimension: Option<usize>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                dimension,
                namespaces: HashMap::new(),
            }),
        }
    }
}

#[async_trait]
impl VectorDatabase for MemoryVectorStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn index_stats(&self) -> Result<IndexStats> {
        let inner = self.inner.read().await;
        let namespaces = inner
            .namespaces
            .iter()
            .map(|(name, records)| {
                (
                    name.clone(),
                    NamespaceStats {
                        vector_count: records.len() as u64,
                    },
                )
            })
            .collect::<std::collections::BTreeMap<_, _>>();

        Ok(IndexStats {
            dimension: inner.dimension,
            total_vector_count: namespaces.values().map(|n| n.vector_count).sum(),
            namespaces,
        })
    }

    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut inner = self.inner.write().await;
        let dimension = match inner.dimension {
            Some(dim) => dim,
            None => records[0].values.len(),
        };
        if dimension == 0 {
            bail!("vector `{}` has no values", records[0].id);
        }
        for record in &records {
            if record.id.is_empty() {
                bail!("vector id must not be empty");
            }
            if record.values.iter().any(|v| !v.is_finite()) {
                bail!("vector `{}` has non-finite values", record.id);
            }
            if record.values.len() != dimension {
                bail!(
                    "vector `{}` has dimension {} but the index expects {dimension}",
                    record.id,
                    record.values.len()
                );
            }
        }

        inner.dimension = Some(dimension);
        let count = records.len();
        let slot = inner.namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            slot.insert(record.id.clone(), record);
        }
        Ok(count)
    }

    async fn delete_vectors(&self, namespace: &str, ids: &[String]) -> Result<()> {
        let mut inner = self.inner.write().await;
        let drained = match inner.namespaces.get_mut(namespace) {
            Some(records) => {
                for id in ids {
                    records.remove(id);
                }
                records.is_empty()
            }
            None => false,
        };
        if drained {
            inner.namespaces.remove(namespace);
        }
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        self.inner.write().await.namespaces.remove(namespace);
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        if vector.iter().any(|v| !v.is_finite()) {
            bail!("query vector has non-finite values");
        }
        let inner = self.inner.read().await;
        if let Some(dim) = inner.dimension {
            if vector.len() != dim {
                bail!(
                    "query vector has dimension {} but the index expects {dim}",
                    vector.len()
                );
            }
        }

        let Some(records) = inner.namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut matches = records
            .values()
            .map(|r| QueryMatch {
                id: r.id.clone(),
                score: cosine_similarity(vector, &r.values),
                metadata: r.metadata.clone(),
            })
            .collect::<Vec<_>>();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        matches.truncate(top_k);
        Ok(matches)
    }
}

// Accumulates in f64 so large finite components cannot overflow to inf.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, values: &[f32]) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            values: values.to_vec(),
            metadata: Some(json!({ "text": id })),
        }
    }

    #[tokio::test]
    async fn stats_track_namespaces() {
        let store = MemoryVectorStore::new(None);
        store
            .upsert("docs", vec![record("a", &[1.0, 0.0]), record("b", &[0.0, 1.0])])
            .await
            .unwrap();
        store.upsert("notes", vec![record("c", &[1.0, 1.0])]).await.unwrap();

        let stats = store.index_stats().await.unwrap();
        assert_eq!(stats.dimension, Some(2));
        assert_eq!(stats.total_vector_count, 3);
        assert_eq!(stats.namespaces["docs"].vector_count, 2);
        assert!(store.has_namespace("notes").await.unwrap());
        assert!(!store.has_namespace("missing").await.unwrap());

        store.delete_namespace("notes").await.unwrap();
        assert!(store.namespace("notes").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_dimension_mismatch() {
        let store = MemoryVectorStore::new(Some(3));
        let err = store
            .upsert("docs", vec![record("a", &[1.0, 0.0])])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("expects 3"));
        assert_eq!(store.index_stats().await.unwrap().total_vector_count, 0);

        assert!(store.query("docs", &[1.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn query_orders_by_similarity_then_id() {
        let store = MemoryVectorStore::new(None);
        store
            .upsert(
                "docs",
                vec![
                    record("far", &[0.0, 1.0]),
                    record("near-b", &[1.0, 0.0]),
                    record("near-a", &[2.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let matches = store.query("docs", &[1.0, 0.0], 2).await.unwrap();
        let ids = matches.iter().map(|m| m.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["near-a", "near-b"]);
        assert!((matches[0].score - 1.0).abs() < 1e-6);

        assert!(store.query("other", &[1.0, 0.0], 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overflowing_components_are_rejected() {
        let store = MemoryVectorStore::new(None);
        let overflow: Vec<f32> = serde_json::from_value(json!([1e39, 1.0])).unwrap();
        assert!(overflow[0].is_infinite());

        let err = store
            .upsert("docs", vec![record("ok", &[1.0, 2.0]), record("big", &overflow)])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("non-finite"));
        assert!(!store.has_namespace("docs").await.unwrap());

        assert!(store.query("docs", &[f32::NAN, 1.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn huge_finite_components_still_rank() {
        let store = MemoryVectorStore::new(None);
        let records = (0..200)
            .map(|i| {
                let values = if i % 3 == 0 { [3e38, 1.0] } else { [1.0, 2.0] };
                record(&format!("v{i:03}"), &values)
            })
            .collect();
        store.upsert("docs", records).await.unwrap();

        let matches = store.query("docs", &[1.0, 2.0], 5).await.unwrap();
        assert_eq!(matches.len(), 5);
        assert!(matches.iter().all(|m| m.score.is_finite()));
        assert_eq!(matches[0].id, "v001");
        assert!((matches[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn deleting_last_vector_drops_namespace() {
        let store = MemoryVectorStore::new(None);
        store.upsert("docs", vec![record("a", &[1.0])]).await.unwrap();
        store
            .delete_vectors("docs", &["a".to_string(), "ghost".to_string()])
            .await
            .unwrap();
        assert!(!store.has_namespace("docs").await.unwrap());
        assert_eq!(store.upsert("docs", Vec::new()).await.unwrap(), 0);
        assert!(!store.has_namespace("docs").await.unwrap());
    }
}

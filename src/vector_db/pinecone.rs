use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{IndexStats, QueryMatch, VectorDatabase, VectorRecord};
use crate::config::PineconeConfig;

/// REST client for a single Pinecone index.
///
/// The index host is either configured directly (`PINECONE_INDEX_HOST`) or
/// resolved on first use from the environment's controller and cached for
/// the life of the process.
pub struct PineconeClient {
    client: reqwest::Client,
    api_key: String,
    environment: Option<String>,
    index: Option<String>,
    host: OnceCell<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertRequest<'a> {
    namespace: &'a str,
    vectors: &'a [VectorRecord],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    namespace: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ids: Option<&'a [String]>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    delete_all: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    namespace: &'a str,
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct WhoAmI {
    project_name: String,
}

impl PineconeClient {
    pub fn new(config: &PineconeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            environment: config.environment.clone(),
            index: config.index.clone(),
            host: OnceCell::new_with(config.index_host.as_deref().map(normalize_host)),
        }
    }

    async fn host(&self) -> Result<&str> {
        self.host
            .get_or_try_init(|| self.resolve_host())
            .await
            .map(String::as_str)
    }

    async fn resolve_host(&self) -> Result<String> {
        let environment = self
            .environment
            .as_deref()
            .ok_or_else(|| anyhow!("PINECONE_ENVIRONMENT is not configured"))?;
        let index = self
            .index
            .as_deref()
            .ok_or_else(|| anyhow!("PINECONE_INDEX is not configured"))?;

        let url = format!("https://controller.{environment}.pinecone.io/actions/whoami");
        let response = self
            .client
            .get(&url)
            .header("Api-Key", &self.api_key)
            .send()
            .await
            .with_context(|| format!("failed to reach {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("pinecone_error: whoami returned {status}: {text}"));
        }

        let whoami: WhoAmI = response.json().await?;
        let host = format!(
            "https://{index}-{}.svc.{environment}.pinecone.io",
            whoami.project_name
        );
        info!(%host, "resolved pinecone index host");
        Ok(host)
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.host().await?);
        debug!(%url, "pinecone request");

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to reach {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("pinecone_error: {path} returned {status}: {text}"));
        }

        response
            .json()
            .await
            .with_context(|| format!("unexpected response body from {path}"))
    }
}

#[async_trait]
impl VectorDatabase for PineconeClient {
    fn backend(&self) -> &'static str {
        "pinecone"
    }

    async fn index_stats(&self) -> Result<IndexStats> {
        self.post("/describe_index_stats", &serde_json::json!({}))
            .await
    }

    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let res: UpsertResponse = self
            .post(
                "/vectors/upsert",
                &UpsertRequest {
                    namespace,
                    vectors: &records,
                },
            )
            .await?;
        Ok(res.upserted_count)
    }

    async fn delete_vectors(&self, namespace: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let _: serde_json::Value = self
            .post(
                "/vectors/delete",
                &DeleteRequest {
                    namespace,
                    ids: Some(ids),
                    delete_all: false,
                },
            )
            .await?;
        Ok(())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post(
                "/vectors/delete",
                &DeleteRequest {
                    namespace,
                    ids: None,
                    delete_all: true,
                },
            )
            .await?;
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        let res: QueryResponse = self
            .post(
                "/query",
                &QueryRequest {
                    namespace,
                    vector,
                    top_k,
                    include_metadata: true,
                    include_values: false,
                },
            )
            .await?;
        Ok(res.matches)
    }
}

fn normalize_host(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

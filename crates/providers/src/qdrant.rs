use crate::ProviderError;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
}

/// Thin REST client for the Qdrant collections and points API.
#[derive(Clone)]
pub struct QdrantClient {
    client: Client,
    cfg: QdrantConfig,
}

impl QdrantClient {
    pub fn new(cfg: QdrantConfig) -> Self {
        Self {
            client: Client::new(),
            cfg,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.cfg.url.trim_end_matches('/'), path)
    }

    async fn send(&self, mut builder: RequestBuilder) -> Result<Response, ProviderError> {
        if let Some(key) = &self.cfg.api_key {
            builder = builder.header("api-key", key);
        }
        builder
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))
    }

    async fn fail(resp: Response) -> ProviderError {
        let status = resp.status();
        let body = resp.bytes().await.unwrap_or(Bytes::from_static(b""));
        ProviderError::RequestFailed(format!("status {} body {:?}", status, body))
    }

    /// Creates a cosine collection. Returns `false` when it already existed.
    pub async fn create_collection(&self, name: &str, dim: usize) -> Result<bool, ProviderError> {
        #[derive(Serialize)]
        struct VectorParams {
            size: usize,
            distance: &'static str,
        }
        #[derive(Serialize)]
        struct CreateCollection {
            vectors: VectorParams,
        }
        let body = CreateCollection {
            vectors: VectorParams {
                size: dim,
                distance: "Cosine",
            },
        };
        let resp = self
            .send(self.client.put(self.url(&format!("/collections/{}", name))).json(&body))
            .await?;
        if resp.status().is_success() {
            return Ok(true);
        }
        if resp.status() == StatusCode::CONFLICT {
            debug!(collection = name, "collection already exists");
            return Ok(false);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if body.contains("already exists") {
            debug!(collection = name, "collection already exists");
            return Ok(false);
        }
        Err(ProviderError::RequestFailed(format!(
            "status {} body {}",
            status, body
        )))
    }

    pub async fn delete_collection(&self, name: &str) -> Result<(), ProviderError> {
        let resp = self
            .send(self.client.delete(self.url(&format!("/collections/{}", name))))
            .await?;
        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(Self::fail(resp).await)
    }

    pub async fn list_collections(&self) -> Result<Vec<String>, ProviderError> {
        let resp = self.send(self.client.get(self.url("/collections"))).await?;
        if !resp.status().is_success() {
            return Err(Self::fail(resp).await);
        }
        let parsed: QdrantCollectionsResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Ok(parsed
            .result
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    pub async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> Result<QdrantSearchResponse, ProviderError> {
        #[derive(Serialize)]
        struct SearchRequest {
            vector: Vec<f32>,
            limit: u64,
            with_payload: bool,
        }
        let url = self.url(&format!("/collections/{}/points/search", collection));
        let body = SearchRequest {
            vector,
            limit,
            with_payload: true,
        };
        let resp = self.send(self.client.post(url).json(&body)).await?;
        if !resp.status().is_success() {
            return Err(Self::fail(resp).await);
        }
        let parsed: QdrantSearchResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Ok(parsed)
    }

    pub async fn upsert(
        &self,
        collection: &str,
        points: Vec<QdrantPoint>,
    ) -> Result<(), ProviderError> {
        let url = self.url(&format!("/collections/{}/points?wait=true", collection));
        let req = QdrantUpsert { points };
        let resp = self.send(self.client.put(url).json(&req)).await?;
        if !resp.status().is_success() {
            return Err(Self::fail(resp).await);
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct QdrantUpsert {
    pub points: Vec<QdrantPoint>,
}

#[derive(Debug, Serialize)]
pub struct QdrantPoint {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct QdrantSearchResponse {
    pub result: Vec<SearchResult>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SearchResult {
    pub id: serde_json::Value,
    pub score: f32,
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct QdrantCollectionsResponse {
    result: CollectionList,
}

#[derive(Debug, Deserialize)]
struct CollectionList {
    collections: Vec<CollectionDescription>,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_response_parses_numeric_ids() {
        let raw = r#"{"result":[{"id":7,"score":0.82,"payload":{"kind":"cell"}}],"status":"ok","time":0.001}"#;
        let parsed: QdrantSearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.result[0].id.as_u64(), Some(7));
        assert!(parsed.result[0].payload.is_some());
    }

    #[test]
    fn collections_response_parses_names() {
        let raw = r#"{"result":{"collections":[{"name":"csv_chunks"}]},"status":"ok"}"#;
        let parsed: QdrantCollectionsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.result.collections[0].name, "csv_chunks");
    }
}

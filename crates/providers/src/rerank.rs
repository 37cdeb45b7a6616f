use crate::{CrossEncoder, ProviderError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cross-encoder served behind a `/rerank` endpoint (text-embeddings-inference style).
#[derive(Clone)]
pub struct RerankConfig {
    pub base_url: String,
    pub model: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Clone)]
pub struct HttpCrossEncoder {
    client: Client,
    cfg: Arc<RerankConfig>,
}

impl HttpCrossEncoder {
    pub fn new(cfg: RerankConfig) -> Self {
        Self {
            client: Client::new(),
            cfg: Arc::new(cfg),
        }
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    raw_scores: bool,
}

#[derive(Debug, Deserialize)]
struct RankedText {
    index: usize,
    score: f32,
}

#[async_trait::async_trait]
impl CrossEncoder for HttpCrossEncoder {
    async fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>, ProviderError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let body = RerankRequest {
            query,
            texts: candidates,
            model: self.cfg.model.as_deref(),
            raw_scores: true,
        };
        let mut builder = self
            .client
            .post(format!("{}/rerank", self.cfg.base_url.trim_end_matches('/')))
            .json(&body);
        if let Some(key) = &self.cfg.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed(format!(
                "status {} body {}",
                status, text
            )));
        }
        let ranked: Vec<RankedText> = resp
            .json()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        scores_by_index(ranked, candidates.len())
    }
}

/// The service answers sorted by score; put scores back in candidate order.
fn scores_by_index(ranked: Vec<RankedText>, expected: usize) -> Result<Vec<f32>, ProviderError> {
    let mut scores: Vec<Option<f32>> = vec![None; expected];
    for r in ranked {
        let slot = scores.get_mut(r.index).ok_or_else(|| {
            ProviderError::InvalidResponse(format!("rerank index {} out of range", r.index))
        })?;
        *slot = Some(r.score);
    }
    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            s.ok_or_else(|| ProviderError::InvalidResponse(format!("no score for candidate {}", i)))
        })
        .collect()
}

//! Provider abstractions for embeddings, cross-encoders and the vector index service.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod hashing;
pub mod openai;
pub mod qdrant;
pub mod rerank;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not implemented")]
    NotImplemented,
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub vectors: Vec<Vec<f32>>,
}

/// Text to fixed-width vector. Implementations must preserve input order.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError>;

    /// Vector width when it is known up front.
    fn dimension(&self) -> Option<usize> {
        None
    }
}

/// Pairwise (query, candidate) relevance model.
///
/// Returns one score per candidate, in candidate order.
#[async_trait::async_trait]
pub trait CrossEncoder: Send + Sync {
    async fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>, ProviderError>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    embeddings: HashMap<String, Arc<dyn EmbeddingProvider>>,
    cross_encoders: HashMap<String, Arc<dyn CrossEncoder>>,
    pub preferred_embedding: Option<String>,
    pub preferred_cross_encoder: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedding(mut self, name: &str, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings.insert(name.to_string(), provider);
        self
    }

    pub fn with_cross_encoder(mut self, name: &str, provider: Arc<dyn CrossEncoder>) -> Self {
        self.cross_encoders.insert(name.to_string(), provider);
        self
    }

    pub fn set_preferred_embedding(mut self, name: &str) -> Self {
        self.preferred_embedding = Some(name.to_string());
        self
    }

    pub fn set_preferred_cross_encoder(mut self, name: &str) -> Self {
        self.preferred_cross_encoder = Some(name.to_string());
        self
    }

    pub fn embedding(
        &self,
        name: Option<&str>,
    ) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
        let key = name
            .map(str::to_string)
            .or_else(|| self.preferred_embedding.clone())
            .ok_or_else(|| {
                ProviderError::UnknownProvider("no embedding provider configured".into())
            })?;
        self.embeddings
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownProvider(key))
    }

    /// The preferred cross-encoder, if one is configured and registered.
    ///
    /// Absence is not an error: re-ranking is optional.
    pub fn cross_encoder(&self) -> Option<Arc<dyn CrossEncoder>> {
        self.preferred_cross_encoder
            .as_ref()
            .and_then(|name| self.cross_encoders.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::HashEmbedder;

    #[test]
    fn registry_resolves_preferred_embedding() {
        let reg = ProviderRegistry::new()
            .with_embedding("hash", Arc::new(HashEmbedder::new(16)))
            .set_preferred_embedding("hash");
        let provider = reg.embedding(None).unwrap();
        assert_eq!(provider.dimension(), Some(16));
        assert!(matches!(
            reg.embedding(Some("openai")),
            Err(ProviderError::UnknownProvider(name)) if name == "openai"
        ));
    }

    #[test]
    fn missing_cross_encoder_is_none() {
        let reg = ProviderRegistry::new().set_preferred_cross_encoder("tei");
        assert!(reg.cross_encoder().is_none());
    }
}

use anyhow::Context;
use providers::EmbeddingProvider;

#[derive(Debug, Clone)]
pub struct EmbeddingRequest {
    pub texts: Vec<String>,
    /// Texts per provider call; `None` sends everything at once.
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub vectors: Vec<Vec<f32>>,
}

impl EmbeddingResult {
    pub fn dimension(&self) -> Option<usize> {
        self.vectors.first().map(Vec::len)
    }
}

/// Embeds texts in order, checking the provider returned one vector per text
/// and that all vectors share a width.
pub async fn embed(
    req: EmbeddingRequest,
    provider: &dyn EmbeddingProvider,
) -> anyhow::Result<EmbeddingResult> {
    let batch_size = req.batch_size.filter(|b| *b > 0).unwrap_or(req.texts.len().max(1));
    let mut vectors = Vec::with_capacity(req.texts.len());
    for batch in req.texts.chunks(batch_size) {
        let resp = provider.embed(batch).await.context("embedding call failed")?;
        anyhow::ensure!(
            resp.vectors.len() == batch.len(),
            "embedding provider returned {} vectors for {} texts",
            resp.vectors.len(),
            batch.len()
        );
        vectors.extend(resp.vectors);
    }
    if let Some(width) = vectors.first().map(Vec::len) {
        anyhow::ensure!(width > 0, "embedding provider returned empty vectors");
        anyhow::ensure!(
            vectors.iter().all(|v| v.len() == width),
            "embedding provider returned vectors of mixed width"
        );
    }
    Ok(EmbeddingResult { vectors })
}

/// One query vector.
pub async fn embed_query(text: &str, provider: &dyn EmbeddingProvider) -> anyhow::Result<Vec<f32>> {
    let result = embed(
        EmbeddingRequest {
            texts: vec![text.to_string()],
            batch_size: None,
        },
        provider,
    )
    .await?;
    result
        .vectors
        .into_iter()
        .next()
        .context("embedding provider returned no vector for the query")
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::hashing::HashEmbedder;
    use providers::{EmbedResponse, ProviderError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        inner: HashEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for Counting {
        async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(texts).await
        }
    }

    struct Short;

    #[async_trait::async_trait]
    impl EmbeddingProvider for Short {
        async fn embed(&self, _texts: &[String]) -> Result<EmbedResponse, ProviderError> {
            Ok(EmbedResponse { vectors: vec![] })
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text {}", i)).collect()
    }

    #[tokio::test]
    async fn single_call_without_batch_size() {
        let provider = Counting {
            inner: HashEmbedder::new(8),
            calls: AtomicUsize::new(0),
        };
        let out = embed(
            EmbeddingRequest {
                texts: texts(7),
                batch_size: None,
            },
            &provider,
        )
        .await
        .unwrap();
        assert_eq!(out.vectors.len(), 7);
        assert_eq!(out.dimension(), Some(8));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn batches_preserve_order() {
        let provider = Counting {
            inner: HashEmbedder::new(8),
            calls: AtomicUsize::new(0),
        };
        let input = texts(5);
        let out = embed(
            EmbeddingRequest {
                texts: input.clone(),
                batch_size: Some(2),
            },
            &provider,
        )
        .await
        .unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert_eq!(out.vectors[4], provider.inner.embed_one(&input[4]));
    }

    #[tokio::test]
    async fn count_mismatch_is_an_error() {
        let err = embed_query("anything", &Short).await.unwrap_err();
        assert!(err.to_string().contains("0 vectors for 1 texts"));
    }
}

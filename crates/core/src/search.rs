//! Semantic search stage: one query embedding, a broad nearest-neighbour fetch,
//! best-effort cross-encoder re-ranking, then truncation to `k`.

use crate::chunker::{ChunkKind, ChunkMetadata};
use crate::embeddings;
use crate::vectorstore::VectorIndex;
use providers::{CrossEncoder, EmbeddingProvider};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Chunk-level hit for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub source_file: String,
    pub score: f32,
    pub kind: ChunkKind,
    pub metadata: ChunkMetadata,
    /// Chunk id in the collection.
    pub index: u64,
}

#[derive(Clone)]
pub struct SemanticSearch {
    embedder: Arc<dyn EmbeddingProvider>,
    cross_encoder: Option<Arc<dyn CrossEncoder>>,
    index: Arc<dyn VectorIndex>,
}

impl SemanticSearch {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            cross_encoder: None,
            index,
        }
    }

    pub fn with_cross_encoder(mut self, cross_encoder: Option<Arc<dyn CrossEncoder>>) -> Self {
        self.cross_encoder = cross_encoder;
        self
    }

    pub async fn search(
        &self,
        query: &str,
        k: usize,
        collection: &str,
        prefetch: usize,
    ) -> anyhow::Result<Vec<Candidate>> {
        let vector = embeddings::embed_query(query, self.embedder.as_ref()).await?;
        let limit = prefetch.max(k);
        let hits = self.index.query(collection, &vector, limit).await?;
        let mut candidates: Vec<Candidate> = hits
            .into_iter()
            .map(|hit| Candidate {
                source_file: hit.payload.source_file().to_string(),
                score: hit.score,
                kind: hit.payload.kind(),
                metadata: hit.payload,
                index: hit.id,
            })
            .collect();
        debug!(query, fetched = candidates.len(), limit, "vector candidates");

        if let Some(encoder) = &self.cross_encoder {
            if candidates.len() > 1 {
                if let Err(e) = rerank(encoder.as_ref(), query, &mut candidates).await {
                    warn!(error = %e, "re-ranking skipped, keeping vector order");
                }
            }
        }

        candidates.truncate(k);
        Ok(candidates)
    }
}

/// Replaces scores with cross-encoder scores and re-sorts. Leaves the candidates
/// untouched on any failure.
async fn rerank(
    encoder: &dyn CrossEncoder,
    query: &str,
    candidates: &mut [Candidate],
) -> anyhow::Result<()> {
    let texts: Vec<String> = candidates
        .iter()
        .map(|c| c.metadata.rerank_text())
        .collect();
    let scores = encoder.score(query, &texts).await?;
    anyhow::ensure!(
        scores.len() == candidates.len(),
        "cross-encoder returned {} scores for {} candidates",
        scores.len(),
        candidates.len()
    );
    anyhow::ensure!(
        scores.iter().all(|s| s.is_finite()),
        "cross-encoder returned a non-finite score"
    );
    for (c, s) in candidates.iter_mut().zip(scores) {
        c.score = s;
    }
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(())
}

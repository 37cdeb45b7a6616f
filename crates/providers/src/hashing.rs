//! Deterministic feature-hashing embeddings.
//!
//! No model download and no network: every token is hashed into one of `dimension`
//! signed buckets and the result is L2-normalised. Good enough for offline use and
//! for tests that need stable similarity scores.

use crate::{EmbedResponse, EmbeddingProvider, ProviderError};

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];
        for token in tokens(text) {
            let digest = blake3::hash(token.as_bytes());
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&digest.as_bytes()[..8]);
            let h = u64::from_le_bytes(bytes);
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

/// Lowercased alphanumeric runs, plus hyphenated compounds such as ISO dates.
fn tokens(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut out: Vec<String> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    for word in lower.split(|c: char| c.is_whitespace() || c == ',' || c == '|') {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        if word.contains('-') {
            out.push(word.to_string());
        }
    }
    out
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        Ok(EmbedResponse {
            vectors: texts.iter().map(|t| self.embed_one(t)).collect(),
        })
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }
}

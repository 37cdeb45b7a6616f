//! The vector index contract and its two backends: Qdrant over REST and an
//! in-process index for single-process use and tests.

use crate::chunker::ChunkMetadata;
use anyhow::Context;
use providers::qdrant::{QdrantClient, QdrantPoint};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: ChunkMetadata,
}

#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub id: u64,
    pub score: f32,
    pub payload: ChunkMetadata,
}

/// Cosine-metric nearest-neighbour service over named collections.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Creating an existing collection is a no-op.
    async fn create_collection(&self, name: &str, dim: usize) -> anyhow::Result<()>;
    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> anyhow::Result<()>;
    /// Best match first.
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> anyhow::Result<Vec<ScoredRecord>>;
    async fn list_collections(&self) -> anyhow::Result<Vec<String>>;
    /// Deleting a missing collection is a no-op.
    async fn delete_collection(&self, name: &str) -> anyhow::Result<()>;

    /// Whether collections outlive the process.
    fn is_persistent(&self) -> bool {
        true
    }
}

struct MemoryCollection {
    dim: usize,
    points: BTreeMap<u64, (Vec<f32>, ChunkMetadata)>,
}

/// Brute-force in-process index. Ties are broken by ascending id so results are stable.
#[derive(Default)]
pub struct MemoryIndex {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait::async_trait]
impl VectorIndex for MemoryIndex {
    async fn create_collection(&self, name: &str, dim: usize) -> anyhow::Result<()> {
        let mut guard = self
            .collections
            .write()
            .map_err(|_| anyhow::anyhow!("vector index lock poisoned"))?;
        guard.entry(name.to_string()).or_insert_with(|| {
            debug!(collection = name, dim, "created collection");
            MemoryCollection {
                dim,
                points: BTreeMap::new(),
            }
        });
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> anyhow::Result<()> {
        let mut guard = self
            .collections
            .write()
            .map_err(|_| anyhow::anyhow!("vector index lock poisoned"))?;
        let coll = guard
            .get_mut(collection)
            .with_context(|| format!("collection {} does not exist", collection))?;
        for r in &records {
            anyhow::ensure!(
                r.vector.len() == coll.dim,
                "vector width {} does not match collection width {}",
                r.vector.len(),
                coll.dim
            );
        }
        for r in records {
            coll.points.insert(r.id, (r.vector, r.payload));
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> anyhow::Result<Vec<ScoredRecord>> {
        let guard = self
            .collections
            .read()
            .map_err(|_| anyhow::anyhow!("vector index lock poisoned"))?;
        let coll = guard
            .get(collection)
            .with_context(|| format!("collection {} does not exist", collection))?;
        let mut scored: Vec<ScoredRecord> = coll
            .points
            .iter()
            .map(|(id, (v, payload))| ScoredRecord {
                id: *id,
                score: cosine(vector, v),
                payload: payload.clone(),
            })
            .collect();
        // BTreeMap iteration is id-ascending and the sort is stable.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn list_collections(&self) -> anyhow::Result<Vec<String>> {
        let guard = self
            .collections
            .read()
            .map_err(|_| anyhow::anyhow!("vector index lock poisoned"))?;
        let mut names: Vec<String> = guard.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_collection(&self, name: &str) -> anyhow::Result<()> {
        let mut guard = self
            .collections
            .write()
            .map_err(|_| anyhow::anyhow!("vector index lock poisoned"))?;
        guard.remove(name);
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

pub struct QdrantStore {
    client: QdrantClient,
}

impl QdrantStore {
    pub fn new(client: QdrantClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl VectorIndex for QdrantStore {
    async fn create_collection(&self, name: &str, dim: usize) -> anyhow::Result<()> {
        if self.client.create_collection(name, dim).await? {
            debug!(collection = name, dim, "created collection");
        }
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: Vec<VectorRecord>) -> anyhow::Result<()> {
        let points = records
            .into_iter()
            .map(|r| {
                Ok(QdrantPoint {
                    id: r.id,
                    vector: r.vector,
                    payload: serde_json::to_value(&r.payload)?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        self.client.upsert(collection, points).await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> anyhow::Result<Vec<ScoredRecord>> {
        let resp = self
            .client
            .search(collection, vector.to_vec(), limit as u64)
            .await?;
        let mut out = Vec::with_capacity(resp.result.len());
        for hit in resp.result {
            let Some(id) = hit.id.as_u64() else {
                warn!(id = %hit.id, "skipping point with non-numeric id");
                continue;
            };
            let payload = match hit
                .payload
                .map(serde_json::from_value::<ChunkMetadata>)
                .transpose()
            {
                Ok(Some(p)) => p,
                Ok(None) => {
                    warn!(id, "skipping point without payload");
                    continue;
                }
                Err(e) => {
                    warn!(id, error = %e, "skipping point with unrecognised payload");
                    continue;
                }
            };
            out.push(ScoredRecord {
                id,
                score: hit.score,
                payload,
            });
        }
        Ok(out)
    }

    async fn list_collections(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.client.list_collections().await?)
    }

    async fn delete_collection(&self, name: &str) -> anyhow::Result<()> {
        Ok(self.client.delete_collection(name).await?)
    }
}

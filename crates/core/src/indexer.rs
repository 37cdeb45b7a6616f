//! Ingest path: load, chunk, embed, upsert, one file at a time.

use crate::chunker::{build_chunks, Chunk, ChunkOptions};
use crate::config::SchemaConfig;
use crate::dataset::{source_name, Dataset};
use crate::embeddings::{self, EmbeddingRequest};
use crate::schema::DatasetSchema;
use crate::vectorstore::{VectorIndex, VectorRecord};
use anyhow::Context;
use providers::EmbeddingProvider;
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::models::IngestedFile;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub total_chunks: usize,
    pub embedding_dimension: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionSummary {
    pub path: String,
    pub source_file: String,
    pub collection: String,
    pub first_chunk_id: u64,
    pub total_chunks: usize,
    pub total_rows: usize,
    pub total_columns: usize,
    pub embedding_dimension: usize,
    pub schema: DatasetSchema,
}

/// Per-file result; a failed file carries its error instead of a summary.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum IngestOutcome {
    Ingested(IngestionSummary),
    Failed { path: String, error: String },
}

impl IngestOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, IngestOutcome::Ingested(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub chunking: ChunkOptions,
    pub schema: SchemaConfig,
    /// Files under this directory are named by their relative path.
    pub root: Option<PathBuf>,
}

pub struct Indexer {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    collection: String,
    batch_size: Option<usize>,
}

impl Indexer {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            index,
            collection: collection.into(),
            batch_size: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: Option<usize>) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Embeds every chunk and upserts it, creating the collection on first use.
    pub async fn index(&self, chunks: &[Chunk]) -> anyhow::Result<IndexSummary> {
        if chunks.is_empty() {
            return Ok(IndexSummary {
                total_chunks: 0,
                embedding_dimension: self.embedder.dimension().unwrap_or(0),
            });
        }
        let embedded = embeddings::embed(
            EmbeddingRequest {
                texts: chunks.iter().map(|c| c.text.clone()).collect(),
                batch_size: self.batch_size,
            },
            self.embedder.as_ref(),
        )
        .await?;
        let dim = embedded.dimension().unwrap_or(0);
        self.index
            .create_collection(&self.collection, dim)
            .await
            .with_context(|| format!("create collection {}", self.collection))?;

        let records = chunks
            .iter()
            .zip(embedded.vectors)
            .map(|(chunk, vector)| VectorRecord {
                id: chunk.id,
                vector,
                payload: chunk.metadata.clone(),
            })
            .collect();
        self.index
            .upsert(&self.collection, records)
            .await
            .with_context(|| format!("upsert into {}", self.collection))?;

        Ok(IndexSummary {
            total_chunks: chunks.len(),
            embedding_dimension: dim,
        })
    }

    pub async fn ingest_file(
        &self,
        path: &Path,
        start_id: u64,
        opts: &IngestOptions,
    ) -> anyhow::Result<IngestionSummary> {
        let mut dataset =
            Dataset::from_path(path).with_context(|| format!("load {}", path.display()))?;
        dataset.name = source_name(path, opts.root.as_deref());
        let recorded = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let schema = DatasetSchema::resolve(&dataset, &opts.schema);
        let chunks = build_chunks(&dataset, &dataset.name, start_id, &opts.chunking);
        let summary = self.index(&chunks).await?;
        Ok(IngestionSummary {
            path: recorded.display().to_string(),
            source_file: dataset.name.clone(),
            collection: self.collection.clone(),
            first_chunk_id: start_id,
            total_chunks: summary.total_chunks,
            total_rows: dataset.len(),
            total_columns: dataset.columns.len(),
            embedding_dimension: summary.embedding_dimension,
            schema,
        })
    }

    /// Ingests files in order starting at `start_id`. A failing file is reported and
    /// skipped without consuming ids. With a ledger, each success is recorded as it lands.
    ///
    /// Returns the outcomes and the next unused id. A ledger write that fails aborts the
    /// batch: the file's chunks are already in the index, and an unrecorded watermark
    /// would hand the same ids out again.
    pub async fn ingest(
        &self,
        paths: &[PathBuf],
        start_id: u64,
        opts: &IngestOptions,
        ledger: Option<&SqlitePool>,
    ) -> anyhow::Result<(Vec<IngestOutcome>, u64)> {
        let mut outcomes = Vec::with_capacity(paths.len());
        let mut next_id = start_id;
        for path in paths {
            match self.ingest_file(path, next_id, opts).await {
                Ok(summary) => {
                    info!(
                        file = %summary.source_file,
                        chunks = summary.total_chunks,
                        rows = summary.total_rows,
                        columns = summary.total_columns,
                        "ingested"
                    );
                    if let Some(pool) = ledger {
                        record(pool, &summary).await.with_context(|| {
                            format!(
                                "record {} (chunk ids {}..{}) in the ledger",
                                summary.source_file,
                                summary.first_chunk_id,
                                summary.first_chunk_id + summary.total_chunks as u64
                            )
                        })?;
                    }
                    next_id += summary.total_chunks as u64;
                    outcomes.push(IngestOutcome::Ingested(summary));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %format!("{:#}", e), "ingestion failed");
                    outcomes.push(IngestOutcome::Failed {
                        path: path.display().to_string(),
                        error: format!("{:#}", e),
                    });
                }
            }
        }
        Ok((outcomes, next_id))
    }
}

async fn record(pool: &SqlitePool, summary: &IngestionSummary) -> anyhow::Result<()> {
    let file = IngestedFile {
        collection: summary.collection.clone(),
        source_file: summary.source_file.clone(),
        path: summary.path.clone(),
        first_chunk_id: summary.first_chunk_id as i64,
        last_chunk_id: summary.first_chunk_id as i64 + summary.total_chunks as i64 - 1,
        total_rows: summary.total_rows as i64,
        total_columns: summary.total_columns as i64,
        schema_json: serde_json::to_string(&summary.schema)?,
    };
    storage::ledger::record_ingestion(pool, &file).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorstore::MemoryIndex;
    use providers::hashing::HashEmbedder;
    use std::fs;

    fn indexer(index: Arc<MemoryIndex>) -> Indexer {
        Indexer::new(Arc::new(HashEmbedder::new(32)), index, "c")
    }

    #[tokio::test]
    async fn names_follow_the_data_root() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("data");
        fs::create_dir_all(root.join("hr")).unwrap();
        let nested = root.join("hr").join("payroll.csv");
        fs::write(&nested, "id,name\n1,Ana\n").unwrap();

        let opts = IngestOptions {
            root: Some(root.clone()),
            ..Default::default()
        };
        let summary = indexer(Arc::new(MemoryIndex::new()))
            .ingest_file(&nested, 1, &opts)
            .await
            .unwrap();
        assert_eq!(summary.source_file, "hr/payroll.csv");
        assert!(Path::new(&summary.path).is_absolute());
    }

    #[tokio::test]
    async fn ledger_failure_aborts_the_batch() {
        let temp = tempfile::tempdir().unwrap();
        let a = temp.path().join("a.csv");
        let b = temp.path().join("b.csv");
        fs::write(&a, "id,v\n1,x\n").unwrap();
        fs::write(&b, "id,v\n1,y\n").unwrap();
        // Never migrated, so every ledger write fails.
        let db = temp.path().join("empty.db");
        let pool = storage::connect(&db.to_string_lossy()).await.unwrap();

        let index = Arc::new(MemoryIndex::new());
        let result = indexer(index.clone())
            .ingest(&[a, b], 1, &IngestOptions::default(), Some(&pool))
            .await;
        assert!(result.is_err());
        // The second file was never touched.
        let hits = index.query("c", &HashEmbedder::new(32).embed_one("y"), 10).await.unwrap();
        assert!(hits.iter().all(|h| h.payload.source_file() == "a.csv"));
    }

    #[tokio::test]
    async fn failed_files_consume_no_ids_without_a_ledger() {
        let temp = tempfile::tempdir().unwrap();
        let good = temp.path().join("good.csv");
        fs::write(&good, "id,v\n1,x\n2,y\n").unwrap();
        let missing = temp.path().join("missing.csv");

        let (outcomes, next) = indexer(Arc::new(MemoryIndex::new()))
            .ingest(&[missing, good], 7, &IngestOptions::default(), None)
            .await
            .unwrap();
        assert!(!outcomes[0].is_ok());
        assert!(outcomes[1].is_ok());
        // Two cells and one window.
        assert_eq!(next, 10);
    }
}

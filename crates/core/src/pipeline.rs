use crate::chunker::ChunkOptions;
use crate::config::AppConfig;
use crate::dataset::DirectorySource;
use crate::indexer::{IngestOptions, IngestOutcome, IngestionSummary, Indexer};
use crate::rows::{ResultRow, RowRetrieval, RowRetriever};
use crate::schema::{DatasetSchema, SchemaCatalog};
use crate::search::{Candidate, SemanticSearch};
use crate::vectorstore::{MemoryIndex, QdrantStore, VectorIndex};
use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use providers::hashing::HashEmbedder;
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::qdrant::{QdrantClient, QdrantConfig};
use providers::rerank::{self, HttpCrossEncoder};
use providers::{CrossEncoder, EmbeddingProvider, ProviderRegistry};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use storage::{connect, ledger, migrate};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub fn build_registry(config: &AppConfig) -> ProviderRegistry {
    let mut reg = ProviderRegistry::new().with_embedding(
        "hash",
        Arc::new(HashEmbedder::new(config.embeddings.dimension)),
    );

    if let (Some(key), Some(base)) = (
        std::env::var_os("OPENAI_API_KEY"),
        std::env::var_os("OPENAI_BASE_URL"),
    ) {
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: key.to_string_lossy().into_owned(),
            base_url: base.to_string_lossy().into_owned(),
            embedding_model: config.embeddings.model.clone(),
        });
        reg = reg.with_embedding("openai", Arc::new(provider));
    }

    if config.rerank.enabled {
        match &config.rerank.url {
            Some(url) => {
                let encoder = HttpCrossEncoder::new(rerank::RerankConfig {
                    base_url: url.clone(),
                    model: config.rerank.model.clone(),
                    api_key: std::env::var("RERANK_API_KEY").ok(),
                });
                reg = reg
                    .with_cross_encoder("http", Arc::new(encoder))
                    .set_preferred_cross_encoder("http");
            }
            None => warn!("rerank.enabled is set without rerank.url; re-ranking stays off"),
        }
    }

    reg.set_preferred_embedding(&config.embeddings.provider)
}

pub fn build_vector_index(config: &AppConfig) -> Arc<dyn VectorIndex> {
    match config.vectors.provider.as_str() {
        "qdrant" => {
            if let Some(url) = &config.vectors.url {
                let client = QdrantClient::new(QdrantConfig {
                    url: url.clone(),
                    api_key: std::env::var("QDRANT_API_KEY").ok(),
                });
                return Arc::new(QdrantStore::new(client));
            }
            warn!("vectors.provider is qdrant but vectors.url is unset; using the in-memory index");
            Arc::new(MemoryIndex::new())
        }
        "memory" => Arc::new(MemoryIndex::new()),
        other => {
            warn!(provider = other, "unknown vector provider; using the in-memory index");
            Arc::new(MemoryIndex::new())
        }
    }
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(Glob::new(pat).with_context(|| format!("bad data pattern {}", pat))?);
    }
    Ok(builder.build()?)
}

/// Dataset files under `[data] dir` whose file name matches `[data] patterns`, sorted by path.
pub fn discover_files(config: &AppConfig) -> anyhow::Result<Vec<PathBuf>> {
    let root = Path::new(&config.data.dir);
    if !root.is_dir() {
        warn!(dir = %root.display(), "data directory not found");
        return Ok(Vec::new());
    }
    let patterns = build_globset(&config.data.patterns)?;
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() && patterns.is_match(entry.file_name()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    debug!(count = files.len(), dir = %root.display(), "discovered datasets");
    Ok(files)
}

/// Ingestions this engine made without writing the ledger.
#[derive(Debug, Default)]
struct Unrecorded {
    next_id: u64,
    files: Vec<IngestionSummary>,
}

/// Long-lived wiring: ledger, providers and the vector index for one process.
///
/// The vector index lives as long as the engine, so an in-memory index keeps
/// ingested chunks across calls on the same engine.
pub struct Engine {
    config: AppConfig,
    pool: SqlitePool,
    embedder: Arc<dyn EmbeddingProvider>,
    cross_encoder: Option<Arc<dyn CrossEncoder>>,
    index: Arc<dyn VectorIndex>,
    unrecorded: Mutex<HashMap<String, Unrecorded>>,
}

impl Engine {
    pub async fn open(config: AppConfig) -> anyhow::Result<Self> {
        let pool = connect(&config.database.path).await.context("db connect")?;
        migrate(&pool).await.context("db migrate")?;
        let registry = build_registry(&config);
        let embedder = registry
            .embedding(None)
            .context("resolve embedding provider")?;
        let index = build_vector_index(&config);
        Ok(Self {
            cross_encoder: registry.cross_encoder(),
            config,
            pool,
            embedder,
            index,
            unrecorded: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = index;
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn with_cross_encoder(mut self, cross_encoder: Option<Arc<dyn CrossEncoder>>) -> Self {
        self.cross_encoder = cross_encoder;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn collection(&self) -> &str {
        &self.config.vectors.collection
    }

    /// Default ingest options from `[chunking]` and `[schema]`.
    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            chunking: ChunkOptions::from(&self.config.chunking),
            schema: self.config.schema.clone(),
            root: Some(PathBuf::from(&self.config.data.dir)),
        }
    }

    /// Ingests `paths` (or the discovered data directory when empty) into `collection`,
    /// continuing chunk ids from the ledger.
    pub async fn ingest(
        &self,
        paths: &[PathBuf],
        collection: &str,
        opts: &IngestOptions,
    ) -> anyhow::Result<Vec<IngestOutcome>> {
        self.ingest_into(paths, collection, opts, true).await
    }

    async fn ingest_into(
        &self,
        paths: &[PathBuf],
        collection: &str,
        opts: &IngestOptions,
        recorded: bool,
    ) -> anyhow::Result<Vec<IngestOutcome>> {
        let discovered;
        let paths = if paths.is_empty() {
            discovered = discover_files(&self.config)?;
            discovered.as_slice()
        } else {
            paths
        };
        let floor = self.with_unrecorded(|u| u.get(collection).map_or(0, |c| c.next_id))?;
        let start_id = ledger::next_chunk_id(&self.pool, collection).await?.max(floor);
        let indexer = Indexer::new(self.embedder.clone(), self.index.clone(), collection)
            .with_batch_size(self.config.embeddings.batch_size);
        let record_in = recorded.then_some(&self.pool);
        let (outcomes, next_id) = indexer.ingest(paths, start_id, opts, record_in).await?;
        self.with_unrecorded(|u| {
            let entry = u.entry(collection.to_string()).or_default();
            entry.next_id = entry.next_id.max(next_id);
            if !recorded {
                entry.files.extend(outcomes.iter().filter_map(|o| match o {
                    IngestOutcome::Ingested(s) => Some(s.clone()),
                    IngestOutcome::Failed { .. } => None,
                }));
            }
        })?;
        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(
            collection,
            files = outcomes.len(),
            failed,
            recorded,
            first_id = start_id,
            next_id,
            "ingest finished"
        );
        Ok(outcomes)
    }

    fn with_unrecorded<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Unrecorded>) -> T,
    ) -> anyhow::Result<T> {
        let mut guard = self
            .unrecorded
            .lock()
            .map_err(|_| anyhow::anyhow!("unrecorded ingest state poisoned"))?;
        Ok(f(&mut guard))
    }

    /// Drops the vector collection and its ledger rows; chunk ids restart at 1.
    pub async fn reset(&self, collection: &str) -> anyhow::Result<()> {
        self.index
            .delete_collection(collection)
            .await
            .with_context(|| format!("delete collection {}", collection))?;
        ledger::reset(&self.pool, collection).await?;
        self.with_unrecorded(|u| u.remove(collection))?;
        info!(collection, "collection reset");
        Ok(())
    }

    pub async fn list_collections(&self) -> anyhow::Result<Vec<String>> {
        self.index.list_collections().await
    }

    /// Makes sure `collection` exists, ingesting the data directory when it does not.
    /// Returns whether the collection is queryable afterwards.
    ///
    /// A bootstrap into an index that does not outlive the process stays out of the
    /// ledger; its chunks and ids are only tracked by this engine.
    async fn ensure_collection(&self, collection: &str) -> anyhow::Result<bool> {
        if self.has_collection(collection).await? {
            return Ok(true);
        }
        let recorded = self.index.is_persistent();
        info!(collection, recorded, "collection missing; ingesting data directory first");
        self.ingest_into(&[], collection, &self.ingest_options(), recorded)
            .await?;
        self.has_collection(collection).await
    }

    async fn has_collection(&self, collection: &str) -> anyhow::Result<bool> {
        Ok(self
            .list_collections()
            .await?
            .iter()
            .any(|c| c == collection))
    }

    /// Schema roles recorded at ingestion, keyed by source file.
    pub async fn load_catalog(&self, collection: &str) -> anyhow::Result<SchemaCatalog> {
        Ok(self.ingested_files(collection).await?.0)
    }

    /// Schema catalog and dataset source for the files ingested into `collection`.
    /// Each source file reloads from the path it was ingested from.
    async fn ingested_files(
        &self,
        collection: &str,
    ) -> anyhow::Result<(SchemaCatalog, DirectorySource)> {
        let mut catalog = SchemaCatalog::new(self.config.schema.clone());
        let mut source = DirectorySource::new(&self.config.data.dir);
        for file in ledger::latest_files(&self.pool, collection).await? {
            match serde_json::from_str::<DatasetSchema>(&file.schema_json) {
                Ok(schema) => catalog.insert(file.source_file.clone(), schema),
                Err(e) => warn!(file = %file.source_file, error = %e, "ignoring stored schema"),
            }
            source.insert(file.source_file, file.path);
        }
        self.with_unrecorded(|u| {
            for file in u.get(collection).map(|c| c.files.as_slice()).unwrap_or_default() {
                catalog.insert(file.source_file.clone(), file.schema.clone());
                source.insert(file.source_file.clone(), file.path.clone());
            }
        })?;
        Ok((catalog, source))
    }

    fn semantic_search(&self) -> SemanticSearch {
        SemanticSearch::new(self.embedder.clone(), self.index.clone())
            .with_cross_encoder(self.cross_encoder.clone())
    }

    pub async fn search(
        &self,
        query: &str,
        k: usize,
        prefetch: usize,
    ) -> anyhow::Result<Vec<Candidate>> {
        let collection = self.collection();
        if !self.ensure_collection(collection).await? {
            return Ok(Vec::new());
        }
        self.semantic_search()
            .search(query, k, collection, prefetch)
            .await
    }

    pub async fn retrieve_rows(&self, query: &str, k: usize) -> anyhow::Result<RowRetrieval> {
        let collection = self.collection();
        if !self.ensure_collection(collection).await? {
            return Ok(RowRetrieval::empty());
        }
        let (catalog, source) = self.ingested_files(collection).await?;
        let retriever = RowRetriever::new(
            self.semantic_search(),
            Arc::new(source),
            catalog,
            collection,
        );
        retriever
            .retrieve(query, k, self.config.retrieval.row_prefetch)
            .await
    }

    pub async fn find_rows(&self, query: &str, k: usize) -> anyhow::Result<Vec<ResultRow>> {
        Ok(self.retrieve_rows(query, k).await?.rows)
    }
}

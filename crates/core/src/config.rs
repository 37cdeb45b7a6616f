use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub data: DataConfig,
    pub embeddings: EmbeddingConfig,
    pub vectors: VectorConfig,
    pub rerank: RerankConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub schema: SchemaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/tabrag.db".to_string(),
        }
    }
}

/// Where source datasets live; the source of truth for query-time reloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub dir: String,
    pub patterns: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: "archives".to_string(),
            patterns: vec!["*.csv".to_string(), "*.tsv".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    /// Width of the hash provider's vectors.
    pub dimension: usize,
    /// Texts per embed call; unset embeds a whole file in one call.
    pub batch_size: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hash".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 384,
            batch_size: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    pub provider: String,
    pub url: Option<String>,
    pub collection: String,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            provider: "memory".to_string(),
            url: None,
            collection: "csv_chunks".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub enabled: bool,
    pub url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub identifier_column: String,
    pub window_size: usize,
    pub include_cells: bool,
    pub include_windows: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            identifier_column: "id".to_string(),
            window_size: 20,
            include_cells: true,
            include_windows: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub k: usize,
    /// Candidate pool for plain semantic search.
    pub prefetch: usize,
    /// Candidate pool for row retrieval.
    pub row_prefetch: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 10,
            prefetch: 30,
            row_prefetch: 50,
        }
    }
}

/// Ordered candidate column names for each dataset role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub entity_columns: Vec<String>,
    pub period_columns: Vec<String>,
    pub date_columns: Vec<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(|n| n.to_string()).collect();
        Self {
            entity_columns: owned(&["name", "nome", "full_name", "employee_name"]),
            period_columns: owned(&["competency", "competencia", "competência", "period"]),
            date_columns: owned(&["payment_date", "data_pagamento", "paid_at"]),
        }
    }
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("TABRAG")
            .prefix_separator("__")
            .separator("__"),
    );
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("tabrag.toml");
        fs::write(
            &path,
            "[chunking]\nwindow_size = 5\n\n[vectors]\ncollection = \"payroll\"\n",
        )
        .unwrap();
        let cfg = load(Some(&path.to_string_lossy())).unwrap();
        assert_eq!(cfg.chunking.window_size, 5);
        assert_eq!(cfg.chunking.identifier_column, "id");
        assert_eq!(cfg.vectors.collection, "payroll");
        assert_eq!(cfg.vectors.provider, "memory");
        assert_eq!(cfg.retrieval.row_prefetch, 50);
        assert_eq!(cfg.schema.date_columns[0], "payment_date");
    }
}

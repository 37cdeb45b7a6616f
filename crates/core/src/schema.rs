//! Column roles the row-expansion heuristics rely on, resolved once per dataset.

use crate::config::SchemaConfig;
use crate::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Optional named roles for a dataset's columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Identifies the entity a row belongs to (a person's name, say).
    pub entity_column: Option<String>,
    /// Reference period as an ISO-like `YYYY-MM` string.
    pub period_column: Option<String>,
    /// Exact date as `YYYY-MM-DD`.
    pub date_column: Option<String>,
}

impl DatasetSchema {
    /// First configured candidate present in the dataset wins, compared case-insensitively.
    pub fn resolve(dataset: &Dataset, cfg: &SchemaConfig) -> Self {
        Self {
            entity_column: pick(dataset, &cfg.entity_columns),
            period_column: pick(dataset, &cfg.period_columns),
            date_column: pick(dataset, &cfg.date_columns),
        }
    }
}

fn pick(dataset: &Dataset, candidates: &[String]) -> Option<String> {
    candidates.iter().find_map(|want| {
        dataset
            .columns
            .iter()
            .find(|c| c.trim().eq_ignore_ascii_case(want.trim()))
            .cloned()
    })
}

/// Schemas by source file name, plus the candidates used for files it has not seen.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    known: HashMap<String, DatasetSchema>,
    fallback: SchemaConfig,
}

impl SchemaCatalog {
    pub fn new(fallback: SchemaConfig) -> Self {
        Self {
            known: HashMap::new(),
            fallback,
        }
    }

    pub fn insert(&mut self, source_file: impl Into<String>, schema: DatasetSchema) {
        self.known.insert(source_file.into(), schema);
    }

    pub fn schema_for(&self, dataset: &Dataset) -> DatasetSchema {
        self.known
            .get(&dataset.name)
            .cloned()
            .unwrap_or_else(|| DatasetSchema::resolve(dataset, &self.fallback))
    }
}

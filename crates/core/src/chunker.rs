//! Turns a dataset into cell chunks and row-window chunks.
//!
//! Every chunk's text carries the file name and header so it embeds as a
//! self-describing unit. The metadata points back at the source rows and is
//! what the vector index stores as payload; the text itself is not stored.

use crate::config::ChunkingConfig;
use crate::dataset::{Dataset, MISSING_VALUE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Cell,
    RowWindow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkMetadata {
    Cell {
        source_file: String,
        row_id: String,
        column_name: String,
        row_index: usize,
        original_value: Option<String>,
    },
    /// `row_start..=row_end`, both inclusive.
    RowWindow {
        source_file: String,
        row_start: usize,
        row_end: usize,
    },
}

impl ChunkMetadata {
    pub fn source_file(&self) -> &str {
        match self {
            ChunkMetadata::Cell { source_file, .. } | ChunkMetadata::RowWindow { source_file, .. } => {
                source_file
            }
        }
    }

    pub fn kind(&self) -> ChunkKind {
        match self {
            ChunkMetadata::Cell { .. } => ChunkKind::Cell,
            ChunkMetadata::RowWindow { .. } => ChunkKind::RowWindow,
        }
    }

    /// Compact text rebuilt from the payload alone, for cross-encoder scoring.
    pub fn rerank_text(&self) -> String {
        match self {
            ChunkMetadata::Cell {
                row_id,
                column_name,
                original_value,
                ..
            } => format!(
                "Row ID: {} | Column: {} | Value: {}",
                row_id,
                column_name,
                original_value.as_deref().unwrap_or(MISSING_VALUE)
            ),
            ChunkMetadata::RowWindow {
                source_file,
                row_start,
                row_end,
            } => format!("Rows {}–{} in file {}", row_start, row_end, source_file),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: u64,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone)]
pub struct ChunkOptions {
    pub identifier_column: String,
    /// Rows per window; 0 disables windows.
    pub window_size: usize,
    pub include_cells: bool,
    pub include_windows: bool,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self::from(&ChunkingConfig::default())
    }
}

impl From<&ChunkingConfig> for ChunkOptions {
    fn from(cfg: &ChunkingConfig) -> Self {
        Self {
            identifier_column: cfg.identifier_column.clone(),
            window_size: cfg.window_size,
            include_cells: cfg.include_cells,
            include_windows: cfg.include_windows,
        }
    }
}

/// Cell chunks (row-major) then window chunks, ids assigned from `start_id`.
pub fn build_chunks(
    dataset: &Dataset,
    filename: &str,
    start_id: u64,
    opts: &ChunkOptions,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut next_id = start_id;
    let header = dataset.header_line();

    if opts.include_cells {
        for row in 0..dataset.len() {
            let row_line = dataset.row_line(row).unwrap_or_default();
            let row_id = dataset
                .value(row, &opts.identifier_column)
                .and_then(|v| v.text())
                .unwrap_or_else(|| (row + 1).to_string());
            for (col, column_name) in dataset.columns.iter().enumerate() {
                if *column_name == opts.identifier_column {
                    continue;
                }
                let original_value = dataset.rows[row][col].text();
                let text = format!(
                    "CSV: {}\nHeader: {}\nRow ID: {} | Column: {}\nValue: {}\nRow: {}",
                    filename,
                    header,
                    row_id,
                    column_name,
                    original_value.as_deref().unwrap_or(MISSING_VALUE),
                    row_line
                );
                chunks.push(Chunk {
                    id: next_id,
                    text,
                    metadata: ChunkMetadata::Cell {
                        source_file: filename.to_string(),
                        row_id: row_id.clone(),
                        column_name: column_name.clone(),
                        row_index: row,
                        original_value,
                    },
                });
                next_id += 1;
            }
        }
    }

    if opts.include_windows && opts.window_size > 0 {
        let total = dataset.len();
        for start in (0..total).step_by(opts.window_size) {
            let end = (start + opts.window_size).min(total);
            let lines = (start..end)
                .filter_map(|r| dataset.row_line(r))
                .collect::<Vec<_>>()
                .join("\n");
            let text = format!(
                "CSV: {}\nHeader: {}\nRows {}-{}:\n{}",
                filename,
                header,
                start + 1,
                end,
                lines
            );
            chunks.push(Chunk {
                id: next_id,
                text,
                metadata: ChunkMetadata::RowWindow {
                    source_file: filename.to_string(),
                    row_start: start,
                    row_end: end - 1,
                },
            });
            next_id += 1;
        }
    }

    chunks
}

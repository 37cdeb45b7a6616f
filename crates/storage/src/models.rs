use serde::{Deserialize, Serialize};

/// One file's ingestion into one collection.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IngestedFile {
    pub collection: String,
    pub source_file: String,
    pub path: String,
    pub first_chunk_id: i64,
    pub last_chunk_id: i64,
    pub total_rows: i64,
    pub total_columns: i64,
    pub schema_json: String,
}

//! Chunk-id ledger: which ids each collection has handed out, and what was ingested.

use crate::models::IngestedFile;
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// First chunk id that has never been used in `collection`.
pub async fn next_chunk_id(pool: &SqlitePool, collection: &str) -> anyhow::Result<u64> {
    let row = sqlx::query("SELECT next_chunk_id FROM collections WHERE name = ?1")
        .bind(collection)
        .fetch_optional(pool)
        .await?;
    let next = match row {
        Some(r) => r.try_get::<i64, _>("next_chunk_id")?,
        None => 1,
    };
    Ok(next.max(1) as u64)
}

/// Records a finished file and moves the collection's id watermark past it.
pub async fn record_ingestion(pool: &SqlitePool, file: &IngestedFile) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO ingested_files
            (collection, source_file, path, first_chunk_id, last_chunk_id, total_rows, total_columns, schema_json)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&file.collection)
    .bind(&file.source_file)
    .bind(&file.path)
    .bind(file.first_chunk_id)
    .bind(file.last_chunk_id)
    .bind(file.total_rows)
    .bind(file.total_columns)
    .bind(&file.schema_json)
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        r#"
        INSERT INTO collections (name, next_chunk_id) VALUES (?1, ?2)
        ON CONFLICT(name) DO UPDATE SET
            next_chunk_id = MAX(next_chunk_id, excluded.next_chunk_id)
        "#,
    )
    .bind(&file.collection)
    .bind(file.last_chunk_id + 1)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    debug!(
        collection = %file.collection,
        file = %file.source_file,
        first = file.first_chunk_id,
        last = file.last_chunk_id,
        "ledger updated"
    );
    Ok(())
}

/// Most recent ingestion per source file in `collection`, ordered by file name.
pub async fn latest_files(pool: &SqlitePool, collection: &str) -> anyhow::Result<Vec<IngestedFile>> {
    let rows = sqlx::query_as::<_, IngestedFile>(
        r#"
        SELECT collection, source_file, path, first_chunk_id, last_chunk_id,
               total_rows, total_columns, schema_json
        FROM ingested_files f
        WHERE collection = ?1
          AND id = (SELECT MAX(id) FROM ingested_files g
                    WHERE g.collection = f.collection AND g.source_file = f.source_file)
        ORDER BY source_file
        "#,
    )
    .bind(collection)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Forgets everything recorded for `collection`; numbering restarts at 1.
pub async fn reset(pool: &SqlitePool, collection: &str) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM ingested_files WHERE collection = ?1")
        .bind(collection)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM collections WHERE name = ?1")
        .bind(collection)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

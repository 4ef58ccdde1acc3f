//! Reading progress persistence
//!
//! One record per source (upsert). Only the most recently saved
//! `PROGRESS_HISTORY_LIMIT` records are kept; older ones are evicted.

use crate::error::{Error, Result};
use readion_common::models::PROGRESS_HISTORY_LIMIT;
use readion_common::ReadingProgress;
use sqlx::{Executor, Pool, Sqlite};
use uuid::Uuid;

/// Get saved progress for a source
pub async fn get_progress(db: &Pool<Sqlite>, source_id: Uuid) -> Result<Option<ReadingProgress>> {
    let row: Option<(String, i64, i64)> = sqlx::query_as(
        "SELECT source_guid, position, saved_at_ms FROM reading_progress WHERE source_guid = ?",
    )
    .bind(source_id.to_string())
    .fetch_optional(db)
    .await?;

    row.map(row_to_progress).transpose()
}

/// Save progress, replacing any earlier record for the same source
///
/// Evicts the oldest records beyond the history limit in the same
/// transaction.
pub async fn save_progress(db: &Pool<Sqlite>, progress: &ReadingProgress) -> Result<()> {
    let mut tx = db.begin().await?;

    let position = i64::try_from(progress.position)
        .map_err(|_| Error::InvalidData(format!("Position out of range: {}", progress.position)))?;

    sqlx::query(
        r#"
        INSERT INTO reading_progress (source_guid, position, saved_at_ms, seq)
        VALUES (?, ?, ?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM reading_progress))
        ON CONFLICT(source_guid) DO UPDATE SET
            position = excluded.position,
            saved_at_ms = excluded.saved_at_ms,
            seq = excluded.seq
        "#,
    )
    .bind(progress.source_id.to_string())
    .bind(position)
    .bind(progress.timestamp.timestamp_millis())
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        DELETE FROM reading_progress
        WHERE source_guid NOT IN (
            SELECT source_guid FROM reading_progress ORDER BY seq DESC LIMIT ?
        )
        "#,
    )
    .bind(PROGRESS_HISTORY_LIMIT as i64)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// All retained progress records, most recently saved first
pub async fn list_progress(db: &Pool<Sqlite>) -> Result<Vec<ReadingProgress>> {
    let rows: Vec<(String, i64, i64)> = sqlx::query_as(
        "SELECT source_guid, position, saved_at_ms FROM reading_progress ORDER BY seq DESC",
    )
    .fetch_all(db)
    .await?;

    rows.into_iter().map(row_to_progress).collect()
}

/// Remove saved progress for a source
///
/// Accepts a pool or an open transaction so source deletion can drop the
/// progress in the same commit.
pub async fn delete_progress<'e, E>(executor: E, source_id: Uuid) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("DELETE FROM reading_progress WHERE source_guid = ?")
        .bind(source_id.to_string())
        .execute(executor)
        .await?;
    Ok(())
}

fn row_to_progress((guid, position, saved_at_ms): (String, i64, i64)) -> Result<ReadingProgress> {
    let source_id = Uuid::parse_str(&guid)
        .map_err(|e| Error::InvalidData(format!("Invalid source id '{}': {}", guid, e)))?;
    let position = usize::try_from(position)
        .map_err(|_| Error::InvalidData(format!("Negative position for {}", guid)))?;

    Ok(ReadingProgress {
        source_id,
        position,
        timestamp: readion_common::time::from_millis(saved_at_ms),
    })
}

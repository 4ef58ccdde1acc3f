//! Recent text sources
//!
//! Keeps the last `RECENT_SOURCES_LIMIT` texts the user opened so reading
//! can be picked up later. Deleting a source also forgets its progress.

use crate::db::progress::delete_progress;
use crate::error::{Error, Result};
use readion_common::models::RECENT_SOURCES_LIMIT;
use readion_common::{SourceKind, TextSource};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

type SourceRow = (String, String, String, String, i64);

/// Insert or replace a source and mark it most recently opened
///
/// Sources beyond the recent limit are removed together with their progress.
pub async fn save_source(db: &Pool<Sqlite>, source: &TextSource) -> Result<()> {
    let mut tx = db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO text_sources (guid, kind, title, content, created_at_ms, opened_seq)
        VALUES (?, ?, ?, ?, ?, (SELECT COALESCE(MAX(opened_seq), 0) + 1 FROM text_sources))
        ON CONFLICT(guid) DO UPDATE SET
            kind = excluded.kind,
            title = excluded.title,
            content = excluded.content,
            opened_seq = excluded.opened_seq
        "#,
    )
    .bind(source.id.to_string())
    .bind(source.kind.to_string())
    .bind(&source.title)
    .bind(&source.content)
    .bind(source.timestamp.timestamp_millis())
    .execute(&mut *tx)
    .await?;

    let evicted: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT guid FROM text_sources
        WHERE guid NOT IN (
            SELECT guid FROM text_sources ORDER BY opened_seq DESC LIMIT ?
        )
        "#,
    )
    .bind(RECENT_SOURCES_LIMIT as i64)
    .fetch_all(&mut *tx)
    .await?;

    for guid in &evicted {
        sqlx::query("DELETE FROM text_sources WHERE guid = ?")
            .bind(guid)
            .execute(&mut *tx)
            .await?;
        let id = Uuid::parse_str(guid)
            .map_err(|e| Error::InvalidData(format!("Invalid source id '{}': {}", guid, e)))?;
        delete_progress(&mut *tx, id).await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Recent sources, most recently opened first
pub async fn list_sources(db: &Pool<Sqlite>) -> Result<Vec<TextSource>> {
    let rows: Vec<SourceRow> = sqlx::query_as(
        r#"
        SELECT guid, kind, title, content, created_at_ms
        FROM text_sources
        ORDER BY opened_seq DESC
        "#,
    )
    .fetch_all(db)
    .await?;

    rows.into_iter().map(row_to_source).collect()
}

/// Look up one source by id
pub async fn get_source(db: &Pool<Sqlite>, id: Uuid) -> Result<Option<TextSource>> {
    let row: Option<SourceRow> = sqlx::query_as(
        "SELECT guid, kind, title, content, created_at_ms FROM text_sources WHERE guid = ?",
    )
    .bind(id.to_string())
    .fetch_optional(db)
    .await?;

    row.map(row_to_source).transpose()
}

/// Delete a source and its reading progress
///
/// Returns `Error::NotFound` if no such source exists.
pub async fn delete_source(db: &Pool<Sqlite>, id: Uuid) -> Result<()> {
    let mut tx = db.begin().await?;

    let deleted = sqlx::query("DELETE FROM text_sources WHERE guid = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(Error::NotFound(format!("Text source {}", id)));
    }

    delete_progress(&mut *tx, id).await?;

    tx.commit().await?;
    Ok(())
}

fn row_to_source((guid, kind, title, content, created_at_ms): SourceRow) -> Result<TextSource> {
    let id = Uuid::parse_str(&guid)
        .map_err(|e| Error::InvalidData(format!("Invalid source id '{}': {}", guid, e)))?;
    let kind = kind.parse::<SourceKind>()?;

    Ok(TextSource {
        id,
        kind,
        title,
        content,
        timestamp: readion_common::time::from_millis(created_at_ms),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::progress::{get_progress, save_progress};
    use readion_common::db::init_memory_database;
    use readion_common::ReadingProgress;

    fn source(title: &str) -> TextSource {
        TextSource::new(SourceKind::Manual, title, format!("{} text. More text.", title))
    }

    #[tokio::test]
    async fn test_save_and_get_source() {
        let db = init_memory_database().await.unwrap();
        let original = source("Alpha");

        save_source(&db, &original).await.unwrap();

        let loaded = get_source(&db, original.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Alpha");
        assert_eq!(loaded.content, original.content);
        assert_eq!(loaded.kind, SourceKind::Manual);
    }

    #[tokio::test]
    async fn test_list_is_most_recent_first_and_upserts() {
        let db = init_memory_database().await.unwrap();
        let a = source("A");
        let b = source("B");

        save_source(&db, &a).await.unwrap();
        save_source(&db, &b).await.unwrap();
        // Reopening A moves it to the front without duplicating it
        save_source(&db, &a).await.unwrap();

        let titles: Vec<String> = list_sources(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_recent_limit_evicts_oldest_with_progress() {
        let db = init_memory_database().await.unwrap();
        let first = source("first");
        save_source(&db, &first).await.unwrap();
        save_progress(&db, &ReadingProgress::new(first.id, 1)).await.unwrap();

        for i in 0..RECENT_SOURCES_LIMIT {
            save_source(&db, &source(&format!("s{}", i))).await.unwrap();
        }

        assert_eq!(list_sources(&db).await.unwrap().len(), RECENT_SOURCES_LIMIT);
        assert!(get_source(&db, first.id).await.unwrap().is_none());
        assert!(get_progress(&db, first.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_source_removes_progress() {
        let db = init_memory_database().await.unwrap();
        let s = source("gone");
        save_source(&db, &s).await.unwrap();
        save_progress(&db, &ReadingProgress::new(s.id, 2)).await.unwrap();

        delete_source(&db, s.id).await.unwrap();

        assert!(get_source(&db, s.id).await.unwrap().is_none());
        assert!(get_progress(&db, s.id).await.unwrap().is_none());
        assert!(matches!(
            delete_source(&db, s.id).await,
            Err(Error::NotFound(_))
        ));
    }
}

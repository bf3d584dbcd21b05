//! Storage for the virtual filesystem's denormalized facet index.

use crate::db::engine::DbEngine;
use crate::models::FuseEntry;
use anyhow::Result;
use sqlx::FromRow;

#[derive(FromRow)]
struct FuseEntryRow {
    id: i64,
    folder_name: String,
    artists: String,
    tags: String,
    title: String,
    year: Option<i32>,
    trackers: String,
    record_label: Option<String>,
    source: String,
    format: String,
}

impl FuseEntryRow {
    fn into_entry(self) -> Result<FuseEntry> {
        Ok(FuseEntry {
            id: self.id,
            folder_name: self.folder_name,
            artists: serde_json::from_str(&self.artists)?,
            tags: serde_json::from_str(&self.tags)?,
            title: self.title,
            year: self.year,
            trackers: serde_json::from_str(&self.trackers)?,
            record_label: self.record_label,
            source: self.source,
            format: self.format,
        })
    }
}

pub struct FuseTable;

impl FuseTable {
    /// Replaces the entire facet index with `entries`, used on each mount's
    /// rebuilding scan.
    pub async fn replace_all(entries: &[FuseEntry]) -> Result<()> {
        let engine = DbEngine::get()?;
        let mut tx = engine.pool().begin().await?;

        sqlx::query("DELETE FROM fuse_entry").execute(&mut *tx).await?;

        for entry in entries {
            let artists = serde_json::to_string(&entry.artists)?;
            let tags = serde_json::to_string(&entry.tags)?;
            let trackers = serde_json::to_string(&entry.trackers)?;

            sqlx::query(
                r#"
                INSERT INTO fuse_entry
                    (folder_name, artists, tags, title, year, trackers, record_label, source, format)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&entry.folder_name)
            .bind(&artists)
            .bind(&tags)
            .bind(&entry.title)
            .bind(entry.year)
            .bind(&trackers)
            .bind(&entry.record_label)
            .bind(&entry.source)
            .bind(&entry.format)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn all() -> Result<Vec<FuseEntry>> {
        let engine = DbEngine::get()?;
        let rows: Vec<FuseEntryRow> = sqlx::query_as("SELECT * FROM fuse_entry ORDER BY folder_name")
            .fetch_all(engine.pool())
            .await?;
        rows.into_iter().map(FuseEntryRow::into_entry).collect()
    }

    pub async fn find_by_folder(folder_name: &str) -> Result<Option<FuseEntry>> {
        let engine = DbEngine::get()?;
        let row: Option<FuseEntryRow> =
            sqlx::query_as("SELECT * FROM fuse_entry WHERE folder_name = ?")
                .bind(folder_name)
                .fetch_optional(engine.pool())
                .await?;
        row.map(FuseEntryRow::into_entry).transpose()
    }
}

//! Storage for the downloads indexer's reconciled folder view.

use crate::db::engine::DbEngine;
use crate::error::VarroaError;
use crate::models::{DownloadEntry, DownloadState};
use anyhow::{Context, Result};
use sqlx::FromRow;

#[derive(FromRow)]
struct DownloadEntryRow {
    id: i64,
    folder_name: String,
    state: String,
    trackers: String,
    artists: String,
    has_tracker_metadata: bool,
    schema_version: i32,
}

impl DownloadEntryRow {
    fn into_entry(self) -> Result<DownloadEntry> {
        let state = match self.state.as_str() {
            "unsorted" => DownloadState::Unsorted,
            "accepted" => DownloadState::Accepted,
            "rejected" => DownloadState::Rejected,
            other => anyhow::bail!("unrecognized download state: {other}"),
        };
        Ok(DownloadEntry {
            id: self.id,
            folder_name: self.folder_name,
            state,
            trackers: serde_json::from_str(&self.trackers)?,
            artists: serde_json::from_str(&self.artists)?,
            has_tracker_metadata: self.has_tracker_metadata,
            schema_version: self.schema_version,
        })
    }
}

pub struct DownloadTable;

impl DownloadTable {
    pub async fn insert_one(entry: &DownloadEntry) -> Result<i64> {
        let engine = DbEngine::get()?;
        let trackers = serde_json::to_string(&entry.trackers)?;
        let artists = serde_json::to_string(&entry.artists)?;

        let result = sqlx::query(
            r#"
            INSERT INTO download_entry
                (folder_name, state, trackers, artists, has_tracker_metadata, schema_version)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.folder_name)
        .bind(entry.state.as_str())
        .bind(&trackers)
        .bind(&artists)
        .bind(entry.has_tracker_metadata)
        .bind(entry.schema_version)
        .execute(engine.pool())
        .await;

        match result {
            Ok(r) => Ok(r.last_insert_rowid()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(VarroaError::Duplicate.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn update(entry: &DownloadEntry) -> Result<()> {
        let engine = DbEngine::get()?;
        let trackers = serde_json::to_string(&entry.trackers)?;
        let artists = serde_json::to_string(&entry.artists)?;

        let result = sqlx::query(
            r#"
            UPDATE download_entry
            SET state = ?, trackers = ?, artists = ?, has_tracker_metadata = ?, schema_version = ?
            WHERE id = ?
            "#,
        )
        .bind(entry.state.as_str())
        .bind(&trackers)
        .bind(&artists)
        .bind(entry.has_tracker_metadata)
        .bind(entry.schema_version)
        .bind(entry.id)
        .execute(engine.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(VarroaError::NotFound.into());
        }
        Ok(())
    }

    pub async fn delete(id: i64) -> Result<()> {
        let engine = DbEngine::get()?;
        sqlx::query("DELETE FROM download_entry WHERE id = ?")
            .bind(id)
            .execute(engine.pool())
            .await
            .context("deleting download entry")?;
        Ok(())
    }

    pub async fn find_by_id(id: i64) -> Result<Option<DownloadEntry>> {
        let engine = DbEngine::get()?;
        let row: Option<DownloadEntryRow> =
            sqlx::query_as("SELECT * FROM download_entry WHERE id = ?")
                .bind(id)
                .fetch_optional(engine.pool())
                .await?;
        row.map(DownloadEntryRow::into_entry).transpose()
    }

    pub async fn find_by_folder_name(folder_name: &str) -> Result<Option<DownloadEntry>> {
        let engine = DbEngine::get()?;
        let row: Option<DownloadEntryRow> =
            sqlx::query_as("SELECT * FROM download_entry WHERE folder_name = ?")
                .bind(folder_name)
                .fetch_optional(engine.pool())
                .await?;
        row.map(DownloadEntryRow::into_entry).transpose()
    }

    pub async fn find_by_state(state: DownloadState) -> Result<Vec<DownloadEntry>> {
        let engine = DbEngine::get()?;
        let rows: Vec<DownloadEntryRow> =
            sqlx::query_as("SELECT * FROM download_entry WHERE state = ? ORDER BY folder_name")
                .bind(state.as_str())
                .fetch_all(engine.pool())
                .await?;
        rows.into_iter().map(DownloadEntryRow::into_entry).collect()
    }

    pub async fn find_by_artist(artist: &str) -> Result<Vec<DownloadEntry>> {
        let engine = DbEngine::get()?;
        // `artists` is stored as a JSON array; a LIKE scan over the encoded
        // text is adequate at this scale and avoids a second normalized table.
        let pattern = format!("%\"{}\"%", artist.replace('"', ""));
        let rows: Vec<DownloadEntryRow> =
            sqlx::query_as("SELECT * FROM download_entry WHERE artists LIKE ?")
                .bind(pattern)
                .fetch_all(engine.pool())
                .await?;
        rows.into_iter().map(DownloadEntryRow::into_entry).collect()
    }

    pub async fn all() -> Result<Vec<DownloadEntry>> {
        let engine = DbEngine::get()?;
        let rows: Vec<DownloadEntryRow> =
            sqlx::query_as("SELECT * FROM download_entry ORDER BY folder_name")
                .fetch_all(engine.pool())
                .await?;
        rows.into_iter().map(DownloadEntryRow::into_entry).collect()
    }
}

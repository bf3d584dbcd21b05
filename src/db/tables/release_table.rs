//! Storage for the immutable snatch history.

use crate::db::engine::DbEngine;
use crate::error::VarroaError;
use crate::models::{Format, Quality, Release, ReleaseType, Source};
use anyhow::Result;
use sqlx::FromRow;
use std::str::FromStr;

#[derive(FromRow)]
struct ReleaseRow {
    id: i64,
    tracker: String,
    snatched_at: i64,
    torrent_id: String,
    group_id: String,
    artists: String,
    title: String,
    year: Option<i32>,
    release_type: String,
    format: String,
    quality: String,
    source: String,
    has_log: bool,
    has_cue: bool,
    is_scene: bool,
    log_score: Option<i32>,
    tags: String,
    size_bytes: i64,
    folder_name: String,
    matched_filter: String,
}

impl ReleaseRow {
    fn into_release(self) -> Result<Release> {
        Ok(Release {
            id: self.id,
            tracker: self.tracker,
            snatched_at: self.snatched_at,
            torrent_id: self.torrent_id,
            group_id: self.group_id,
            artists: serde_json::from_str(&self.artists)?,
            title: self.title,
            year: self.year,
            release_type: ReleaseType::from_str(&self.release_type)?,
            format: Format::from_str(&self.format)?,
            quality: Quality::from_str(&self.quality)?,
            source: Source::from_str(&self.source)?,
            has_log: self.has_log,
            has_cue: self.has_cue,
            is_scene: self.is_scene,
            log_score: self.log_score,
            tags: serde_json::from_str(&self.tags)?,
            size_bytes: self.size_bytes,
            folder_name: self.folder_name,
            matched_filter: self.matched_filter,
        })
    }
}

pub struct ReleaseTable;

impl ReleaseTable {
    /// Inserts a new release. Fails with `VarroaError::Duplicate` when the
    /// (tracker, torrent-id) pair already exists.
    pub async fn insert_one(release: &Release) -> Result<i64> {
        release.check()?;
        let engine = DbEngine::get()?;
        let pool = engine.pool();

        let artists = serde_json::to_string(&release.artists)?;
        let tags = serde_json::to_string(&release.tags)?;

        let result = sqlx::query(
            r#"
            INSERT INTO release
                (tracker, snatched_at, torrent_id, group_id, artists, title, year,
                 release_type, format, quality, source, has_log, has_cue, is_scene,
                 log_score, tags, size_bytes, folder_name, matched_filter)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&release.tracker)
        .bind(release.snatched_at)
        .bind(&release.torrent_id)
        .bind(&release.group_id)
        .bind(&artists)
        .bind(&release.title)
        .bind(release.year)
        .bind(release.release_type.as_str())
        .bind(release.format.as_str())
        .bind(release.quality.as_str())
        .bind(release.source.as_str())
        .bind(release.has_log)
        .bind(release.has_cue)
        .bind(release.is_scene)
        .bind(release.log_score)
        .bind(&tags)
        .bind(release.size_bytes)
        .bind(&release.folder_name)
        .bind(&release.matched_filter)
        .execute(pool)
        .await;

        match result {
            Ok(r) => Ok(r.last_insert_rowid()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(VarroaError::Duplicate.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(tracker: &str, torrent_id: &str) -> Result<bool> {
        let engine = DbEngine::get()?;
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM release WHERE tracker = ? AND torrent_id = ?")
                .bind(tracker)
                .bind(torrent_id)
                .fetch_optional(engine.pool())
                .await?;
        Ok(row.is_some())
    }

    pub async fn group_has_snatch(tracker: &str, group_id: &str) -> Result<bool> {
        let engine = DbEngine::get()?;
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM release WHERE tracker = ? AND group_id = ?")
                .bind(tracker)
                .bind(group_id)
                .fetch_optional(engine.pool())
                .await?;
        Ok(row.is_some())
    }

    pub async fn count_since(tracker: &str, since: i64) -> Result<i64> {
        let engine = DbEngine::get()?;
        let row: (i64,) =
            sqlx::query_as("SELECT count(*) FROM release WHERE tracker = ? AND snatched_at >= ?")
                .bind(tracker)
                .bind(since)
                .fetch_one(engine.pool())
                .await?;
        Ok(row.0)
    }

    pub async fn all() -> Result<Vec<Release>> {
        let engine = DbEngine::get()?;
        let rows: Vec<ReleaseRow> = sqlx::query_as("SELECT * FROM release ORDER BY snatched_at")
            .fetch_all(engine.pool())
            .await?;
        rows.into_iter().map(ReleaseRow::into_release).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Paths;
    use crate::db::engine::setup_sqlite;
    use tempfile::TempDir;

    fn sample(tracker: &str, torrent_id: &str) -> Release {
        Release {
            id: 0,
            tracker: tracker.into(),
            snatched_at: 1_700_000_000,
            torrent_id: torrent_id.into(),
            group_id: "42".into(),
            artists: vec!["An artist".into()],
            title: "Title".into(),
            year: Some(2013),
            release_type: ReleaseType::Album,
            format: Format::Mp3,
            quality: Quality::Q320,
            source: Source::Cd,
            has_log: false,
            has_cue: false,
            is_scene: false,
            log_score: None,
            tags: vec!["tag1".into(), "tag2".into()],
            size_bytes: 123_456,
            folder_name: "An Artist - Title (2013)".into(),
            matched_filter: "default".into(),
        }
    }

    // Paths/DbEngine are process-wide OnceCells; only one test in this
    // process may initialize them. Exercised end-to-end in the snatch
    // pipeline's integration test instead, which owns the singleton init.
    #[allow(dead_code)]
    async fn init_once() -> TempDir {
        let dir = TempDir::new().unwrap();
        let _ = Paths::init(Some(dir.path().to_path_buf()));
        let _ = setup_sqlite().await;
        dir
    }

    #[test]
    fn release_check_rejects_empty_artists() {
        let mut r = sample("blue", "1000");
        r.artists.clear();
        assert!(r.check().is_err());
    }
}

//! The record store's connection management: a single SQLite file accessed
//! through `sqlx` in WAL mode with a bounded pool, tuned for one writer at
//! a time plus several concurrent readers.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;

use crate::config::Paths;

static DB_ENGINE: OnceCell<Arc<DbEngine>> = OnceCell::new();

/// Database engine wrapper.
pub struct DbEngine {
    pool: SqlitePool,
}

impl DbEngine {
    /// Get the global database engine instance.
    pub fn get() -> Result<Arc<DbEngine>> {
        DB_ENGINE
            .get()
            .map(Arc::clone)
            .context("record store not initialized")
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Opens (creating if needed) the SQLite-backed record store and runs the
/// schema DDL. Schema mismatches at this point are fatal: the store refuses
/// to proceed silently on a corrupt or foreign database file.
pub async fn setup_sqlite() -> Result<()> {
    let paths = Paths::get()?;
    let db_path = paths.db_path();

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30))
        .pragma("foreign_keys", "ON");

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect_with(options)
        .await
        .context("failed to connect to record store")?;

    create_tables(&pool).await?;

    let engine = DbEngine { pool };

    DB_ENGINE
        .set(Arc::new(engine))
        .map_err(|_| anyhow::anyhow!("record store already initialized"))?;

    Ok(())
}

/// Create all record-store tables and their secondary indexes.
async fn create_tables(pool: &SqlitePool) -> Result<()> {
    // Release: the immutable snatch history.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS release (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tracker TEXT NOT NULL,
            snatched_at INTEGER NOT NULL,
            torrent_id TEXT NOT NULL,
            group_id TEXT NOT NULL,
            artists TEXT NOT NULL,
            title TEXT NOT NULL,
            year INTEGER,
            release_type TEXT NOT NULL,
            format TEXT NOT NULL,
            quality TEXT NOT NULL,
            source TEXT NOT NULL,
            has_log INTEGER NOT NULL DEFAULT 0,
            has_cue INTEGER NOT NULL DEFAULT 0,
            is_scene INTEGER NOT NULL DEFAULT 0,
            log_score INTEGER,
            tags TEXT NOT NULL DEFAULT '[]',
            size_bytes INTEGER NOT NULL DEFAULT 0,
            folder_name TEXT NOT NULL,
            matched_filter TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_release_tracker_torrent ON release(tracker, torrent_id);
        CREATE INDEX IF NOT EXISTS idx_release_group ON release(group_id);
        "#,
    )
    .execute(pool)
    .await?;

    // StatsEntry: periodic per-tracker snapshots.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stats_entry (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tracker TEXT NOT NULL,
            uploaded INTEGER NOT NULL,
            downloaded INTEGER NOT NULL,
            ratio REAL NOT NULL,
            timestamp INTEGER NOT NULL,
            collected INTEGER NOT NULL DEFAULT 1,
            start_of_day INTEGER NOT NULL DEFAULT 0,
            start_of_week INTEGER NOT NULL DEFAULT 0,
            start_of_month INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_stats_entry_tracker ON stats_entry(tracker);
        CREATE INDEX IF NOT EXISTS idx_stats_entry_timestamp ON stats_entry(timestamp);
        "#,
    )
    .execute(pool)
    .await?;

    // DownloadEntry: the reconciled view of on-disk release folders.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS download_entry (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            folder_name TEXT NOT NULL UNIQUE,
            state TEXT NOT NULL,
            trackers TEXT NOT NULL DEFAULT '[]',
            artists TEXT NOT NULL DEFAULT '[]',
            has_tracker_metadata INTEGER NOT NULL DEFAULT 0,
            schema_version INTEGER NOT NULL DEFAULT 1
        );
        CREATE INDEX IF NOT EXISTS idx_download_entry_state ON download_entry(state);
        CREATE INDEX IF NOT EXISTS idx_download_entry_has_metadata ON download_entry(has_tracker_metadata);
        "#,
    )
    .execute(pool)
    .await?;

    // FuseEntry: the denormalized virtual-filesystem facet index.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fuse_entry (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            folder_name TEXT NOT NULL UNIQUE,
            artists TEXT NOT NULL DEFAULT '[]',
            tags TEXT NOT NULL DEFAULT '[]',
            title TEXT NOT NULL,
            year INTEGER,
            trackers TEXT NOT NULL DEFAULT '[]',
            record_label TEXT,
            source TEXT NOT NULL,
            format TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_fuse_entry_folder ON fuse_entry(folder_name);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn creates_schema_idempotently() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("schema_check.db");
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .unwrap()
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();

        // Running the DDL twice against the same pool confirms every
        // CREATE TABLE/INDEX is guarded with IF NOT EXISTS.
        create_tables(&pool).await.unwrap();
        create_tables(&pool).await.unwrap();

        let count: (i64,) = sqlx::query_as(
            "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='release'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count.0, 1);
    }
}

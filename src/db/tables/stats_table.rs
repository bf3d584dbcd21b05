//! Storage for periodic per-tracker stats snapshots.

use crate::db::engine::DbEngine;
use crate::models::StatsEntry;
use anyhow::Result;
use sqlx::FromRow;

#[derive(FromRow)]
struct StatsEntryRow {
    id: i64,
    tracker: String,
    uploaded: i64,
    downloaded: i64,
    ratio: f64,
    timestamp: i64,
    collected: bool,
    start_of_day: bool,
    start_of_week: bool,
    start_of_month: bool,
}

impl From<StatsEntryRow> for StatsEntry {
    fn from(row: StatsEntryRow) -> Self {
        StatsEntry {
            id: row.id,
            tracker: row.tracker,
            uploaded: row.uploaded,
            downloaded: row.downloaded,
            ratio: row.ratio,
            timestamp: row.timestamp,
            collected: row.collected,
            start_of_day: row.start_of_day,
            start_of_week: row.start_of_week,
            start_of_month: row.start_of_month,
        }
    }
}

pub struct StatsTable;

impl StatsTable {
    /// Appends a new snapshot. Within a single tracker, timestamps must be
    /// monotone non-decreasing across insertions; callers are expected to
    /// enforce this by always inserting the latest collected sample last.
    pub async fn insert_one(entry: &StatsEntry) -> Result<i64> {
        let engine = DbEngine::get()?;
        let result = sqlx::query(
            r#"
            INSERT INTO stats_entry
                (tracker, uploaded, downloaded, ratio, timestamp,
                 collected, start_of_day, start_of_week, start_of_month)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.tracker)
        .bind(entry.uploaded)
        .bind(entry.downloaded)
        .bind(entry.ratio)
        .bind(entry.timestamp)
        .bind(entry.collected)
        .bind(entry.start_of_day)
        .bind(entry.start_of_week)
        .bind(entry.start_of_month)
        .execute(engine.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// The most recent snapshot for a tracker, if any.
    pub async fn latest(tracker: &str) -> Result<Option<StatsEntry>> {
        let engine = DbEngine::get()?;
        let row: Option<StatsEntryRow> = sqlx::query_as(
            "SELECT * FROM stats_entry WHERE tracker = ? ORDER BY timestamp DESC LIMIT 1",
        )
        .bind(tracker)
        .fetch_optional(engine.pool())
        .await?;
        Ok(row.map(StatsEntry::from))
    }

    /// All snapshots for a tracker in chronological order, used for graph
    /// series assembly.
    pub async fn for_tracker(tracker: &str) -> Result<Vec<StatsEntry>> {
        let engine = DbEngine::get()?;
        let rows: Vec<StatsEntryRow> =
            sqlx::query_as("SELECT * FROM stats_entry WHERE tracker = ? ORDER BY timestamp ASC")
                .bind(tracker)
                .fetch_all(engine.pool())
                .await?;
        Ok(rows.into_iter().map(StatsEntry::from).collect())
    }

    /// Snapshots for a tracker within `[start, end]`, used when generating
    /// a bounded graph instead of the full history.
    pub async fn in_range(tracker: &str, start: i64, end: i64) -> Result<Vec<StatsEntry>> {
        let engine = DbEngine::get()?;
        let rows: Vec<StatsEntryRow> = sqlx::query_as(
            "SELECT * FROM stats_entry WHERE tracker = ? AND timestamp BETWEEN ? AND ? ORDER BY timestamp ASC",
        )
        .bind(tracker)
        .bind(start)
        .bind(end)
        .fetch_all(engine.pool())
        .await?;
        Ok(rows.into_iter().map(StatsEntry::from).collect())
    }
}

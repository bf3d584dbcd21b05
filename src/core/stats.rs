//! The stats engine: per-tracker snapshot collection, the progress
//! acceptability guard, and time-series assembly for graphing.

use crate::config::sections::Stats as StatsConfig;
use crate::config::{self, Config};
use crate::core::tracker::TrackerClient;
use crate::db::StatsTable;
use crate::models::{check_progress, deltas, ProgressGuardConfig, ProgressOutcome, StatsDelta, StatsEntry};
use crate::utils::dates;
use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

/// Fetches the logged-in user's current stats from the tracker, builds a
/// [`StatsEntry`], writes it to the store, and evaluates progress against
/// the immediately preceding entry for that tracker.
pub async fn collect(
    client: &TrackerClient,
    stats_config: &StatsConfig,
    shared_config: &Arc<RwLock<Config>>,
) -> Result<StatsEntry> {
    let payload = client.user_stats().await.context("fetching user stats")?;

    let uploaded = payload
        .pointer("/response/uploaded")
        .and_then(|v| v.as_i64())
        .unwrap_or(0);
    let downloaded = payload
        .pointer("/response/downloaded")
        .and_then(|v| v.as_i64())
        .unwrap_or(0);
    let ratio = if downloaded == 0 {
        f64::INFINITY
    } else {
        uploaded as f64 / downloaded as f64
    };

    let now = payload
        .pointer("/response/now")
        .and_then(|v| v.as_i64())
        .unwrap_or_else(|| chrono::Utc::now().timestamp());

    let entry = StatsEntry {
        id: 0,
        tracker: stats_config.tracker_label.clone(),
        uploaded,
        downloaded,
        ratio,
        timestamp: now,
        collected: true,
        start_of_day: now == dates::start_of_day(),
        start_of_week: now == dates::start_of_week(),
        start_of_month: now == dates::start_of_month(),
    };

    let previous = StatsTable::latest(&stats_config.tracker_label).await?;
    StatsTable::insert_one(&entry).await?;

    if let Some(previous) = previous {
        let guard = ProgressGuardConfig {
            max_buffer_decrease_mb: stats_config.max_buffer_decrease_mb,
            minimum_ratio: stats_config.minimum_ratio,
            target_ratio: stats_config.target_ratio,
        };
        match check_progress(&previous, &entry, &guard) {
            ProgressOutcome::Acceptable => {
                info!(tracker = stats_config.tracker_label, "stats progress acceptable");
            }
            ProgressOutcome::BelowWarningRatio => {
                warn!(tracker = stats_config.tracker_label, "ratio below minimum, disabling autosnatch");
                config::disable_autosnatch(shared_config, &stats_config.tracker_label);
            }
            ProgressOutcome::BufferDrop => {
                warn!(tracker = stats_config.tracker_label, "buffer dropped too fast, disabling autosnatch");
                config::disable_autosnatch(shared_config, &stats_config.tracker_label);
            }
        }
    }

    Ok(entry)
}

/// A single point in a rendered graph series.
#[derive(Debug, Clone, Copy)]
pub struct GraphPoint {
    pub timestamp: i64,
    pub uploaded: i64,
    pub downloaded: i64,
    pub ratio: f64,
    pub buffer: f64,
    pub warning_buffer: f64,
    pub collected: bool,
}

/// Assembles a graph series for one tracker: the raw collected samples plus
/// synthesized day/week/month boundary points obtained by linear
/// interpolation between the two bracketing real samples.
pub fn assemble_series(entries: &[StatsEntry], target_ratio: f64, boundaries: &[i64]) -> Result<Vec<GraphPoint>> {
    let mut points: Vec<GraphPoint> = entries
        .iter()
        .map(|e| to_point(e, target_ratio))
        .collect();

    for &at in boundaries {
        if let Some((a, b)) = bracket(entries, at) {
            let interpolated = StatsEntry::interpolate(a, b, at)?;
            points.push(to_point(&interpolated, target_ratio));
        }
    }

    points.sort_by_key(|p| p.timestamp);
    Ok(points)
}

fn to_point(entry: &StatsEntry, target_ratio: f64) -> GraphPoint {
    GraphPoint {
        timestamp: entry.timestamp,
        uploaded: entry.uploaded,
        downloaded: entry.downloaded,
        ratio: entry.ratio,
        buffer: entry.buffer(target_ratio),
        warning_buffer: entry.warning_buffer(),
        collected: entry.collected,
    }
}

fn bracket(entries: &[StatsEntry], at: i64) -> Option<(&StatsEntry, &StatsEntry)> {
    entries
        .windows(2)
        .find(|pair| pair[0].timestamp <= at && at <= pair[1].timestamp)
        .map(|pair| (&pair[0], &pair[1]))
}

/// The full delta series for one tracker's collected history.
pub fn delta_series(entries: &[StatsEntry], target_ratio: f64) -> Result<Vec<StatsDelta>> {
    deltas(entries, target_ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(up: i64, down: i64, ratio: f64, ts: i64) -> StatsEntry {
        StatsEntry {
            id: 0,
            tracker: "blue".into(),
            uploaded: up,
            downloaded: down,
            ratio,
            timestamp: ts,
            collected: true,
            start_of_day: false,
            start_of_week: false,
            start_of_month: false,
        }
    }

    #[test]
    fn assembles_series_with_interpolated_boundary() {
        let entries = vec![
            entry(10_000_000_000, 5_000_000_000, 2.0, 1_704_157_200),
            entry(13_000_000_000, 5_000_000_000, 2.6, 1_704_178_800),
        ];
        let boundaries = vec![1_704_171_600];
        let points = assemble_series(&entries, 1.0, &boundaries).unwrap();

        assert_eq!(points.len(), 3);
        let interpolated = points.iter().find(|p| p.timestamp == 1_704_171_600).unwrap();
        assert!(!interpolated.collected);
    }
}

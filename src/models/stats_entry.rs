//! Periodic stats snapshots and the deltas/interpolations derived from them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsEntry {
    pub id: i64,
    pub tracker: String,
    pub uploaded: i64,
    pub downloaded: i64,
    pub ratio: f64,
    pub timestamp: i64,
    pub collected: bool,
    pub start_of_day: bool,
    pub start_of_week: bool,
    pub start_of_month: bool,
}

impl StatsEntry {
    /// `up / target_ratio - down`, in bytes.
    pub fn buffer(&self, target_ratio: f64) -> f64 {
        self.uploaded as f64 / target_ratio - self.downloaded as f64
    }

    /// Buffer against the hard warning ratio (0.6), independent of configuration.
    pub fn warning_buffer(&self) -> f64 {
        self.uploaded as f64 / 0.6 - self.downloaded as f64
    }

    /// Linearly interpolate a virtual sample at `at` between two real,
    /// time-bracketing entries of the same tracker. The result never sets
    /// `collected`.
    pub fn interpolate(a: &StatsEntry, b: &StatsEntry, at: i64) -> anyhow::Result<StatsEntry> {
        if a.tracker != b.tracker {
            anyhow::bail!("cannot interpolate across trackers");
        }
        if b.timestamp <= a.timestamp {
            anyhow::bail!("bracketing samples must be strictly increasing in time");
        }
        if at < a.timestamp || at > b.timestamp {
            anyhow::bail!("interpolation target must lie within the bracket");
        }

        let span = (b.timestamp - a.timestamp) as f64;
        let t = (at - a.timestamp) as f64 / span;

        let lerp = |x: i64, y: i64| -> i64 { (x as f64 + (y - x) as f64 * t).round() as i64 };
        let lerp_f = |x: f64, y: f64| -> f64 { x + (y - x) * t };

        Ok(StatsEntry {
            id: 0,
            tracker: a.tracker.clone(),
            uploaded: lerp(a.uploaded, b.uploaded),
            downloaded: lerp(a.downloaded, b.downloaded),
            ratio: lerp_f(a.ratio, b.ratio),
            timestamp: at,
            collected: false,
            start_of_day: false,
            start_of_week: false,
            start_of_month: false,
        })
    }
}

/// The signed change between two consecutive entries of the same tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsDelta {
    pub timestamp: i64,
    pub uploaded: i64,
    pub downloaded: i64,
    pub ratio: f64,
    pub buffer: f64,
    pub warning_buffer: f64,
}

impl StatsDelta {
    pub fn zero(at: i64) -> Self {
        StatsDelta {
            timestamp: at,
            uploaded: 0,
            downloaded: 0,
            ratio: 0.0,
            buffer: 0.0,
            warning_buffer: 0.0,
        }
    }

    pub fn between(a: &StatsEntry, b: &StatsEntry, target_ratio: f64) -> anyhow::Result<Self> {
        if b.timestamp <= a.timestamp {
            anyhow::bail!("delta requires b.timestamp > a.timestamp");
        }
        Ok(StatsDelta {
            timestamp: b.timestamp,
            uploaded: b.uploaded - a.uploaded,
            downloaded: b.downloaded - a.downloaded,
            ratio: b.ratio - a.ratio,
            buffer: b.buffer(target_ratio) - a.buffer(target_ratio),
            warning_buffer: b.warning_buffer() - a.warning_buffer(),
        })
    }
}

/// Computes the full delta series for a chronologically ordered run of
/// entries for one tracker. The first element is a zero-delta bearing only
/// a timestamp.
pub fn deltas(entries: &[StatsEntry], target_ratio: f64) -> anyhow::Result<Vec<StatsDelta>> {
    let mut out = Vec::with_capacity(entries.len());
    if let Some(first) = entries.first() {
        out.push(StatsDelta::zero(first.timestamp));
    }
    for pair in entries.windows(2) {
        out.push(StatsDelta::between(&pair[0], &pair[1], target_ratio)?);
    }
    Ok(out)
}

/// A per-day/week/month aggregate snatch count for one tracker, derived from
/// the Release history rather than stored independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnatchStatsEntry {
    pub tracker: String,
    pub period_start: i64,
    pub count: i64,
}

/// The outcome of comparing two consecutive stats samples against the
/// configured acceptability guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOutcome {
    Acceptable,
    BelowWarningRatio,
    BufferDrop,
}

pub struct ProgressGuardConfig {
    pub max_buffer_decrease_mb: i64,
    pub minimum_ratio: f64,
    pub target_ratio: f64,
}

/// Evaluates the progress-acceptability guard between two consecutive
/// entries of the same tracker.
pub fn check_progress(
    previous: &StatsEntry,
    current: &StatsEntry,
    cfg: &ProgressGuardConfig,
) -> ProgressOutcome {
    if current.ratio <= cfg.minimum_ratio {
        return ProgressOutcome::BelowWarningRatio;
    }

    if cfg.max_buffer_decrease_mb > 0 {
        let drop = current.buffer(cfg.target_ratio) - previous.buffer(cfg.target_ratio);
        let threshold = -(cfg.max_buffer_decrease_mb as f64) * 1024.0 * 1024.0;
        if drop < threshold {
            return ProgressOutcome::BufferDrop;
        }
    }

    ProgressOutcome::Acceptable
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tracker: &str, up: i64, down: i64, ratio: f64, ts: i64) -> StatsEntry {
        StatsEntry {
            id: 0,
            tracker: tracker.into(),
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
    fn interpolation_at_day_boundary() {
        let a = entry("blue", 10_000_000_000, 5_000_000_000, 2.0, 1_704_157_200);
        let b = entry("blue", 13_000_000_000, 5_000_000_000, 2.6, 1_704_178_800);
        let s = StatsEntry::interpolate(&a, &b, 1_704_171_600).unwrap();
        assert!(!s.collected);
        assert_eq!(s.uploaded, 10_500_000_000);
        assert_eq!(s.downloaded, 5_000_000_000);
        assert!((s.ratio - 2.1).abs() < 1e-9);
    }

    #[test]
    fn interpolation_rejects_decreasing_brackets() {
        let a = entry("blue", 0, 0, 1.0, 100);
        let b = entry("blue", 0, 0, 1.0, 100);
        assert!(StatsEntry::interpolate(&a, &b, 100).is_err());
    }

    #[test]
    fn progress_guard_buffer_drop() {
        let prev = entry(
            "blue",
            100 * 1024 * 1024 * 1024,
            80 * 1024 * 1024 * 1024,
            1.25,
            0,
        );
        let cur = entry(
            "blue",
            100 * 1024 * 1024 * 1024,
            90 * 1024 * 1024 * 1024,
            1.11,
            1,
        );
        let cfg = ProgressGuardConfig {
            max_buffer_decrease_mb: 5120,
            minimum_ratio: 0.6,
            target_ratio: 1.0,
        };
        assert_eq!(check_progress(&prev, &cur, &cfg), ProgressOutcome::BufferDrop);
    }

    #[test]
    fn progress_guard_below_minimum_ratio() {
        let prev = entry("blue", 100, 50, 1.5, 0);
        let cur = entry("blue", 100, 200, 0.5, 1);
        let cfg = ProgressGuardConfig {
            max_buffer_decrease_mb: 0,
            minimum_ratio: 0.6,
            target_ratio: 1.0,
        };
        assert_eq!(
            check_progress(&prev, &cur, &cfg),
            ProgressOutcome::BelowWarningRatio
        );
    }

    #[test]
    fn delta_series_starts_with_zero() {
        let entries = vec![entry("blue", 0, 0, 1.0, 0), entry("blue", 10, 5, 2.0, 100)];
        let d = deltas(&entries, 1.0).unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(d[0].uploaded, 0);
        assert_eq!(d[1].uploaded, 10);
    }
}

//! The fixed-wall-clock-time cron schedule: daily archive, daily stats
//! generation, periodic git-repo compression, and an hourly disk-space
//! check.

use crate::config::{Config, Paths};
use crate::core::stats;
use crate::core::tracker::TrackerRegistry;
use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

const WARNING_DISK_USAGE_PERCENT: f64 = 95.0;
const CRITICAL_DISK_USAGE_PERCENT: f64 = 98.0;

#[derive(Clone)]
pub struct CronContext {
    pub shared_config: Arc<RwLock<Config>>,
    pub trackers: Arc<TrackerRegistry>,
}

/// Copies the record store and configuration file into a timestamped
/// directory under the working directory's `archives/`.
pub fn archive_user_files(config_path: &std::path::Path) -> Result<std::path::PathBuf> {
    let paths = Paths::get()?;
    let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    let archive_dir = paths.archives_dir().join(format!("varroa-backup-{timestamp}"));
    std::fs::create_dir_all(&archive_dir)
        .with_context(|| format!("creating archive directory {}", archive_dir.display()))?;

    std::fs::copy(paths.db_path(), archive_dir.join("varroa.db")).context("archiving record store")?;

    let config_name = config_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "config.yml".into());
    std::fs::copy(config_path, archive_dir.join(config_name)).context("archiving configuration file")?;

    info!(path = %archive_dir.display(), "wrote daily archive");
    Ok(archive_dir)
}

async fn run_stats_generation(ctx: &CronContext) -> Result<()> {
    let stats_configs: Vec<_> = ctx.shared_config.read().stats.clone();
    for stats_config in &stats_configs {
        let Some(client) = ctx.trackers.get(&stats_config.tracker_label) else {
            warn!(tracker = stats_config.tracker_label, "no tracker client for configured stats entry");
            continue;
        };
        if let Err(e) = stats::collect(&client, stats_config, &ctx.shared_config).await {
            warn!(tracker = stats_config.tracker_label, error = %e, "stats collection failed");
        }
    }
    Ok(())
}

fn compress_git_repository(repository_path: &str) -> Result<()> {
    let status = std::process::Command::new("git")
        .arg("gc")
        .arg("--quiet")
        .current_dir(repository_path)
        .status()
        .with_context(|| format!("running git gc in {repository_path}"))?;
    if !status.success() {
        anyhow::bail!("git gc exited with {status}");
    }
    Ok(())
}

fn check_disk_space(download_root: &std::path::Path) -> Result<()> {
    use sysinfo::{DiskExt, System, SystemExt};

    let mut system = System::new();
    system.refresh_disks_list();
    system.refresh_disks();

    let disk = system
        .disks()
        .iter()
        .filter(|d| download_root.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len());

    let Some(disk) = disk else {
        warn!(path = %download_root.display(), "could not resolve a filesystem for disk-space check");
        return Ok(());
    };

    let total = disk.total_space();
    if total == 0 {
        return Ok(());
    }
    let used_percent = 100.0 * (1.0 - (disk.available_space() as f64 / total as f64));

    if used_percent >= CRITICAL_DISK_USAGE_PERCENT {
        warn!(used_percent, "disk usage critical");
    } else if used_percent >= WARNING_DISK_USAGE_PERCENT {
        warn!(used_percent, "disk usage high");
    }
    Ok(())
}

/// Builds and starts the full cron schedule. The scheduler itself runs as a
/// background task; this function returns once every job is registered.
pub async fn build_scheduler(
    ctx: CronContext,
    config_path: std::path::PathBuf,
    download_root: std::path::PathBuf,
    gitlab_repository_path: Option<String>,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await.context("creating cron scheduler")?;

    {
        let config_path = config_path.clone();
        scheduler
            .add(Job::new("0 0 0 * * *", move |_uuid, _locked| {
                if let Err(e) = archive_user_files(&config_path) {
                    warn!(error = %e, "daily archive job failed");
                }
            })?)
            .await?;
    }

    {
        let ctx = ctx.clone();
        scheduler
            .add(Job::new_async("0 5 0 * * *", move |_uuid, _locked| {
                let ctx = ctx.clone();
                Box::pin(async move {
                    if let Err(e) = run_stats_generation(&ctx).await {
                        warn!(error = %e, "stats generation job failed");
                    }
                })
            })?)
            .await?;
    }

    if let Some(repository_path) = gitlab_repository_path {
        scheduler
            .add(Job::new("0 15 0 */7 * *", move |_uuid, _locked| {
                if let Err(e) = compress_git_repository(&repository_path) {
                    warn!(error = %e, "git compression job failed");
                }
            })?)
            .await?;
    }

    {
        let download_root = download_root.clone();
        scheduler
            .add(Job::new("0 0 * * * *", move |_uuid, _locked| {
                if let Err(e) = check_disk_space(&download_root) {
                    warn!(error = %e, "disk space check failed");
                }
            })?)
            .await?;
    }

    scheduler.start().await.context("starting cron scheduler")?;
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn archive_copies_db_and_config_into_a_timestamped_directory() {
        let working_dir = TempDir::new().unwrap();
        let _ = Paths::init(Some(working_dir.path().to_path_buf()));
        let paths = Paths::get().unwrap();
        std::fs::write(paths.db_path(), b"fake-db-bytes").unwrap();

        let config_file = TempDir::new().unwrap().path().join("varroa.yml");
        std::fs::create_dir_all(config_file.parent().unwrap()).unwrap();
        std::fs::write(&config_file, b"general: {}").unwrap();

        let archive_path = archive_user_files(&config_file).unwrap();
        assert!(archive_path.exists());
    }
}

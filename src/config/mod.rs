//! Application configuration: a single YAML file, loaded once at startup,
//! validated section-by-section, and held thereafter as a read-mostly
//! structure behind a `parking_lot::RwLock` for the one field (autosnatch
//! disable flags) that is mutated after load.

mod paths;
pub mod sections;

pub use paths::Paths;
pub use sections::*;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub general: General,
    #[serde(default)]
    pub trackers: Vec<Tracker>,
    #[serde(default)]
    pub autosnatch: Vec<Autosnatch>,
    #[serde(default)]
    pub library: Library,
    #[serde(default)]
    pub stats: Vec<Stats>,
    #[serde(default)]
    pub webserver: WebServer,
    #[serde(default)]
    pub notifications: Notifications,
    #[serde(default)]
    pub gitlab_pages: GitlabPages,
    #[serde(default)]
    pub filters: Vec<FilterSection>,
}

impl Default for General {
    fn default() -> Self {
        General {
            log_level: default_log_level_section(),
            watch_directory: String::new(),
            download_directory: String::new(),
            automatic_metadata_retrieval: false,
        }
    }
}

fn default_log_level_section() -> String {
    "info".to_string()
}

impl Config {
    /// Loads and validates the configuration file, failing fast on the
    /// first invalid section, named.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.check()?;
        Ok(config)
    }

    pub fn check(&self) -> Result<()> {
        self.general.check().context("section: general")?;
        for t in &self.trackers {
            t.check().with_context(|| format!("section: tracker[{}]", t.label))?;
        }
        for a in &self.autosnatch {
            a.check()
                .with_context(|| format!("section: autosnatch[{}]", a.tracker_label))?;
        }
        self.library.check().context("section: library")?;
        for s in &self.stats {
            s.check()
                .with_context(|| format!("section: stats[{}]", s.tracker_label))?;
        }
        self.webserver.check().context("section: webserver")?;
        self.notifications.check().context("section: notifications")?;
        self.gitlab_pages.check().context("section: gitlab_pages")?;
        for f in &self.filters {
            f.check().with_context(|| format!("section: filter[{}]", f.name))?;
        }
        Ok(())
    }

    pub fn tracker(&self, label: &str) -> Option<&Tracker> {
        self.trackers.iter().find(|t| t.label == label)
    }

    pub fn autosnatch_for(&self, label: &str) -> Option<&Autosnatch> {
        self.autosnatch.iter().find(|a| a.tracker_label == label)
    }

    pub fn stats_for(&self, label: &str) -> Option<&Stats> {
        self.stats.iter().find(|s| s.tracker_label == label)
    }
}

static SHARED_CONFIG: OnceCell<Arc<RwLock<Config>>> = OnceCell::new();

/// Loads the configuration from `path` and installs it as the process-wide
/// shared instance. Must be called exactly once, before any subsystem reads
/// `shared()`.
pub fn init(path: &Path) -> Result<Arc<RwLock<Config>>> {
    let config = Config::load(path)?;
    let shared = Arc::new(RwLock::new(config));
    SHARED_CONFIG
        .set(Arc::clone(&shared))
        .map_err(|_| anyhow::anyhow!("configuration already initialized"))?;
    Ok(shared)
}

/// Returns the process-wide shared configuration handle.
pub fn shared() -> Result<Arc<RwLock<Config>>> {
    SHARED_CONFIG
        .get()
        .map(Arc::clone)
        .context("configuration not initialized")
}

/// Disables autosnatching for one tracker under the shared write lock,
/// called by the stats progress guard. The daemon stays up; re-enabling
/// requires a configuration reload.
pub fn disable_autosnatch(config: &Arc<RwLock<Config>>, tracker_label: &str) {
    let mut guard = config.write();
    if let Some(a) = guard
        .autosnatch
        .iter_mut()
        .find(|a| a.tracker_label == tracker_label)
    {
        a.disabled_autosnatching = true;
    }
}

pub fn default_config_path() -> PathBuf {
    if let Ok(env_path) = std::env::var("VARROA_CONFIG") {
        return PathBuf::from(env_path);
    }
    PathBuf::from("varroa.yml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_minimal(contents: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn rejects_missing_watch_directory() {
        let f = write_minimal(
            r#"
general:
  download_directory: "/tmp/downloads"
library:
  directory: "/tmp/library"
  folder_template: "$a - $t"
"#,
        );
        let err = Config::load(f.path()).unwrap_err();
        assert!(err.to_string().contains("general"));
    }

    #[test]
    fn loads_minimal_valid_config() {
        let f = write_minimal(
            r#"
general:
  watch_directory: "/tmp/watch"
  download_directory: "/tmp/downloads"
library:
  directory: "/tmp/library"
  folder_template: "$a - $t"
"#,
        );
        let config = Config::load(f.path()).unwrap();
        assert_eq!(config.general.watch_directory, "/tmp/watch");
    }

    #[test]
    fn perfect_flac_rejects_combined_fields() {
        let filter = FilterSection {
            name: "bad".into(),
            perfect_flac: true,
            formats: vec!["FLAC".into()],
            ..Default::default()
        };
        assert!(filter.check().is_err());
    }
}

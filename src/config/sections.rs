//! Configuration sections. Each struct mirrors a top-level YAML block and
//! validates itself independently via `check()`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct General {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub watch_directory: String,
    pub download_directory: String,
    #[serde(default)]
    pub automatic_metadata_retrieval: bool,
}

impl General {
    pub fn check(&self) -> anyhow::Result<()> {
        if self.watch_directory.trim().is_empty() {
            anyhow::bail!("general.watch_directory must not be empty");
        }
        if self.download_directory.trim().is_empty() {
            anyhow::bail!("general.download_directory must not be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tracker {
    pub label: String,
    pub user: String,
    pub password: String,
    pub url: String,
}

impl Tracker {
    pub fn check(&self) -> anyhow::Result<()> {
        if self.label.trim().is_empty() {
            anyhow::bail!("tracker.label must not be empty");
        }
        if self.url.trim().is_empty() {
            anyhow::bail!("tracker[{}].url must not be empty", self.label);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Autosnatch {
    pub tracker_label: String,
    pub irc_server: String,
    pub irc_key: Option<String>,
    #[serde(default)]
    pub irc_ssl: bool,
    pub nickserv_password: Option<String>,
    pub bot_name: String,
    pub announcer_nick: String,
    pub announce_channel: String,
    #[serde(default)]
    pub blacklisted_uploaders: Vec<String>,
    /// Mutated only by the stats progress guard; read by the IRC listener
    /// before acting on an announce. Not meant to be hand-set in the file,
    /// but accepted there so a reload can clear it.
    #[serde(default)]
    pub disabled_autosnatching: bool,
}

impl Autosnatch {
    pub fn check(&self) -> anyhow::Result<()> {
        if self.irc_server.trim().is_empty() {
            anyhow::bail!(
                "autosnatch[{}].irc_server must not be empty",
                self.tracker_label
            );
        }
        if self.announce_channel.trim().is_empty() {
            anyhow::bail!(
                "autosnatch[{}].announce_channel must not be empty",
                self.tracker_label
            );
        }
        if self.announcer_nick.trim().is_empty() {
            anyhow::bail!(
                "autosnatch[{}].announcer_nick must not be empty",
                self.tracker_label
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Library {
    pub directory: String,
    #[serde(default)]
    pub use_hardlinks: bool,
    pub folder_template: String,
    #[serde(default)]
    pub additional_sources: Vec<String>,
    #[serde(default)]
    pub artist_aliases: HashMap<String, String>,
    #[serde(default)]
    pub artist_categories: HashMap<String, String>,
    pub playlist_directory: Option<String>,
}

impl Library {
    pub fn check(&self) -> anyhow::Result<()> {
        if self.directory.trim().is_empty() {
            anyhow::bail!("library.directory must not be empty");
        }
        if self.folder_template.trim().is_empty() {
            anyhow::bail!("library.folder_template must not be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub tracker_label: String,
    pub update_period_hours: u32,
    pub max_buffer_decrease_mb: i64,
    pub minimum_ratio: f64,
    pub target_ratio: f64,
}

impl Stats {
    pub fn check(&self) -> anyhow::Result<()> {
        if self.update_period_hours == 0 {
            anyhow::bail!("stats[{}].update_period_hours must be > 0", self.tracker_label);
        }
        if self.target_ratio <= 0.0 {
            anyhow::bail!("stats[{}].target_ratio must be > 0", self.tracker_label);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebServer {
    #[serde(default)]
    pub serve_stats: bool,
    #[serde(default)]
    pub serve_metadata: bool,
    pub theme: Option<String>,
    pub basic_auth_user: Option<String>,
    pub basic_auth_password: Option<String>,
    #[serde(default)]
    pub allow_downloads: bool,
    pub token: Option<String>,
    pub http_port: Option<u16>,
    pub https_port: Option<u16>,
    #[serde(default = "default_hostname")]
    pub hostname: String,
}

fn default_hostname() -> String {
    "0.0.0.0".to_string()
}

impl WebServer {
    pub fn enabled(&self) -> bool {
        self.http_port.is_some() || self.https_port.is_some()
    }

    pub fn check(&self) -> anyhow::Result<()> {
        if self.enabled() && self.token.as_deref().unwrap_or("").is_empty() {
            anyhow::bail!("webserver.token must be set when http_port or https_port is configured");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushoverConfig {
    pub user_key: String,
    pub api_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IrcNotifyConfig {
    pub tracker_label: String,
    pub nick: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Notifications {
    pub pushover: Option<PushoverConfig>,
    pub webhook: Option<WebhookConfig>,
    pub irc: Option<IrcNotifyConfig>,
}

impl Notifications {
    pub fn check(&self) -> anyhow::Result<()> {
        if let Some(p) = &self.pushover {
            if p.user_key.is_empty() || p.api_token.is_empty() {
                anyhow::bail!("notifications.pushover requires user_key and api_token");
            }
        }
        if let Some(w) = &self.webhook {
            if w.url.is_empty() {
                anyhow::bail!("notifications.webhook requires a url");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitlabPages {
    pub repository_path: Option<String>,
    pub compress_every_days: Option<u32>,
}

impl GitlabPages {
    pub fn check(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterSection {
    pub name: String,
    pub tracker_scope: Vec<String>,

    #[serde(default)]
    pub artists_include: Vec<String>,
    #[serde(default)]
    pub artists_exclude: Vec<String>,
    #[serde(default)]
    pub years: Vec<i32>,
    #[serde(default)]
    pub edition_years: Vec<i32>,
    #[serde(default)]
    pub record_labels: Vec<String>,
    #[serde(default)]
    pub tags_included: Vec<String>,
    #[serde(default)]
    pub tags_excluded: Vec<String>,
    #[serde(default)]
    pub tags_required: Vec<String>,
    #[serde(default)]
    pub release_types_include: Vec<String>,
    #[serde(default)]
    pub release_types_exclude: Vec<String>,
    #[serde(default)]
    pub edition_name_patterns: Vec<String>,
    #[serde(default)]
    pub formats: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub qualities: Vec<String>,
    #[serde(default)]
    pub has_log: Option<bool>,
    #[serde(default)]
    pub has_cue: Option<bool>,
    pub min_log_score: Option<i32>,
    pub min_size_mb: Option<i64>,
    pub max_size_mb: Option<i64>,
    #[serde(default)]
    pub uploaders_include: Vec<String>,
    #[serde(default)]
    pub uploaders_exclude: Vec<String>,
    #[serde(default)]
    pub allow_duplicates: bool,
    #[serde(default)]
    pub allow_scene: bool,
    #[serde(default)]
    pub unique_in_group: bool,
    #[serde(default)]
    pub reject_unknown: bool,
    pub watch_directory: Option<String>,
    #[serde(default)]
    pub perfect_flac: bool,
}

impl FilterSection {
    pub fn check(&self) -> anyhow::Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("filter name must not be empty");
        }
        if self.perfect_flac
            && (!self.formats.is_empty()
                || !self.qualities.is_empty()
                || self.has_log.is_some()
                || self.has_cue.is_some()
                || self.min_log_score.is_some())
        {
            anyhow::bail!(
                "filter[{}]: perfect_flac cannot be combined with its own component fields",
                self.name
            );
        }
        for pattern in self
            .tags_included
            .iter()
            .chain(&self.tags_excluded)
            .chain(&self.tags_required)
        {
            crate::core::filter::validate_tag_pattern(pattern)
                .map_err(|e| anyhow::anyhow!("filter[{}]: {e}", self.name))?;
        }
        Ok(())
    }
}

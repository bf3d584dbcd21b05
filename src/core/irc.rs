//! The per-tracker IRC listener: joins the announce channel, dispatches each
//! line from the configured announcer nickname into the snatch pipeline, and
//! doubles as the transport for the IRC-privmsg notifier leg on the same
//! connection.

use crate::config::sections::{General, Library};
use crate::config::Config;
use crate::core::notify::Notifier;
use crate::core::snatch::{handle_announce, SnatchContext, SnatchOutcome};
use crate::core::tracker::TrackerClient;
use crate::core::filter::Filter;
use anyhow::{Context, Result};
use futures::StreamExt;
use irc::client::prelude::{Client, Command};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

pub struct IrcListenerConfig {
    pub tracker_label: String,
    pub server: String,
    pub use_ssl: bool,
    pub nickname: String,
    pub nickserv_password: Option<String>,
    pub channel: String,
    pub announcer_nick: String,
}

/// Runs until the connection closes or errors. The caller is expected to
/// `tokio::spawn` this per configured tracker and restart on error.
pub async fn run(
    config: IrcListenerConfig,
    client: Arc<TrackerClient>,
    filters: Vec<Filter>,
    general: General,
    library: Library,
    global_uploader_blacklist: Vec<String>,
    notifier: Notifier,
    shared_config: Arc<RwLock<Config>>,
    mut notify_rx: tokio::sync::mpsc::UnboundedReceiver<(String, String)>,
) -> Result<()> {
    let irc_config = irc::client::data::Config {
        nickname: Some(config.nickname.clone()),
        server: Some(config.server.clone()),
        use_tls: Some(config.use_ssl),
        channels: vec![config.channel.clone()],
        ..Default::default()
    };

    let mut irc_client = Client::from_config(irc_config)
        .await
        .with_context(|| format!("connecting to irc server for tracker {}", config.tracker_label))?;
    irc_client.identify().context("sending irc identify")?;

    if let Some(password) = &config.nickserv_password {
        irc_client
            .send_privmsg("NickServ", format!("IDENTIFY {password}"))
            .context("sending nickserv identify")?;
    }

    let mut stream = irc_client.stream().context("opening irc stream")?;

    info!(tracker = config.tracker_label, channel = config.channel, "irc listener connected");

    loop {
        tokio::select! {
            message = stream.next() => {
                let Some(message) = message.transpose()? else {
                    break;
                };
                if let Command::PRIVMSG(ref target, ref text) = message.command {
                    let from_announcer = message.source_nickname() == Some(config.announcer_nick.as_str());
                    if target == &config.channel && from_announcer {
                        handle_line(&config, &client, &filters, &general, &library, &global_uploader_blacklist, &notifier, &shared_config, text).await;
                    }
                }
            }
            outgoing = notify_rx.recv() => {
                let Some((nick, message)) = outgoing else {
                    continue;
                };
                if let Err(e) = irc_client.send_privmsg(&nick, &message) {
                    warn!(error = %e, "failed to send irc notifier privmsg");
                }
            }
        }
    }

    Ok(())
}

async fn handle_line(
    config: &IrcListenerConfig,
    client: &Arc<TrackerClient>,
    filters: &[Filter],
    general: &General,
    library: &Library,
    global_uploader_blacklist: &[String],
    notifier: &Notifier,
    shared_config: &Arc<RwLock<Config>>,
    line: &str,
) {
    let disabled = shared_config
        .read()
        .autosnatch_for(&config.tracker_label)
        .map(|a| a.disabled_autosnatching)
        .unwrap_or(false);
    if disabled {
        return;
    }

    let ctx = SnatchContext {
        tracker_label: &config.tracker_label,
        filters,
        client,
        general,
        library,
        global_uploader_blacklist,
        notifier,
    };

    match handle_announce(line, &ctx).await {
        Ok(SnatchOutcome::Snatched { release, .. }) => {
            info!(tracker = config.tracker_label, torrent_id = %release.torrent_id, "announce resulted in a snatch");
        }
        Ok(SnatchOutcome::NoFilterMatched) => {}
        Err(e) => warn!(tracker = config.tracker_label, error = %e, "snatch pipeline failed for this announce"),
    }
}

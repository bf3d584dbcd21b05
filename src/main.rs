//! varroa musica - a personal assistant daemon for a private Gazelle-family
//! music tracker: IRC autosnatcher, stats tracker, library virtual
//! filesystem, and a small HTTP surface.

mod api;
mod config;
mod core;
mod daemon;
mod db;
mod error;
mod models;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

const REEXEC_FLAG: &str = "--no-daemon";

#[derive(Parser, Debug)]
#[command(name = "varroa")]
#[command(about = "A personal assistant daemon for a private Gazelle-family music tracker")]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run in the foreground instead of detaching into a background process.
    #[arg(long)]
    no_daemon: bool,

    /// Override the configured log level (falls back to `general.log_level`, then `RUST_LOG`).
    #[arg(long)]
    log_level: Option<String>,

    /// Run a single control-socket command against an already-running daemon and exit.
    #[arg(long)]
    once: Option<String>,

    /// Extra arguments for `--once`, forwarded as the command's `Args` field.
    #[arg(long = "arg", action = clap::ArgAction::Append)]
    once_args: Vec<String>,

    /// Tracker label the `--once` command targets.
    #[arg(long, default_value = "")]
    site: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);

    if let Some(command) = &args.once {
        return run_once(&config_path, command, &args.site, &args.once_args).await;
    }

    let paths = config::Paths::init(Some(
        config_path
            .parent()
            .map(|p| p.to_path_buf())
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(".")),
    ))?;

    if !daemon::ensure_daemonized(args.no_daemon, REEXEC_FLAG)? {
        return Ok(());
    }

    init_logging(args.log_level.as_deref());

    info!("varroa starting, config {}", config_path.display());
    let supervisor = daemon::Supervisor::bootstrap(config_path.clone()).await?;

    let webserver_config = supervisor.shared_config.read().webserver.clone();
    if webserver_config.enabled() {
        spawn_http_server(supervisor.clone(), webserver_config);
    }

    supervisor.run().await?;
    let _ = paths;
    Ok(())
}

fn init_logging(override_level: Option<&str>) {
    let level = override_level.unwrap_or("info");
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn spawn_http_server(supervisor: std::sync::Arc<daemon::Supervisor>, webserver: config::sections::WebServer) {
    actix_web::rt::spawn(async move {
        use actix_web::{middleware, web, App, HttpServer};

        let state = web::Data::new(api::ApiState {
            supervisor,
            webserver: webserver.clone(),
        });

        let hostname = webserver.hostname.clone();
        let http_port = webserver.http_port;

        let Some(port) = http_port else {
            tracing::warn!("webserver enabled with no http_port; https-only serving is not wired up");
            return;
        };

        let addr = format!("{hostname}:{port}");
        tracing::info!(addr, "http server listening");

        let result = HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .wrap(middleware::Logger::default())
                .configure(api::configure)
        })
        .bind(&addr);

        match result {
            Ok(server) => {
                if let Err(e) = server.run().await {
                    tracing::error!(error = %e, "http server exited");
                }
            }
            Err(e) => tracing::error!(error = %e, addr, "failed to bind http server"),
        }
    });
}

/// Connects to the running daemon's control socket, sends one command, and
/// streams the response lines to stdout. Used by the CLI front-end (out of
/// scope to build here) and directly by operators for scripting.
async fn run_once(config_path: &PathBuf, command: &str, site: &str, extra_args: &[String]) -> Result<()> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::UnixStream;

    let paths = config::Paths::init(Some(
        config_path
            .parent()
            .map(|p| p.to_path_buf())
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(".")),
    ))?;

    let socket_path = paths.control_socket_path();
    let mut stream = UnixStream::connect(&socket_path)
        .await
        .with_context(|| format!("connecting to control socket {}", socket_path.display()))?;

    let payload = serde_json::json!({
        "Site": site,
        "Command": command,
        "Args": extra_args,
        "FLToken": false,
    });
    stream.write_all(payload.to_string().as_bytes()).await?;
    stream.write_all(b"\n").await?;

    let (reader, _) = stream.split();
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line == daemon::control_socket::STOP_SENTINEL {
            break;
        }
        println!("{line}");
    }

    Ok(())
}

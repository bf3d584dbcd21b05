//! The local control socket: one JSON command per connection, log lines
//! streamed back for the duration of the command, terminated by the
//! `__STOP__` sentinel. The CLI's `--once` flag and the HTTP websocket both
//! speak this same wire protocol so command dispatch has one implementation.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub const STOP_SENTINEL: &str = "__STOP__";

#[derive(Debug, Clone, Deserialize)]
pub struct ControlCommand {
    #[serde(rename = "Site")]
    pub site: String,
    #[serde(rename = "Command")]
    pub command: String,
    #[serde(rename = "Args", default)]
    pub args: Vec<String>,
    #[serde(rename = "FLToken", default)]
    pub fl_token: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlLine {
    pub message: String,
}

/// Implemented by the daemon supervisor; dispatches a single command,
/// streaming log lines to `sink` as the command progresses.
#[async_trait::async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn dispatch(&self, command: ControlCommand, sink: mpsc::UnboundedSender<String>);
}

/// Binds and serves the control socket until `shutdown` resolves. Removes
/// any stale socket file left over from an unclean prior exit before
/// binding.
pub async fn serve(
    socket_path: &Path,
    dispatcher: std::sync::Arc<dyn CommandDispatcher>,
    mut shutdown: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    let listener = UnixListener::bind(socket_path)?;
    info!(path = %socket_path.display(), "control socket listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                let dispatcher = std::sync::Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, dispatcher).await {
                        warn!(error = %e, "control socket connection failed");
                    }
                });
            }
            _ = &mut shutdown => {
                info!("control socket shutting down");
                break;
            }
        }
    }

    let _ = std::fs::remove_file(socket_path);
    Ok(())
}

async fn handle_connection(
    mut stream: UnixStream,
    dispatcher: std::sync::Arc<dyn CommandDispatcher>,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.split();
    let mut lines = BufReader::new(reader).lines();

    let Some(line) = lines.next_line().await? else {
        return Ok(());
    };
    let command: ControlCommand = serde_json::from_str(&line)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let dispatch_task = tokio::spawn(async move {
        dispatcher.dispatch(command, tx).await;
    });

    while let Some(message) = rx.recv().await {
        writer.write_all(message.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }

    dispatch_task.await?;
    writer.write_all(STOP_SENTINEL.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_command() {
        let raw = r#"{"Site":"blue","Command":"stop","Args":[],"FLToken":false}"#;
        let command: ControlCommand = serde_json::from_str(raw).unwrap();
        assert_eq!(command.site, "blue");
        assert_eq!(command.command, "stop");
        assert!(!command.fl_token);
    }
}

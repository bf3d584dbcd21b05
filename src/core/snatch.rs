//! The snatch pipeline: announce parse → filter → tracker fetch → filter →
//! torrent deposit → history append → async metadata capture → notify.

use crate::config::sections::{General, Library};
use crate::core::filter::Filter;
use crate::core::notify::Notifier;
use crate::core::tracker::{TrackerClient, TrackerMetadataResponse};
use crate::db::ReleaseTable;
use crate::models::{Announce, ArtistCredit, ArtistRole, Metadata, Release, TrackInfo};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Builds the [`Metadata`] view from a tracker's raw torrent/group/artist
/// JSON payloads.
fn metadata_from_response(
    tracker: &str,
    torrent_id: &str,
    response: &TrackerMetadataResponse,
) -> Metadata {
    let t = &response.torrent;

    let artists = response
        .artists
        .iter()
        .filter_map(|a| {
            let name = a.pointer("/response/name").and_then(|v| v.as_str())?;
            Some(ArtistCredit {
                name: name.to_string(),
                role: ArtistRole::Main,
            })
        })
        .collect::<Vec<_>>();

    let artists = if artists.is_empty() {
        vec![ArtistCredit {
            name: t
                .pointer("/response/group/musicInfo/artists/0/name")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown Artist")
                .to_string(),
            role: ArtistRole::Main,
        }]
    } else {
        artists
    };

    let tracks = t
        .pointer("/response/torrent/fileList")
        .and_then(|v| v.as_str())
        .map(|list| {
            list.split("|||")
                .filter_map(|entry| {
                    let name = entry.split("{{{").next()?;
                    Some(TrackInfo {
                        title: name.to_string(),
                        size_bytes: 0,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Metadata {
        tracker: tracker.to_string(),
        torrent_id: torrent_id.to_string(),
        group_id: t
            .pointer("/response/group/id")
            .map(|v| v.to_string())
            .unwrap_or_default(),
        title: t
            .pointer("/response/group/name")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        artists,
        tags: t
            .pointer("/response/group/tags")
            .and_then(|v| v.as_array())
            .map(|tags| tags.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default(),
        tracks,
        original_year: t.pointer("/response/group/year").and_then(|v| v.as_i64()).map(|y| y as i32),
        edition_year: t
            .pointer("/response/torrent/remasterYear")
            .and_then(|v| v.as_i64())
            .map(|y| y as i32),
        edition_name: t
            .pointer("/response/torrent/remasterTitle")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from),
        record_label: t
            .pointer("/response/torrent/remasterRecordLabel")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from),
        catalog_number: t
            .pointer("/response/torrent/remasterCatalogueNumber")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from),
        size_bytes: t.pointer("/response/torrent/size").and_then(|v| v.as_i64()).unwrap_or(0),
        log_score: t.pointer("/response/torrent/logScore").and_then(|v| v.as_i64()).map(|s| s as i32),
        uploader: t
            .pointer("/response/torrent/username")
            .and_then(|v| v.as_str())
            .map(String::from),
        cover_url: t
            .pointer("/response/group/wikiImage")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from),
        raw: t.clone(),
    }
}

fn sanitize_component(s: &str) -> String {
    s.chars()
        .map(|c| if "\\/:*?\"<>|".contains(c) { '_' } else { c })
        .collect()
}

/// Derives the deterministic, filesystem-safe torrent filename from the
/// fields named in the component check.
pub fn sanitized_torrent_name(announce: &Announce) -> String {
    let artist = announce.artists.first().map(String::as_str).unwrap_or("Unknown");
    let year = announce.year.map(|y| y.to_string()).unwrap_or_else(|| "0000".into());

    sanitize_component(&format!(
        "{} - {} ({}) [{} {} {} {}] [{}]",
        artist,
        announce.title,
        year,
        announce.release_type.as_str(),
        announce.format.as_str(),
        announce.quality.as_str(),
        announce.source.as_str(),
        announce.torrent_id,
    ))
}

pub struct SnatchContext<'a> {
    pub tracker_label: &'a str,
    pub filters: &'a [Filter],
    pub client: &'a TrackerClient,
    pub general: &'a General,
    pub library: &'a Library,
    pub global_uploader_blacklist: &'a [String],
    pub notifier: &'a Notifier,
}

pub enum SnatchOutcome {
    NoFilterMatched,
    Snatched { release: Release, watch_dir: PathBuf },
}

/// Runs the snatch pipeline for a single announce line. One failed filter
/// or one failed release never stops the outer caller; this function
/// returns `Ok(NoFilterMatched)` or an error local to this announce.
pub async fn handle_announce(line: &str, ctx: &SnatchContext<'_>) -> Result<SnatchOutcome> {
    let announce = crate::core::announce::parse(line).context("parsing announce line")?;

    let mut cached_metadata: Option<(TrackerMetadataResponse, Metadata)> = None;

    for filter in ctx.filters {
        if !filter.in_scope(ctx.tracker_label) {
            continue;
        }
        if !filter.satisfies(&announce) {
            continue;
        }

        if cached_metadata.is_none() {
            let response = ctx
                .client
                .fetch_release_metadata(&announce.torrent_id)
                .await
                .with_context(|| format!("fetching metadata for torrent {}", announce.torrent_id))?;
            let metadata = metadata_from_response(ctx.tracker_label, &announce.torrent_id, &response);
            cached_metadata = Some((response, metadata));
        }
        let (_, metadata) = cached_metadata.as_ref().expect("populated above");

        if !filter.has_compatible_tracker_info(metadata, ctx.global_uploader_blacklist) {
            continue;
        }

        if !filter.allow_duplicates()
            && ReleaseTable::exists(ctx.tracker_label, &announce.torrent_id).await?
        {
            info!(tracker = ctx.tracker_label, torrent_id = %announce.torrent_id, "duplicate snatch blocked");
            continue;
        }
        if filter.unique_in_group()
            && ReleaseTable::group_has_snatch(ctx.tracker_label, &metadata.group_id).await?
        {
            info!(tracker = ctx.tracker_label, group_id = %metadata.group_id, "group already has a snatch");
            continue;
        }

        let folder_name = sanitized_torrent_name(&announce);
        let watch_dir = PathBuf::from(filter.watch_directory(&ctx.general.download_directory));

        let torrent_bytes = ctx
            .client
            .download_torrent(&announce.torrent_id, false)
            .await
            .context("downloading torrent file")?;

        std::fs::create_dir_all(&watch_dir)?;
        let torrent_path = watch_dir.join(format!("{folder_name}.torrent"));
        std::fs::write(&torrent_path, &torrent_bytes)
            .with_context(|| format!("writing torrent file {}", torrent_path.display()))?;

        let release = Release {
            id: 0,
            tracker: ctx.tracker_label.to_string(),
            snatched_at: chrono::Utc::now().timestamp(),
            torrent_id: announce.torrent_id.clone(),
            group_id: metadata.group_id.clone(),
            artists: announce.artists.clone(),
            title: announce.title.clone(),
            year: announce.year,
            release_type: announce.release_type,
            format: announce.format,
            quality: announce.quality,
            source: announce.source,
            has_log: announce.has_log,
            has_cue: announce.has_cue,
            is_scene: announce.is_scene,
            log_score: metadata.log_score.or(announce.log_score),
            tags: announce.tags.clone(),
            size_bytes: metadata.size_bytes,
            folder_name: folder_name.clone(),
            matched_filter: filter.name().to_string(),
        };

        ReleaseTable::insert_one(&release).await.context("appending release to history")?;

        info!(
            tracker = ctx.tracker_label,
            filter = filter.name(),
            torrent_id = %release.torrent_id,
            "snatched"
        );
        ctx.notifier
            .notify(&format!("Snatched: {} - {}", release.artists.join(", "), release.title))
            .await;

        return Ok(SnatchOutcome::Snatched { release, watch_dir });
    }

    Ok(SnatchOutcome::NoFilterMatched)
}

/// Writes release JSON, group JSON, per-artist JSON, and a blank
/// user-metadata file into the release folder's `MetadataDir`, and
/// creates/updates `origin.json`. Run as a detached task so a failure here
/// never undoes the snatch that already happened.
pub async fn save_metadata_sidecar(
    release_folder: &Path,
    tracker: &str,
    torrent_id: &str,
    group_id: &str,
    response: &TrackerMetadataResponse,
) -> Result<()> {
    let paths = crate::config::Paths::get()?;
    let metadata_dir = paths.metadata_dir_for(release_folder);
    std::fs::create_dir_all(&metadata_dir)?;

    std::fs::write(
        metadata_dir.join(format!("{tracker}_release.json")),
        serde_json::to_string_pretty(&response.torrent)?,
    )?;
    std::fs::write(
        metadata_dir.join(format!("{tracker}_release_group.json")),
        serde_json::to_string_pretty(&response.group)?,
    )?;
    for (i, artist) in response.artists.iter().enumerate() {
        std::fs::write(
            metadata_dir.join(format!("{tracker}_artist_{i}.json")),
            serde_json::to_string_pretty(artist)?,
        )?;
    }

    let user_metadata_path = metadata_dir.join("user_metadata.json");
    if !user_metadata_path.exists() {
        std::fs::write(&user_metadata_path, "{}")?;
    }

    let mut sidecar = crate::models::OriginSidecar::load(&metadata_dir)?;
    sidecar.upsert(
        tracker,
        crate::models::Origin {
            tracker_url: String::new(),
            id: torrent_id.parse().unwrap_or(0),
            group_id: group_id.parse().unwrap_or(0),
            time_snatched: chrono::Utc::now().timestamp(),
            last_updated_metadata: chrono::Utc::now().timestamp(),
            is_alive: true,
        },
    );
    sidecar.save(&metadata_dir)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Format, Quality, ReleaseType, Source};

    fn announce() -> Announce {
        Announce {
            artists: vec!["An Artist".into()],
            title: "Title".into(),
            year: Some(2013),
            release_type: ReleaseType::Album,
            format: Format::Mp3,
            quality: Quality::Q320,
            source: Source::Cd,
            has_log: false,
            log_score: None,
            has_cue: false,
            is_scene: false,
            release_url: String::new(),
            download_url: String::new(),
            tags: vec![],
            torrent_id: "981243".into(),
        }
    }

    #[test]
    fn sanitizes_unsafe_filename_characters() {
        let mut a = announce();
        a.title = "Weird: Title / Name".into();
        let name = sanitized_torrent_name(&a);
        assert!(!name.contains(':'));
        assert!(!name.contains('/'));
        assert!(name.contains("981243"));
    }
}

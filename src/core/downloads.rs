//! The downloads indexer: reconciles on-disk release folders against the
//! `DownloadEntry` projection, and drives the sort (accept/reject/defer) and
//! library-export workflow.

use crate::config::sections::Library;
use crate::config::Paths;
use crate::db::DownloadTable;
use crate::models::{DownloadEntry, DownloadState, Metadata, OriginSidecar};
use crate::utils::parsers::render_template;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const MUSIC_EXTENSIONS: &[&str] = &["flac", "mp3", "m4a", "ogg", "wav", "aac"];

fn contains_music_file(dir: &Path) -> Result<bool> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.path().is_file() {
            if let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) {
                if MUSIC_EXTENSIONS.iter().any(|m| m.eq_ignore_ascii_case(ext)) {
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}

/// Builds the projected entry for a single folder from its origin sidecar.
fn build_entry(folder: &Path, folder_name: &str, previous: Option<DownloadEntry>) -> Result<DownloadEntry> {
    let paths = Paths::get()?;
    let metadata_dir = paths.metadata_dir_for(folder);
    let sidecar = OriginSidecar::load(&metadata_dir)?;

    let trackers: Vec<(String, String)> = sidecar
        .tracker_ids()
        .into_iter()
        .map(|(tracker, id)| (tracker, id.to_string()))
        .collect();

    let mut artists = Vec::new();
    for (tracker, _) in &trackers {
        let release_path = metadata_dir.join(format!("{tracker}_release.json"));
        if let Ok(raw) = std::fs::read_to_string(&release_path) {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&raw) {
                if let Some(names) = json
                    .pointer("/response/group/musicInfo/artists")
                    .and_then(|v| v.as_array())
                {
                    for a in names {
                        if let Some(name) = a.get("name").and_then(|v| v.as_str()) {
                            if !artists.contains(&name.to_string()) {
                                artists.push(name.to_string());
                            }
                        }
                    }
                }
            }
        }
    }

    let mut entry = previous.unwrap_or_else(|| DownloadEntry::new(folder_name.to_string()));
    entry.trackers = trackers;
    entry.has_tracker_metadata = !entry.trackers.is_empty();
    if !artists.is_empty() {
        entry.artists = artists;
    }
    Ok(entry)
}

async fn reconcile_folder(folder: &Path, folder_name: &str) -> Result<()> {
    let previous = DownloadTable::find_by_folder_name(folder_name).await?;
    let entry = build_entry(folder, folder_name, previous.clone())?;

    match previous {
        Some(_) => DownloadTable::update(&entry).await,
        None => DownloadTable::insert_one(&entry).await.map(|_| ()),
    }
}

/// Non-recursive reconciling scan of the download root and every configured
/// additional source. Entries with no corresponding folder are deleted.
pub async fn scan(download_root: &Path, additional_sources: &[PathBuf]) -> Result<()> {
    let mut roots = vec![download_root.to_path_buf()];
    roots.extend_from_slice(additional_sources);

    let mut seen = HashSet::new();

    for root in &roots {
        if !root.is_dir() {
            continue;
        }
        for entry in std::fs::read_dir(root).with_context(|| format!("reading {}", root.display()))? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() || !contains_music_file(&path)? {
                continue;
            }
            let folder_name = path.file_name().unwrap().to_string_lossy().to_string();
            seen.insert(folder_name.clone());
            reconcile_folder(&path, &folder_name).await?;
        }
    }

    for existing in DownloadTable::all().await? {
        if !seen.contains(&existing.folder_name) {
            DownloadTable::delete(existing.id).await?;
            info!(folder = existing.folder_name, "removed entry with no corresponding folder");
        }
    }

    Ok(())
}

/// Resolves `path` against the download root and additional sources, then
/// reconciles only that single folder.
pub async fn rescan_path(path: &Path, download_root: &Path, additional_sources: &[PathBuf]) -> Result<()> {
    let roots = std::iter::once(download_root).chain(additional_sources.iter().map(|p| p.as_path()));
    let resolved = roots
        .filter_map(|root| path.strip_prefix(root).ok().map(|_| ()))
        .next();
    if resolved.is_none() {
        anyhow::bail!("{} is not under the download root or an additional source", path.display());
    }
    let folder_name = path
        .file_name()
        .context("path has no folder name")?
        .to_string_lossy()
        .to_string();
    reconcile_folder(path, &folder_name).await
}

pub async fn rescan_ids(ids: &[i64], download_root: &Path, additional_sources: &[PathBuf]) -> Result<()> {
    for id in ids {
        let Some(entry) = DownloadTable::find_by_id(*id).await? else {
            warn!(id, "rescan requested for unknown download entry");
            continue;
        };
        for root in std::iter::once(download_root).chain(additional_sources.iter().map(|p| p.as_path())) {
            let candidate = root.join(&entry.folder_name);
            if candidate.is_dir() {
                reconcile_folder(&candidate, &entry.folder_name).await?;
                break;
            }
        }
    }
    Ok(())
}

pub async fn find_by_id(id: i64) -> Result<Option<DownloadEntry>> {
    DownloadTable::find_by_id(id).await
}

pub async fn find_by_folder_name(name: &str) -> Result<Option<DownloadEntry>> {
    DownloadTable::find_by_folder_name(name).await
}

pub async fn find_by_state(state: DownloadState) -> Result<Vec<DownloadEntry>> {
    DownloadTable::find_by_state(state).await
}

pub async fn find_by_artist(artist: &str) -> Result<Vec<DownloadEntry>> {
    DownloadTable::find_by_artist(artist).await
}

pub enum SortDecision {
    Accept,
    Reject,
    Defer,
}

/// Builds the ordered, deduplicated list of export candidate folder names:
/// the library template rendered against metadata, a bare `$a - $t` default,
/// then the folder's current name, as a last resort.
pub fn export_candidates(metadata: &Metadata, library: &Library, current_folder_name: &str) -> Vec<String> {
    let mut candidates = vec![
        render_template(&library.folder_template, metadata),
        render_template("$a - $t", metadata),
        current_folder_name.to_string(),
    ];
    candidates.dedup();
    candidates
}

/// Copies (or hard-links) `source_folder` into the library root under
/// `chosen_name`. Refuses if the destination already exists.
pub fn export(source_folder: &Path, library: &Library, chosen_name: &str) -> Result<PathBuf> {
    let destination = Path::new(&library.directory).join(chosen_name);
    if destination.exists() {
        anyhow::bail!("export destination already exists: {}", destination.display());
    }
    std::fs::create_dir_all(&destination)?;

    for entry in walkdir_flat(source_folder)? {
        let relative = entry.strip_prefix(source_folder)?;
        let target = destination.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if library.use_hardlinks {
            std::fs::hard_link(&entry, &target)
                .with_context(|| format!("hard-linking {}", entry.display()))?;
        } else {
            std::fs::copy(&entry, &target).with_context(|| format!("copying {}", entry.display()))?;
        }
    }

    Ok(destination)
}

fn walkdir_flat(root: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path.clone());
            }
            out.push(path);
        }
    }
    Ok(out)
}

/// Applies Accept/Reject/Defer to an unsorted entry. Accept exports and, on
/// success, marks the entry Accepted; a failed export leaves it Unsorted.
pub async fn apply_sort_decision(
    mut entry: DownloadEntry,
    decision: SortDecision,
    source_folder: &Path,
    metadata: Option<&Metadata>,
    library: &Library,
    chosen_name: &str,
) -> Result<DownloadEntry> {
    match decision {
        SortDecision::Defer => Ok(entry),
        SortDecision::Reject => {
            entry.state = DownloadState::Rejected;
            DownloadTable::update(&entry).await?;
            Ok(entry)
        }
        SortDecision::Accept => {
            let Some(metadata) = metadata else {
                anyhow::bail!("accept requires resolved metadata to export");
            };
            let _ = metadata;
            match export(source_folder, library, chosen_name) {
                Ok(_) => {
                    entry.state = DownloadState::Accepted;
                    DownloadTable::update(&entry).await?;
                    Ok(entry)
                }
                Err(e) => {
                    warn!(folder = entry.folder_name, error = %e, "export failed, entry left unsorted");
                    Ok(entry)
                }
            }
        }
    }
}

/// Moves every empty, or metadata-only, top-level subdirectory of
/// `download_root` into `download_root/VarroaClean`.
pub fn clean(download_root: &Path) -> Result<Vec<PathBuf>> {
    let paths = Paths::get()?;
    let clean_dir = paths.clean_dir(download_root);
    let mut moved = Vec::new();

    for entry in std::fs::read_dir(download_root)? {
        let path = entry?.path();
        if !path.is_dir() || path == clean_dir {
            continue;
        }
        if is_empty_or_metadata_only(&path, paths.metadata_dir_name())? {
            std::fs::create_dir_all(&clean_dir)?;
            let dest = clean_dir.join(path.file_name().unwrap());
            std::fs::rename(&path, &dest)?;
            moved.push(dest);
        }
    }
    Ok(moved)
}

fn is_empty_or_metadata_only(dir: &Path, metadata_dir_name: &str) -> Result<bool> {
    let mut children = std::fs::read_dir(dir)?.peekable();
    if children.peek().is_none() {
        return Ok(true);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let is_metadata_dir = entry.path().is_dir()
            && entry.file_name().to_string_lossy() == metadata_dir_name;
        if !is_metadata_dir {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metadata::{ArtistCredit, ArtistRole};
    use tempfile::TempDir;

    fn sample_metadata() -> Metadata {
        Metadata {
            tracker: "blue".into(),
            torrent_id: "1".into(),
            group_id: "1".into(),
            title: "T".into(),
            artists: vec![ArtistCredit {
                name: "A".into(),
                role: ArtistRole::Main,
            }],
            tags: vec![],
            tracks: vec![],
            original_year: Some(1987),
            edition_year: None,
            edition_name: None,
            record_label: None,
            catalog_number: None,
            size_bytes: 0,
            log_score: None,
            uploader: None,
            cover_url: None,
            raw: serde_json::json!({}),
        }
    }

    #[test]
    fn export_candidates_are_deduplicated_and_ordered() {
        let library = Library {
            directory: "/lib".into(),
            folder_template: "$a - $t".into(),
            ..Default::default()
        };
        let candidates = export_candidates(&sample_metadata(), &library, "Original Folder");
        assert_eq!(candidates, vec!["A - T".to_string(), "Original Folder".to_string()]);
    }

    #[test]
    fn clean_moves_empty_and_metadata_only_folders() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("X")).unwrap();
        std::fs::create_dir_all(root.path().join("Y/MetadataDir")).unwrap();
        std::fs::create_dir(root.path().join("Z")).unwrap();
        std::fs::write(root.path().join("Z/song.flac"), b"").unwrap();

        let _ = Paths::init(Some(TempDir::new().unwrap().path().to_path_buf()));

        let moved = clean(root.path()).unwrap();
        assert_eq!(moved.len(), 2);
        assert!(root.path().join("Z").exists());
        assert!(!root.path().join("X").exists());
    }

    #[test]
    fn export_refuses_existing_destination() {
        let source = TempDir::new().unwrap();
        std::fs::write(source.path().join("song.flac"), b"").unwrap();
        let library_root = TempDir::new().unwrap();
        std::fs::create_dir(library_root.path().join("Existing")).unwrap();

        let library = Library {
            directory: library_root.path().to_string_lossy().to_string(),
            folder_template: "$a - $t".into(),
            ..Default::default()
        };
        let result = export(source.path(), &library, "Existing");
        assert!(result.is_err());
    }
}

//! The read-only virtual filesystem's facet index and path resolution.
//! Pure and testable; wiring this to an actual kernel FUSE mount is an
//! external-I/O concern handled at the daemon-supervisor layer, disabled
//! with a single warning when the host has no fuse support.

use crate::db::FuseTable;
use crate::models::{Facet, FuseEntry};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Rebuilds the facet index from a fresh set of entries, replacing whatever
/// was indexed before.
pub async fn scan(entries: Vec<FuseEntry>) -> Result<()> {
    FuseTable::replace_all(&entries).await
}

/// A single readdir listing: either facet-level names (artists, tags, ...)
/// or value-level names (a particular artist) or leaf release folders.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    Facets(Vec<&'static str>),
    Values(Vec<String>),
    Releases(Vec<String>),
}

/// Lists the children of a virtual path: `/`, `/<facet>`, or
/// `/<facet>/<value>`.
pub async fn readdir(path: &Path) -> Result<Listing> {
    let components: Vec<String> = path
        .components()
        .filter_map(|c| c.as_os_str().to_str().map(str::to_string))
        .collect();

    match components.as_slice() {
        [] => Ok(Listing::Facets(Facet::all().iter().map(|f| f.dir_name()).collect())),
        [facet_name] => {
            let facet = facet_by_name(facet_name)?;
            let entries = FuseTable::all().await?;
            let mut values: Vec<String> = entries.iter().flat_map(|e| facet.values(e)).collect();
            values.sort();
            values.dedup();
            Ok(Listing::Values(values))
        }
        [facet_name, value] => {
            let facet = facet_by_name(facet_name)?;
            let entries = FuseTable::all().await?;
            let mut folders: Vec<String> = entries
                .iter()
                .filter(|e| facet.values(e).iter().any(|v| v == value))
                .map(|e| e.folder_name.clone())
                .collect();
            folders.sort();
            Ok(Listing::Releases(folders))
        }
        _ => anyhow::bail!("path too deep for the virtual filesystem: {}", path.display()),
    }
}

/// Resolves a leaf `/<facet>/<value>/<folder>` path to the real on-disk
/// folder, passing through for any remaining path segments beneath it.
pub async fn resolve(path: &Path, library_root: &Path) -> Result<PathBuf> {
    let components: Vec<String> = path
        .components()
        .filter_map(|c| c.as_os_str().to_str().map(str::to_string))
        .collect();

    let [_facet, _value, folder, rest @ ..] = components.as_slice() else {
        anyhow::bail!("path does not resolve to a release folder: {}", path.display());
    };

    let entries = FuseTable::all().await?;
    if !entries.iter().any(|e| &e.folder_name == folder) {
        anyhow::bail!("no indexed release folder named {folder}");
    }

    let mut real = library_root.join(folder);
    for segment in rest {
        real = real.join(segment);
    }
    Ok(real)
}

fn facet_by_name(name: &str) -> Result<Facet> {
    Facet::all()
        .iter()
        .copied()
        .find(|f| f.dir_name() == name)
        .ok_or_else(|| anyhow::anyhow!("unknown facet directory: {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(folder: &str, artist: &str, year: Option<i32>) -> FuseEntry {
        FuseEntry {
            id: 0,
            folder_name: folder.into(),
            artists: vec![artist.into()],
            tags: vec![],
            title: "T".into(),
            year,
            trackers: vec!["blue".into()],
            record_label: None,
            source: "CD".into(),
            format: "FLAC".into(),
        }
    }

    #[test]
    fn top_level_lists_four_facets() {
        let facets = Facet::all();
        assert_eq!(facets.len(), 4);
        assert_eq!(facets[0].dir_name(), "artists");
    }

    #[test]
    fn facet_values_collect_distinct_artists() {
        let entries = vec![entry("A", "Artist 1", Some(2020)), entry("B", "Artist 1", Some(2021))];
        let mut values: Vec<String> = entries.iter().flat_map(|e| Facet::Artists.values(e)).collect();
        values.sort();
        values.dedup();
        assert_eq!(values, vec!["Artist 1".to_string()]);
    }

    #[test]
    fn resolve_rejects_unknown_facet() {
        assert!(facet_by_name("nonexistent").is_err());
    }
}

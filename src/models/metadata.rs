//! The canonical in-memory release description: a merge of the tracker's
//! release JSON and an optional user-editable `user_metadata.json` override.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtistRole {
    Main,
    Featuring,
    Composer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistCredit {
    pub name: String,
    pub role: ArtistRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub title: String,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub tracker: String,
    pub torrent_id: String,
    pub group_id: String,
    pub title: String,
    pub artists: Vec<ArtistCredit>,
    pub tags: Vec<String>,
    pub tracks: Vec<TrackInfo>,
    pub original_year: Option<i32>,
    pub edition_year: Option<i32>,
    pub edition_name: Option<String>,
    pub record_label: Option<String>,
    pub catalog_number: Option<String>,
    pub size_bytes: i64,
    pub log_score: Option<i32>,
    pub uploader: Option<String>,
    pub cover_url: Option<String>,
    /// Full per-tracker payload, retained verbatim for the `<tracker>_release.json`
    /// sidecar even though only a subset is modeled above.
    pub raw: serde_json::Value,
}

impl Metadata {
    /// The first `ArtistRole::Main` credit, or the first credit of any role
    /// if none is explicitly marked Main.
    pub fn main_artist(&self) -> Option<&str> {
        self.artists
            .iter()
            .find(|a| a.role == ArtistRole::Main)
            .or_else(|| self.artists.first())
            .map(|a| a.name.as_str())
    }

    /// Looks up an alias for the main artist in the configured alias map,
    /// falling back to the artist name itself.
    pub fn main_artist_alias<'a>(&'a self, aliases: &'a HashMap<String, String>) -> &'a str {
        let main = self.main_artist().unwrap_or("");
        aliases.get(main).map(|s| s.as_str()).unwrap_or(main)
    }

    /// Looks up a library category for the main artist, falling back to
    /// "Unsorted" when no category map entry matches.
    pub fn category<'a>(&'a self, categories: &'a HashMap<String, String>) -> &'a str {
        let main = self.main_artist().unwrap_or("");
        categories
            .get(main)
            .map(|s| s.as_str())
            .unwrap_or("Unsorted")
    }

    /// Overlay a user-editable JSON document on top of this metadata.
    /// Only fields present in `overrides` replace the tracker-derived values.
    pub fn apply_user_overrides(&mut self, overrides: &serde_json::Value) {
        if let Some(title) = overrides.get("title").and_then(|v| v.as_str()) {
            self.title = title.to_string();
        }
        if let Some(label) = overrides.get("record_label").and_then(|v| v.as_str()) {
            self.record_label = Some(label.to_string());
        }
        if let Some(catalog) = overrides.get("catalog_number").and_then(|v| v.as_str()) {
            self.catalog_number = Some(catalog.to_string());
        }
        if let Some(tags) = overrides.get("tags").and_then(|v| v.as_array()) {
            self.tags = tags
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Metadata {
        Metadata {
            tracker: "blue".into(),
            torrent_id: "1".into(),
            group_id: "1".into(),
            title: "Title".into(),
            artists: vec![
                ArtistCredit {
                    name: "Featured".into(),
                    role: ArtistRole::Featuring,
                },
                ArtistCredit {
                    name: "Main Artist".into(),
                    role: ArtistRole::Main,
                },
            ],
            tags: vec![],
            tracks: vec![],
            original_year: Some(1987),
            edition_year: Some(2017),
            edition_name: Some("Deluxe".into()),
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
    fn main_artist_prefers_main_role() {
        assert_eq!(sample().main_artist(), Some("Main Artist"));
    }

    #[test]
    fn alias_map_overrides_display_name() {
        let mut aliases = HashMap::new();
        aliases.insert("Main Artist".to_string(), "M.A.".to_string());
        assert_eq!(sample().main_artist_alias(&aliases), "M.A.");
    }

    #[test]
    fn category_falls_back_to_unsorted() {
        let categories = HashMap::new();
        assert_eq!(sample().category(&categories), "Unsorted");
    }

    #[test]
    fn user_overrides_replace_only_present_fields() {
        let mut m = sample();
        m.apply_user_overrides(&serde_json::json!({"title": "New Title"}));
        assert_eq!(m.title, "New Title");
        assert_eq!(m.original_year, Some(1987));
    }
}

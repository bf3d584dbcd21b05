//! The partial release description extracted from a single IRC announce line.

use super::vocab::{Format, Quality, ReleaseType, Source};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announce {
    pub artists: Vec<String>,
    pub title: String,
    pub year: Option<i32>,
    pub release_type: ReleaseType,
    pub format: Format,
    pub quality: Quality,
    pub source: Source,
    pub has_log: bool,
    /// `None` when the announce line carries no log-score token at all,
    /// distinct from a present-but-zero score.
    pub log_score: Option<i32>,
    pub has_cue: bool,
    pub is_scene: bool,
    pub release_url: String,
    pub download_url: String,
    pub tags: Vec<String>,
    pub torrent_id: String,
}

impl Announce {
    /// Splits a raw artist field on `&` and the literal word "performed by"
    /// into a sub-artist list, appended to a single-element list headed by
    /// the raw, unsplit artist string.
    pub fn split_artists(raw: &str) -> Vec<String> {
        let header = raw.trim().to_string();
        let normalized = raw.replace(" performed by ", " & ");

        let mut artists = vec![header.clone()];
        for piece in normalized.split('&') {
            let piece = piece.trim().to_string();
            if !piece.is_empty() && piece != header {
                artists.push(piece);
            }
        }
        artists
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_artist_is_unchanged() {
        assert_eq!(Announce::split_artists("An artist"), vec!["An artist"]);
    }

    #[test]
    fn splits_on_ampersand() {
        assert_eq!(
            Announce::split_artists("Artist A & Artist B"),
            vec!["Artist A & Artist B", "Artist A", "Artist B"]
        );
    }

    #[test]
    fn splits_on_performed_by() {
        assert_eq!(
            Announce::split_artists("Composer X performed by Orchestra Y"),
            vec![
                "Composer X performed by Orchestra Y",
                "Composer X",
                "Orchestra Y"
            ]
        );
    }
}

//! Parses a single IRC announce line into a partial [`Announce`].
//!
//! Two grammars are tried in sequence: the primary grammar covers the
//! common case; the alternative swaps the tag-list and release-URL
//! positions, which some announcer configurations use. A match by either
//! is treated as valid, primary first.

use crate::models::{Announce, Format, Quality, ReleaseType, Source};
use crate::utils::colorstrip;
use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::str::FromStr;

lazy_static! {
    static ref PRIMARY: Regex = Regex::new(concat!(
        r"^(?P<artist>.+?) - (?P<title>.+?) \[(?P<year>\d{4})\] \[(?P<type>[^\]]+)\] - ",
        r"(?P<format>\S+) / (?P<quality>[^/]+?) / (?P<source>[^/\-]+?)",
        r"(?: / (?P<haslog>Log)(?:\s*\((?P<logscore>\d+)%\))?)?",
        r"(?: / (?P<hascue>Cue))?(?: / (?P<scene>Scene))? - ",
        r"(?P<release_url>\S+) / (?P<download_url>\S+) - (?P<tags>.+)$",
    ))
    .unwrap();
    static ref ALTERNATIVE: Regex = Regex::new(concat!(
        r"^(?P<artist>.+?) - (?P<title>.+?) \[(?P<year>\d{4})\] \[(?P<type>[^\]]+)\] - ",
        r"(?P<format>\S+) / (?P<quality>[^/]+?) / (?P<source>[^/\-]+?)",
        r"(?: / (?P<haslog>Log)(?:\s*\((?P<logscore>\d+)%\))?)?",
        r"(?: / (?P<hascue>Cue))?(?: / (?P<scene>Scene))? - ",
        r"(?P<tags>.+?) - (?P<release_url>\S+) / (?P<download_url>\S+)$",
    ))
    .unwrap();
    static ref TORRENT_ID: Regex = Regex::new(r"[?&]id=(\d+)").unwrap();
}

/// Parses a raw announce line, stripping IRC color codes first.
pub fn parse(line: &str) -> Result<Announce> {
    let clean = colorstrip::strip(line);

    let captures = PRIMARY
        .captures(&clean)
        .or_else(|| ALTERNATIVE.captures(&clean))
        .with_context(|| format!("announce line did not match either grammar: {clean:?}"))?;

    build(&captures)
}

fn build(captures: &Captures) -> Result<Announce> {
    let get = |name: &str| -> &str { captures.name(name).map(|m| m.as_str()).unwrap_or("") };

    let artist_raw = get("artist");
    let title = get("title").trim().to_string();
    let year = get("year").parse::<i32>().ok();

    let release_type = ReleaseType::from_str(get("type").trim())
        .context("unrecognized release-type in announce")?;
    let format =
        Format::from_str(get("format").trim()).context("unrecognized format in announce")?;
    let quality =
        Quality::from_str(get("quality").trim()).context("unrecognized quality in announce")?;
    let source =
        Source::from_str(get("source").trim()).context("unrecognized source in announce")?;

    let has_log = captures.name("haslog").is_some();
    let log_score = captures
        .name("logscore")
        .and_then(|m| m.as_str().parse::<i32>().ok());
    let has_cue = captures.name("hascue").is_some();
    let is_scene = captures.name("scene").is_some();

    let release_url = get("release_url").to_string();
    let download_url = get("download_url").to_string();

    let torrent_id = TORRENT_ID
        .captures_iter(&download_url)
        .last()
        .map(|c| c[1].to_string())
        .with_context(|| format!("no torrent id found in download url {download_url:?}"))?;

    let tags = get("tags")
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    Ok(Announce {
        artists: Announce::split_artists(artist_raw),
        title,
        year,
        release_type,
        format,
        quality,
        source,
        has_log,
        log_score,
        has_cue,
        is_scene,
        release_url,
        download_url,
        tags,
        torrent_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scenario_a() {
        let line = "An artist - Title [2013] [Album] - MP3 / 320 / CD - \
                    https://example.org/torrents.php?id=93821 / \
                    https://example.org/torrents.php?action=download&id=981243 - tag1,tag2";

        let announce = parse(line).unwrap();

        assert_eq!(announce.artists, vec!["An artist"]);
        assert_eq!(announce.title, "Title");
        assert_eq!(announce.year, Some(2013));
        assert_eq!(announce.release_type, ReleaseType::Album);
        assert_eq!(announce.format, Format::Mp3);
        assert_eq!(announce.quality, Quality::Q320);
        assert_eq!(announce.source, Source::Cd);
        assert!(!announce.has_log);
        assert_eq!(announce.log_score, None);
        assert!(!announce.has_cue);
        assert!(!announce.is_scene);
        assert_eq!(announce.tags, vec!["tag1", "tag2"]);
        assert_eq!(announce.torrent_id, "981243");
    }

    #[test]
    fn parses_log_and_cue_markers() {
        let line = "Artist - Title [1999] [Album] - FLAC / Lossless / CD / Log (100%) / Cue - \
                    https://example.org/torrents.php?id=1 / \
                    https://example.org/torrents.php?action=download&id=2 - tag1";

        let announce = parse(line).unwrap();
        assert!(announce.has_log);
        assert_eq!(announce.log_score, Some(100));
        assert!(announce.has_cue);
    }

    #[test]
    fn rejects_unknown_release_type() {
        let line = "Artist - Title [1999] [Bogus] - MP3 / 320 / CD - \
                    https://example.org/torrents.php?id=1 / \
                    https://example.org/torrents.php?action=download&id=2 - tag1";
        assert!(parse(line).is_err());
    }
}

//! Small text-substitution helpers: the library folder-name template
//! renderer and the `r/`/`xr/` pattern-matching convention shared by the
//! filter engine's tag and label lists.

use crate::models::Metadata;
use anyhow::Result;
use regex::Regex;

/// A configured pattern: literal (case-insensitive exact match), a regular
/// expression (`r/...`), or a negated regular expression (`xr/...`).
pub enum Pattern {
    Literal(String),
    Regex(Regex),
    NegatedRegex(Regex),
}

impl Pattern {
    pub fn parse(spec: &str) -> Result<Self> {
        if let Some(body) = spec.strip_prefix("xr/") {
            return Ok(Pattern::NegatedRegex(Regex::new(body)?));
        }
        if let Some(body) = spec.strip_prefix("r/") {
            return Ok(Pattern::Regex(Regex::new(body)?));
        }
        Ok(Pattern::Literal(spec.to_string()))
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Pattern::Literal(lit) => lit.eq_ignore_ascii_case(value),
            Pattern::Regex(re) => re.is_match(value),
            Pattern::NegatedRegex(re) => !re.is_match(value),
        }
    }
}

fn edition_abbreviation(name: &str) -> String {
    const KNOWN: &[(&str, &str)] = &[
        ("deluxe", "DLX"),
        ("limited", "LTD"),
        ("special", "SPE"),
        ("anniversary", "ANV"),
        ("remastered", "RM"),
        ("expanded", "EXP"),
        ("bonus", "BON"),
    ];
    let lower = name.to_lowercase();
    for (word, abbrev) in KNOWN {
        if lower == *word {
            return abbrev.to_string();
        }
    }
    name.chars()
        .take(3)
        .collect::<String>()
        .to_uppercase()
}

/// Renders a library folder-name template against release metadata.
///
/// Recognized tokens: `$a` (main artist), `$y` (original year), `$t` (title),
/// `$f` (format), `$s` (source), and `$id`, a composite edition block that
/// expands to the comma-joined, present-only list of edition year, edition
/// abbreviation, and catalog number.
pub fn render_template(template: &str, metadata: &Metadata) -> String {
    let mut id_parts = Vec::new();
    if let Some(year) = metadata.edition_year {
        id_parts.push(year.to_string());
    }
    if let Some(edition) = &metadata.edition_name {
        id_parts.push(edition_abbreviation(edition));
    }
    if let Some(catalog) = &metadata.catalog_number {
        id_parts.push(catalog.clone());
    }
    let id_block = id_parts.join(", ");

    let main_artist = metadata.main_artist().unwrap_or("Unknown Artist");
    let year = metadata
        .original_year
        .map(|y| y.to_string())
        .unwrap_or_default();

    template
        .replace("$id", &id_block)
        .replace("$a", main_artist)
        .replace("$y", &year)
        .replace("$t", &metadata.title)
        .replace("$f", metadata.raw.get("format").and_then(|v| v.as_str()).unwrap_or(""))
        .replace("$s", metadata.raw.get("source").and_then(|v| v.as_str()).unwrap_or(""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metadata::{ArtistCredit, ArtistRole};

    fn sample() -> Metadata {
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
            edition_year: Some(2017),
            edition_name: Some("Deluxe".into()),
            record_label: None,
            catalog_number: Some("CN".into()),
            size_bytes: 0,
            log_score: None,
            uploader: None,
            cover_url: None,
            raw: serde_json::json!({"format": "FLAC", "source": "WEB"}),
        }
    }

    #[test]
    fn renders_export_candidate() {
        let rendered = render_template("$a ($y) $t {$id} [$f $s]", &sample());
        assert_eq!(rendered, "A (1987) T {2017, DLX, CN} [FLAC WEB]");
    }

    #[test]
    fn literal_pattern_is_case_insensitive() {
        let p = Pattern::parse("Trance").unwrap();
        assert!(p.matches("trance"));
        assert!(!p.matches("house"));
    }

    #[test]
    fn regex_pattern_matches() {
        let p = Pattern::parse("r/^live.*$").unwrap();
        assert!(p.matches("live album"));
        assert!(!p.matches("studio album"));
    }

    #[test]
    fn negated_regex_inverts_match() {
        let p = Pattern::parse("xr/^bootleg$/").unwrap();
        assert!(p.matches("album"));
        assert!(!p.matches("bootleg"));
    }
}

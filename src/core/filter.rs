//! The filter engine: a named predicate over an [`Announce`] (cheap) and a
//! [`Metadata`] (expensive, network-fed), evaluated in two phases so that a
//! tracker API call is only spent on announces worth the cost.

use crate::config::sections::FilterSection;
use crate::models::{vocab, Announce, Metadata};
use crate::utils::parsers::Pattern;
use anyhow::Result;
use std::str::FromStr;
use tracing::debug;

pub fn validate_tag_pattern(pattern: &str) -> Result<()> {
    Pattern::parse(pattern).map(|_| ())
}

/// A filter ready for evaluation: the perfect-flac macro, if set, has
/// already been expanded into the equivalent component fields.
#[derive(Debug, Clone)]
pub struct Filter {
    section: FilterSection,
}

impl Filter {
    /// Builds an evaluation-ready filter from its configuration section,
    /// expanding the perfect-flac macro. `FilterSection::check` has already
    /// rejected a config that sets perfect-flac alongside its own
    /// component fields, so expansion here never conflicts with an
    /// explicit value.
    pub fn from_section(section: &FilterSection) -> Self {
        let mut section = section.clone();
        if section.perfect_flac {
            section.formats = vec![vocab::Format::Flac.as_str().to_string()];
            section.qualities = vec![
                vocab::Quality::Lossless.as_str().to_string(),
                vocab::Quality::Lossless24.as_str().to_string(),
            ];
            section.has_log = Some(true);
            section.has_cue = Some(true);
            section.min_log_score = Some(100);
            section.sources = vocab::Source::all().iter().map(|s| s.as_str().to_string()).collect();
        }
        Filter { section }
    }

    pub fn name(&self) -> &str {
        &self.section.name
    }

    pub fn in_scope(&self, tracker: &str) -> bool {
        self.section.tracker_scope.is_empty()
            || self.section.tracker_scope.iter().any(|t| t == tracker)
    }

    pub fn watch_directory<'a>(&'a self, default: &'a str) -> &'a str {
        self.section.watch_directory.as_deref().unwrap_or(default)
    }

    pub fn allow_duplicates(&self) -> bool {
        self.section.allow_duplicates
    }

    pub fn unique_in_group(&self) -> bool {
        self.section.unique_in_group
    }

    /// The announce-only predicate. Artist is deliberately not tested here:
    /// the announce line may omit collaborating artists, so the final
    /// artist check happens in [`Filter::has_compatible_tracker_info`].
    pub fn satisfies(&self, announce: &Announce) -> bool {
        let s = &self.section;

        if !s.years.is_empty() {
            let Some(year) = announce.year else {
                debug!(filter = s.name, "reject: announce has no year");
                return false;
            };
            if !s.years.contains(&year) {
                debug!(filter = s.name, "reject: year {year} not in filter list");
                return false;
            }
        }

        if !s.release_types_include.is_empty()
            && !s
                .release_types_include
                .iter()
                .any(|t| t.eq_ignore_ascii_case(announce.release_type.as_str()))
        {
            debug!(filter = s.name, "reject: release type not included");
            return false;
        }
        if s.release_types_exclude
            .iter()
            .any(|t| t.eq_ignore_ascii_case(announce.release_type.as_str()))
        {
            debug!(filter = s.name, "reject: release type excluded");
            return false;
        }

        if !s.formats.is_empty()
            && !s.formats.iter().any(|f| f.eq_ignore_ascii_case(announce.format.as_str()))
        {
            debug!(filter = s.name, "reject: format not in filter list");
            return false;
        }

        if !s.sources.is_empty()
            && !s.sources.iter().any(|src| src.eq_ignore_ascii_case(announce.source.as_str()))
        {
            debug!(filter = s.name, "reject: source not in filter list");
            return false;
        }

        if !s.qualities.is_empty()
            && !s
                .qualities
                .iter()
                .any(|q| q.eq_ignore_ascii_case(announce.quality.as_str()))
        {
            debug!(filter = s.name, "reject: quality not in filter list");
            return false;
        }

        if let Some(required) = s.has_log {
            if announce.has_log != required {
                debug!(filter = s.name, "reject: has_log mismatch");
                return false;
            }
        }
        if let Some(required) = s.has_cue {
            if announce.has_cue != required {
                debug!(filter = s.name, "reject: has_cue mismatch");
                return false;
            }
        }
        if !s.allow_scene && announce.is_scene {
            debug!(filter = s.name, "reject: scene release not allowed");
            return false;
        }

        // Log-score is compared only when the announce actually carried a
        // score; an absent score never fails this phase.
        if let (Some(min), Some(score)) = (s.min_log_score, announce.log_score) {
            if score < min {
                debug!(filter = s.name, "reject: log score below minimum");
                return false;
            }
        }

        if !tags_satisfy(&s.tags_included, &s.tags_excluded, &s.tags_required, &announce.tags) {
            debug!(filter = s.name, "reject: tag predicate failed");
            return false;
        }

        true
    }

    /// The metadata-fed predicate, tested only after [`Filter::satisfies`]
    /// passes and a tracker fetch has resolved the full metadata.
    pub fn has_compatible_tracker_info(
        &self,
        metadata: &Metadata,
        global_uploader_blacklist: &[String],
    ) -> bool {
        let s = &self.section;

        if let Some(edition_year) = metadata.edition_year {
            if !s.edition_years.is_empty() && !s.edition_years.contains(&edition_year) {
                debug!(filter = s.name, "reject: edition year not in filter list");
                return false;
            }
        }

        if !s.record_labels.is_empty() {
            let label = metadata.record_label.as_deref().unwrap_or("");
            let matches = s.record_labels.iter().any(|pat| {
                Pattern::parse(pat).map(|p| p.matches(label)).unwrap_or(false)
            });
            if !matches {
                debug!(filter = s.name, "reject: record label pattern mismatch");
                return false;
            }
        }

        let artist_names: Vec<&str> = metadata.artists.iter().map(|a| a.name.as_str()).collect();
        if !s.artists_include.is_empty()
            && !s
                .artists_include
                .iter()
                .any(|wanted| artist_names.iter().any(|a| a.eq_ignore_ascii_case(wanted)))
        {
            debug!(filter = s.name, "reject: no included artist present");
            return false;
        }
        if s.artists_exclude
            .iter()
            .any(|excluded| artist_names.iter().any(|a| a.eq_ignore_ascii_case(excluded)))
        {
            debug!(filter = s.name, "reject: excluded artist present");
            return false;
        }

        if let Some(uploader) = &metadata.uploader {
            if global_uploader_blacklist.iter().any(|u| u.eq_ignore_ascii_case(uploader))
                || s.uploaders_exclude.iter().any(|u| u.eq_ignore_ascii_case(uploader))
            {
                debug!(filter = s.name, "reject: blacklisted uploader");
                return false;
            }
            if !s.uploaders_include.is_empty()
                && !s.uploaders_include.iter().any(|u| u.eq_ignore_ascii_case(uploader))
            {
                debug!(filter = s.name, "reject: uploader not in allow list");
                return false;
            }
        }

        let size_mb = metadata.size_bytes / (1024 * 1024);
        if let Some(min) = s.min_size_mb {
            if size_mb < min {
                debug!(filter = s.name, "reject: below min size");
                return false;
            }
        }
        if let Some(max) = s.max_size_mb {
            if size_mb > max {
                debug!(filter = s.name, "reject: above max size");
                return false;
            }
        }

        if let Some(min) = s.min_log_score {
            if metadata.log_score.map(|score| score < min).unwrap_or(true) {
                debug!(filter = s.name, "reject: log score unavailable or below minimum");
                return false;
            }
        }

        if !s.edition_name_patterns.is_empty() {
            let edition = metadata.edition_name.as_deref().unwrap_or("");
            let matches = s.edition_name_patterns.iter().any(|pat| {
                Pattern::parse(pat).map(|p| p.matches(edition)).unwrap_or(false)
            });
            if !matches {
                debug!(filter = s.name, "reject: edition name pattern mismatch");
                return false;
            }
        }

        if s.reject_unknown && metadata.record_label.is_none() && metadata.catalog_number.is_none() {
            debug!(filter = s.name, "reject: unknown release with no label or catalog");
            return false;
        }

        true
    }
}

fn tags_satisfy(included: &[String], excluded: &[String], required: &[String], tags: &[String]) -> bool {
    let compiled = |pats: &[String]| -> Vec<Pattern> {
        pats.iter().filter_map(|p| Pattern::parse(p).ok()).collect()
    };

    let any_match = |pats: &[Pattern]| pats.iter().any(|p| tags.iter().any(|t| p.matches(t)));
    let all_match = |pats: &[Pattern]| pats.iter().all(|p| tags.iter().any(|t| p.matches(t)));
    let none_match = |pats: &[Pattern]| !pats.iter().any(|p| tags.iter().any(|t| p.matches(t)));

    let included = compiled(included);
    let excluded = compiled(excluded);
    let required = compiled(required);

    (included.is_empty() || any_match(&included))
        && (excluded.is_empty() || none_match(&excluded))
        && (required.is_empty() || all_match(&required))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metadata::{ArtistCredit, ArtistRole};
    use crate::models::{Format, Quality, ReleaseType, Source};

    fn base_announce() -> Announce {
        Announce {
            artists: vec!["X".into()],
            title: "Title".into(),
            year: Some(2020),
            release_type: ReleaseType::Album,
            format: Format::Flac,
            quality: Quality::Lossless,
            source: Source::Cd,
            has_log: true,
            log_score: Some(100),
            has_cue: true,
            is_scene: false,
            release_url: String::new(),
            download_url: String::new(),
            tags: vec![],
            torrent_id: "1".into(),
        }
    }

    fn metadata_with_artist(name: &str) -> Metadata {
        Metadata {
            tracker: "blue".into(),
            torrent_id: "1".into(),
            group_id: "1".into(),
            title: "Title".into(),
            artists: vec![ArtistCredit {
                name: name.into(),
                role: ArtistRole::Main,
            }],
            tags: vec![],
            tracks: vec![],
            original_year: Some(2020),
            edition_year: None,
            edition_name: None,
            record_label: None,
            catalog_number: None,
            size_bytes: 300 * 1024 * 1024,
            log_score: Some(100),
            uploader: None,
            cover_url: None,
            raw: serde_json::json!({}),
        }
    }

    fn scoped_filter(overrides: impl FnOnce(&mut FilterSection)) -> Filter {
        let mut section = FilterSection {
            name: "test".into(),
            tracker_scope: vec![],
            sources: vec!["CD".into()],
            has_log: Some(true),
            ..Default::default()
        };
        overrides(&mut section);
        Filter::from_section(&section)
    }

    #[test]
    fn two_phase_match_scenario_b() {
        let filter = scoped_filter(|s| {
            s.artists_include = vec!["X".into()];
        });

        assert!(filter.satisfies(&base_announce()));
        assert!(filter.has_compatible_tracker_info(&metadata_with_artist("X"), &[]));
    }

    #[test]
    fn metadata_phase_rejects_missing_artist() {
        let filter = scoped_filter(|s| {
            s.artists_include = vec!["Y".into()];
        });
        assert!(filter.satisfies(&base_announce()));
        assert!(!filter.has_compatible_tracker_info(&metadata_with_artist("X"), &[]));
    }

    #[test]
    fn perfect_flac_expands_component_fields() {
        let section = FilterSection {
            name: "pf".into(),
            perfect_flac: true,
            ..Default::default()
        };
        let filter = Filter::from_section(&section);
        assert!(filter.satisfies(&base_announce()));
    }

    #[test]
    fn tag_regex_patterns() {
        let tags = vec!["live-recording".to_string()];
        assert!(tags_satisfy(&["r/^live.*$".to_string()], &[], &[], &tags));
        assert!(!tags_satisfy(&["xr/^live.*$".to_string()], &[], &[], &tags));
    }
}

//! Closed vocabularies for release tags.
//!
//! Announce parsing and filter configuration both validate against these sets;
//! an unrecognized token is a parse failure (announce) or a configuration
//! error (filter), never a silently-accepted free string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! closed_vocab {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn all() -> &'static [$name] {
                &[$($name::$variant),+]
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(if s.eq_ignore_ascii_case($text) {
                    return Ok($name::$variant);
                })+
                anyhow::bail!("unrecognized {}: {:?}", stringify!($name), s)
            }
        }
    };
}

closed_vocab!(Source {
    Cd => "CD",
    Dvd => "DVD",
    Vinyl => "Vinyl",
    Soundboard => "Soundboard",
    Sacd => "SACD",
    Dat => "DAT",
    Cassette => "Cassette",
    Web => "WEB",
    BluRay => "Blu-Ray",
});

closed_vocab!(Format {
    Flac => "FLAC",
    Mp3 => "MP3",
    Aac => "AAC",
});

closed_vocab!(Quality {
    Lossless => "Lossless",
    Lossless24 => "24bit Lossless",
    V0 => "V0 (VBR)",
    V2 => "V2 (VBR)",
    Q320 => "320",
    Q256 => "256",
});

closed_vocab!(ReleaseType {
    Album => "Album",
    Soundtrack => "Soundtrack",
    Compilation => "Compilation",
    Anthology => "Anthology",
    Ep => "EP",
    Single => "Single",
    LiveAlbum => "Live album",
    Remix => "Remix",
    Bootleg => "Bootleg",
    Interview => "Interview",
    Mixtape => "Mixtape",
    Demo => "Demo",
    ConcertRecording => "Concert Recording",
    DjMix => "DJ Mix",
    Unknown => "Unknown",
});

/// The "perfect-flac" macro expands to this frozen set of source values
/// rather than a single tag, since any lossless source is acceptable.
pub fn perfect_flac_sources() -> Vec<Source> {
    Source::all().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_display_and_parse() {
        for s in Source::all() {
            assert_eq!(Source::from_str(s.as_str()).unwrap(), *s);
        }
        for f in Format::all() {
            assert_eq!(Format::from_str(f.as_str()).unwrap(), *f);
        }
    }

    #[test]
    fn rejects_unknown_token() {
        assert!(Source::from_str("LaserDisc").is_err());
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(Format::from_str("flac").unwrap(), Format::Flac);
    }
}

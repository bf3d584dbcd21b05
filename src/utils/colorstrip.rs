//! Strips ANSI and mIRC color/formatting codes from announce lines before
//! they reach the parser.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ANSI_ESCAPE: Regex = Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap();
    static ref MIRC_COLOR: Regex = Regex::new(r"\x03(?:\d{1,2}(?:,\d{1,2})?)?").unwrap();
}

const MIRC_CONTROL_CODES: &[char] = &['\x02', '\x0f', '\x16', '\x1d', '\x1f'];

/// Removes ANSI escape sequences, mIRC color codes, and mIRC formatting
/// control characters (bold, underline, reverse, italic, reset) from a line.
pub fn strip(line: &str) -> String {
    let without_ansi = ANSI_ESCAPE.replace_all(line, "");
    let without_mirc_color = MIRC_COLOR.replace_all(&without_ansi, "");
    without_mirc_color
        .chars()
        .filter(|c| !MIRC_CONTROL_CODES.contains(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_mirc_color_codes() {
        let input = "\x0304An artist\x03 - Title";
        assert_eq!(strip(input), "An artist - Title");
    }

    #[test]
    fn strips_ansi_escapes() {
        let input = "\x1b[1;31mAn artist\x1b[0m - Title";
        assert_eq!(strip(input), "An artist - Title");
    }

    #[test]
    fn strips_bold_and_reset() {
        let input = "\x02An artist\x0f - Title";
        assert_eq!(strip(input), "An artist - Title");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        assert_eq!(strip("An artist - Title"), "An artist - Title");
    }
}

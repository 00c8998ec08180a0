//! Environment-driven output settings.

use teleterm_core::output::{DEFAULT_VISIBLE_LINES, OutputMode, OutputOptions};

pub const VISIBLE_LINES_ENV: &str = "TELETERM_VISIBLE_LINES";
pub const SPLIT_MESSAGES_ENV: &str = "TELETERM_SPLIT_MESSAGES";

/// Read `TELETERM_VISIBLE_LINES` and `TELETERM_SPLIT_MESSAGES`.
pub fn output_options_from_env() -> OutputOptions {
    let lines = std::env::var(VISIBLE_LINES_ENV).ok();
    let split = std::env::var(SPLIT_MESSAGES_ENV).ok();
    output_options(lines.as_deref(), split.as_deref())
}

pub fn output_options(visible_lines: Option<&str>, split: Option<&str>) -> OutputOptions {
    OutputOptions {
        visible_lines: parse_visible_lines(visible_lines),
        mode: if parse_split(split) {
            OutputMode::Split
        } else {
            OutputMode::Truncate
        },
    }
}

/// Positive integer, else the default.
pub fn parse_visible_lines(raw: Option<&str>) -> usize {
    match raw.map(|s| s.trim().parse::<usize>()) {
        Some(Ok(n)) if n > 0 => n,
        Some(_) => {
            tracing::warn!(value = ?raw, "ignoring invalid {VISIBLE_LINES_ENV}");
            DEFAULT_VISIBLE_LINES
        }
        None => DEFAULT_VISIBLE_LINES,
    }
}

/// `1` or `true` (any case).
pub fn parse_split(raw: Option<&str>) -> bool {
    raw.is_some_and(|s| s == "1" || s.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_lines_parsing() {
        assert_eq!(parse_visible_lines(None), 40);
        assert_eq!(parse_visible_lines(Some("25")), 25);
        assert_eq!(parse_visible_lines(Some(" 60 ")), 60);
        assert_eq!(parse_visible_lines(Some("0")), 40);
        assert_eq!(parse_visible_lines(Some("-3")), 40);
        assert_eq!(parse_visible_lines(Some("lots")), 40);
    }

    #[test]
    fn split_parsing() {
        assert!(!parse_split(None));
        assert!(parse_split(Some("1")));
        assert!(parse_split(Some("TRUE")));
        assert!(parse_split(Some("true")));
        assert!(!parse_split(Some("yes")));
        assert!(!parse_split(Some("0")));
    }

    #[test]
    fn combined_options() {
        let opts = output_options(Some("10"), Some("1"));
        assert_eq!(opts.visible_lines, 10);
        assert_eq!(opts.mode, OutputMode::Split);
        assert_eq!(output_options(None, None), OutputOptions::default());
    }
}

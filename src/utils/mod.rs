//! Utility functions and helpers.

pub mod http;

use unicode_segmentation::UnicodeSegmentation;
use url::Url;

/// Host without a leading `www.`.
pub fn bare_host(url: &Url) -> Option<String> {
    url.host_str()
        .map(|h| h.trim_start_matches("www.").to_lowercase())
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` grapheme clusters.
pub fn truncate_graphemes(text: &str, max: usize) -> String {
    text.graphemes(true).take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_host() {
        let url = Url::parse("https://WWW.Rillet.com/docs").unwrap();
        assert_eq!(bare_host(&url), Some("rillet.com".to_string()));
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a\n\t b   c "), "a b c");
        assert_eq!(normalize_whitespace("   "), "");
    }

    #[test]
    fn test_truncate_graphemes() {
        assert_eq!(truncate_graphemes("héllo", 2), "hé");
        assert_eq!(truncate_graphemes("👍🏽ok", 1), "👍🏽");
        assert_eq!(truncate_graphemes("abc", 10), "abc");
    }
}

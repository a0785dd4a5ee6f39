// src/utils/text.rs

//! Text cleanup for titles, descriptions and abstracts.

use scraper::Html;

/// Collapse every whitespace run to a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove markup tags, decode HTML entities and collapse whitespace.
///
/// Tags are replaced by a space so adjacent blocks do not run together.
pub fn strip_html(input: &str) -> String {
    if !input.contains('<') && !input.contains('&') {
        return collapse_whitespace(input);
    }

    let fragment = Html::parse_fragment(input);
    let pieces: Vec<&str> = fragment.root_element().text().collect();
    collapse_whitespace(&pieces.join(" "))
}

/// Clean an optional field, mapping blank results to `None`.
pub fn clean_optional(input: Option<&str>) -> Option<String> {
    input.map(strip_html).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b   c "), "a b c");
        assert_eq!(collapse_whitespace("   "), "");
    }

    #[test]
    fn test_strip_tags_and_collapse() {
        assert_eq!(
            strip_html("<p>First   line</p>\n<p>Second <b>bold</b></p>"),
            "First line Second bold"
        );
    }

    #[test]
    fn test_decodes_entities() {
        assert_eq!(
            strip_html("Fish &amp; Chips &lt;3 &quot;quoted&quot; it&#39;s"),
            "Fish & Chips <3 \"quoted\" it's"
        );
        assert_eq!(strip_html("a&nbsp;b"), "a b");
    }

    #[test]
    fn test_jats_abstract() {
        let raw = "<jats:title>Abstract</jats:title><jats:p>This article\n  examines</jats:p>";
        assert_eq!(strip_html(raw), "Abstract This article examines");
    }

    #[test]
    fn test_clean_optional_blank() {
        assert_eq!(clean_optional(Some("<br/>  ")), None);
        assert_eq!(clean_optional(None), None);
        assert_eq!(clean_optional(Some(" x ")), Some("x".to_string()));
    }
}

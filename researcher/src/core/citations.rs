//! Citation marker helpers.
//!
//! A citation marker is an inline `[S<n>]` token referencing a [`Source`] by id.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::Source;

static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[S(\d+)\]").expect("citation marker regex is valid"));

/// True when `text` contains at least one `[S<digits>]` marker.
pub fn has_citation_markers(text: &str) -> bool {
    MARKER_RE.is_match(text)
}

/// Lines that make a numeric claim without citing anything on the same line.
///
/// A line is flagged when it contains an ASCII digit, is not a Markdown heading,
/// and does not contain `[S`. Lines are returned trimmed; blank lines are skipped.
pub fn uncited_numeric_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with('#'))
        .filter(|line| line.chars().any(|ch| ch.is_ascii_digit()))
        .filter(|line| !line.contains("[S"))
        .collect()
}

/// Marker ids cited in `text` (e.g. `S3`), deduplicated in numeric order.
pub fn cited_ids(text: &str) -> Vec<String> {
    let numbers: BTreeSet<u64> = MARKER_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    numbers.into_iter().map(|n| format!("S{n}")).collect()
}

/// Cited ids that do not exist in `sources`.
///
/// Sources are replaced on each Research pass, so a carried-over draft can
/// reference an id that the current pass no longer has.
pub fn dangling_citations(text: &str, sources: &[Source]) -> Vec<String> {
    cited_ids(text)
        .into_iter()
        .filter(|id| !sources.iter().any(|source| &source.id == id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: &str) -> Source {
        Source {
            id: id.to_string(),
            url: format!("https://example.com/{id}"),
            title: id.to_string(),
            snippet: String::new(),
        }
    }

    #[test]
    fn detects_markers() {
        assert!(has_citation_markers("claim [S1]."));
        assert!(has_citation_markers("claim [S12]"));
        assert!(!has_citation_markers("claim [S]"));
        assert!(!has_citation_markers("claim [s1]"));
        assert!(!has_citation_markers("claim S1"));
    }

    #[test]
    fn flags_numeric_lines_without_markers() {
        let text = "# 2024 overview\nIn 2020 revenue grew 10%. [S1]\nIn 2021 revenue grew again.\n\nNo numbers here.";
        assert_eq!(
            uncited_numeric_lines(text),
            vec!["In 2021 revenue grew again."]
        );
    }

    #[test]
    fn indented_headings_are_ignored() {
        assert!(uncited_numeric_lines("   ## Top 5 facts").is_empty());
    }

    #[test]
    fn cited_ids_are_unique_and_sorted() {
        assert_eq!(cited_ids("[S10] and [S2] then [S2]"), vec!["S2", "S10"]);
    }

    #[test]
    fn dangling_lists_ids_missing_from_sources() {
        let sources = vec![source("S1"), source("S2")];
        assert_eq!(
            dangling_citations("a [S1] b [S3] c [S7]", &sources),
            vec!["S3", "S7"]
        );
        assert!(dangling_citations("a [S2]", &sources).is_empty());
    }
}

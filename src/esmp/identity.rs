use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

pub const UNKNOWN_STATUS: &str = "Unknown";
const NAME_DELIMITER: char = '_';

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalItem {
    pub raw_name: String,
    pub derived_id: Option<u64>,
    pub title: String,
    pub status_tags: BTreeSet<String>,
}

fn code_pattern() -> &'static Regex {
    static CODE: OnceLock<Regex> = OnceLock::new();
    CODE.get_or_init(|| Regex::new(r"^([A-Za-z]*)(\d+)$").expect("valid code regex"))
}

fn status_pattern() -> &'static Regex {
    static STATUS: OnceLock<Regex> = OnceLock::new();
    STATUS.get_or_init(|| Regex::new(r"[\s_]*\(([^()]*)\)\s*$").expect("valid status regex"))
}

pub fn normalize_name(raw: &str) -> String {
    raw.nfc().collect()
}

pub fn decompose_name(raw: &str) -> String {
    raw.nfd().collect()
}

fn parse_code(first: &str) -> Option<u64> {
    let trimmed = first.trim();
    if let Some(caps) = code_pattern().captures(trimmed) {
        return caps.get(2).and_then(|m| m.as_str().parse::<u64>().ok());
    }
    trimmed.parse::<u64>().ok()
}

fn split_status(raw_title: &str) -> (String, BTreeSet<String>) {
    let Some(caps) = status_pattern().captures(raw_title) else {
        let mut tags = BTreeSet::new();
        tags.insert(UNKNOWN_STATUS.to_string());
        return (raw_title.trim().to_string(), tags);
    };

    let tags = caps
        .get(1)
        .map(|m| m.as_str())
        .unwrap_or_default()
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|tag| !tag.is_empty())
        .map(ToOwned::to_owned)
        .collect::<BTreeSet<_>>();

    let start = caps.get(0).map(|m| m.start()).unwrap_or(raw_title.len());
    (raw_title[..start].trim().to_string(), tags)
}

/// Decompose a base name (no extension) into id, title and status tags.
///
/// `ESMP12_My Song_(Draft, Final)` yields id `12`, title `My Song` and tags
/// `{Draft, Final}`. A first segment that is not a code leaves the id empty.
/// An empty parenthesized group yields an empty tag set.
pub fn parse_name(raw_name: &str) -> LocalItem {
    let raw_name = normalize_name(raw_name);
    let mut parts = raw_name.split(NAME_DELIMITER);
    let derived_id = parts.next().and_then(parse_code);
    let raw_title = parts.collect::<Vec<_>>().join("_");
    let (title, status_tags) = split_status(&raw_title);

    LocalItem {
        raw_name,
        derived_id,
        title,
        status_tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn parses_code_title_and_tags() {
        let item = parse_name("ESMP12_My Song_(Draft, Final)");
        assert_eq!(item.derived_id, Some(12));
        assert_eq!(item.title, "My Song");
        assert_eq!(item.status_tags, tags(&["Draft", "Final"]));
        assert_eq!(item.raw_name, "ESMP12_My Song_(Draft, Final)");
    }

    #[test]
    fn comma_only_tags_are_split() {
        let item = parse_name("AB7_Night Drive_(Mixed,Mastered)");
        assert_eq!(item.derived_id, Some(7));
        assert_eq!(item.title, "Night Drive");
        assert_eq!(item.status_tags, tags(&["Mastered", "Mixed"]));
    }

    #[test]
    fn missing_group_defaults_to_unknown() {
        let item = parse_name("ESMP3_Plain Title");
        assert_eq!(item.title, "Plain Title");
        assert_eq!(item.status_tags, tags(&[UNKNOWN_STATUS]));
    }

    #[test]
    fn bare_digits_are_an_id() {
        let item = parse_name("42_Answer");
        assert_eq!(item.derived_id, Some(42));
        assert_eq!(item.title, "Answer");
    }

    #[test]
    fn non_numeric_code_leaves_id_absent() {
        let item = parse_name("demo_Rough Idea_(Draft)");
        assert_eq!(item.derived_id, None);
        assert_eq!(item.title, "Rough Idea");
        assert_eq!(item.status_tags, tags(&["Draft"]));
    }

    #[test]
    fn underscores_inside_title_survive() {
        let item = parse_name("ESMP5_Left_Right_(Final)");
        assert_eq!(item.title, "Left_Right");
    }

    #[test]
    fn only_trailing_group_is_status() {
        let item = parse_name("ESMP8_Song (Live) Remix");
        assert_eq!(item.title, "Song (Live) Remix");
        assert_eq!(item.status_tags, tags(&[UNKNOWN_STATUS]));

        let item = parse_name("ESMP9_Song (Live)_(Final)");
        assert_eq!(item.title, "Song (Live)");
        assert_eq!(item.status_tags, tags(&["Final"]));
    }

    #[test]
    fn empty_title_is_allowed() {
        let item = parse_name("ESMP1");
        assert_eq!(item.derived_id, Some(1));
        assert_eq!(item.title, "");
    }

    #[test]
    fn decomposed_hangul_is_composed() {
        let decomposed = "ESMP2_\u{1100}\u{1161}";
        let item = parse_name(decomposed);
        assert_eq!(item.title, "\u{AC00}");
        assert_eq!(item.raw_name, "ESMP2_\u{AC00}");
    }
}

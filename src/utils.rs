#[cfg(feature = "docx")]
use crate::regex::Regex;
#[cfg(feature = "docx")]
use std::sync::LazyLock;

#[cfg(feature = "docx")]
static NUMBERED_PREFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\t").unwrap());

/// Formats a DOI string by removing URL prefixes, `doi:` labels and `[doi]`
/// suffixes. Returns `None` when no `10.` prefix can be found.
///
/// # Arguments
///
/// * `doi_str` - The DOI string to format
pub fn format_doi(doi_str: &str) -> Option<String> {
    if doi_str.is_empty() {
        return None;
    }
    let doi = doi_str
        .trim()
        .trim_end_matches("[doi]")
        .trim()
        .replace(|c: char| c.is_whitespace(), "")
        .to_lowercase();

    // Find the first occurrence of "10." which typically starts a DOI
    let pos = doi.find("10.")?;
    let doi = doi[pos..].trim_end_matches(|c: char| c.is_ascii_punctuation() && c != ')');
    Some(doi.to_string())
}

/// Trims ASCII punctuation and whitespace from both ends of `text`.
pub fn strip_punctuation(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
}

/// Replaces non-breaking spaces with plain spaces, drops line breaks, and
/// trims the result.
#[cfg(feature = "docx")]
pub fn normalize_space(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .replace(['\n', '\r'], "")
        .trim()
        .to_string()
}

/// Removes a numbered-list prefix such as `"12.\t"`.
#[cfg(feature = "docx")]
pub fn remove_numbered_prefix(text: &str) -> &str {
    match NUMBERED_PREFIX_REGEX.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("10.1000/test", Some("10.1000/test"))]
    #[case("10.1000/test [doi]", Some("10.1000/test"))]
    #[case("https://doi.org/10.1000/test", Some("10.1000/test"))]
    #[case("http://dx.doi.org/10.1000/test", Some("10.1000/test"))]
    #[case("doi: 10.1000/test", Some("10.1000/test"))]
    #[case("DOI:10.1000/TEST", Some("10.1000/test"))]
    #[case("doi:10.1000/test.", Some("10.1000/test"))]
    #[case("10.1000/(sici)1234(5)", Some("10.1000/(sici)1234(5)"))]
    #[case("", None)]
    #[case("invalid", None)]
    fn test_format_doi(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(format_doi(input).as_deref(), expected);
    }

    #[rstest]
    #[case("Effects of X on Y.", "Effects of X on Y")]
    #[case("\"Quoted title\"", "Quoted title")]
    #[case("  ...Title?! ", "Title")]
    #[case("Inner. Periods. Stay", "Inner. Periods. Stay")]
    #[case("...", "")]
    fn test_strip_punctuation(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(strip_punctuation(input), expected);
    }

    #[cfg(feature = "docx")]
    #[test]
    fn test_normalize_space() {
        assert_eq!(normalize_space(" A\u{a0}title\nhere "), "A titlehere");
        assert_eq!(normalize_space("plain"), "plain");
    }

    #[cfg(feature = "docx")]
    #[test]
    fn test_remove_numbered_prefix() {
        assert_eq!(remove_numbered_prefix("12.\tSmith J."), "Smith J.");
        assert_eq!(remove_numbered_prefix("Smith J. 12.\tx"), "Smith J. 12.\tx");
        assert_eq!(remove_numbered_prefix("1. Smith"), "1. Smith");
    }
}

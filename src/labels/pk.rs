//! Pharmacokinetics keyword detection.

use crate::regex::Regex;
use std::sync::LazyLock;

/// Patterns in priority order. The first match wins.
const PATTERNS: [&str; 15] = [
    r"pharmacokinetic.*",
    r"exposure",
    r"clearance",
    r"\bCL\b",
    r"\bCl\b",
    r"volume of distribution",
    r"\bVd\b",
    r"\bVss\b",
    r"plasma concentration",
    r"\bCmax\b",
    r"\bTmax\b",
    r"area under the curve",
    r"\bAUC\b",
    r"half-life",
    r"\bt1/2\b",
];

static KEYWORDS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    PATTERNS
        .iter()
        .map(|&pattern| (pattern, Regex::new(&format!("(?i){pattern}")).unwrap()))
        .collect()
});

/// Whether a record is about pharmacokinetics, and which pattern said so.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PkLabel {
    keyword: Option<&'static str>,
}

impl PkLabel {
    /// `1` when a pattern matched, `0` otherwise.
    pub fn flag(&self) -> u8 {
        u8::from(self.keyword.is_some())
    }

    /// The matching pattern, as written in the pattern table.
    pub fn keyword(&self) -> Option<&'static str> {
        self.keyword
    }
}

/// Search the title first and fall back to the abstract.
pub fn detect(title: &str, abstract_text: &str) -> PkLabel {
    let keyword = first_keyword(title).or_else(|| first_keyword(abstract_text));
    PkLabel { keyword }
}

fn first_keyword(text: &str) -> Option<&'static str> {
    if text.is_empty() {
        return None;
    }
    KEYWORDS
        .iter()
        .find(|(_, regex)| regex.is_match(text))
        .map(|(pattern, _)| *pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("Population Pharmacokinetics of clonazepam", "", Some(r"pharmacokinetic.*"))]
    #[case("Drug exposure and clearance in neonates", "", Some(r"exposure"))]
    #[case("Dosing in children", "Median CL was 0.1 L/h/kg", Some(r"\bCL\b"))]
    #[case("Dosing in children", "The AUC doubled", Some(r"\bAUC\b"))]
    #[case("Dosing in children", "The t1/2 was 30 h", Some(r"\bt1/2\b"))]
    #[case("Clinical outcomes", "Seizure frequency fell", None)]
    #[case("", "", None)]
    fn test_detect(#[case] title: &str, #[case] abstract_text: &str, #[case] expected: Option<&str>) {
        let label = detect(title, abstract_text);
        assert_eq!(label.keyword(), expected);
        assert_eq!(label.flag(), u8::from(expected.is_some()));
    }

    #[test]
    fn test_title_wins_over_abstract() {
        let label = detect("Half-life of drug X", "pharmacokinetic modelling");
        assert_eq!(label.keyword(), Some("half-life"));
    }

    #[test]
    fn test_word_boundaries() {
        assert_eq!(detect("Clonazepam", "").keyword(), None);
        assert_eq!(detect("AUCs", "").keyword(), None);
    }
}

//! Level-of-evidence classification.
//!
//! | Level | Keywords |
//! |-------|----------|
//! | A1 | meta-analysis, systematic review |
//! | A2 | randomized, controlled, double-blind, RCT, placebo-controlled |
//! | B  | comparative, observational, retrospective, prospective |
//! | C  | case report, case series |
//!
//! Matching is a case-insensitive substring search over the title and the
//! abstract. Each level reports at most its first matching keyword.

use std::fmt;

/// Written to the level column when no level applies.
pub const NO_LEVEL: &str = "X";
/// Written to the keyword column when no level applies.
pub const NO_KEYWORD: &str = "-";

const LEVELS: [(&str, &[&str]); 4] = [
    (
        "A1",
        &[
            "meta-analysis",
            "meta analysis",
            "systematic-review",
            "systematic review",
        ],
    ),
    (
        "A2",
        &[
            "randomized",
            "controlled",
            "double-blind",
            "double blind",
            " rct ",
            " rcts ",
            "placebo-controlled",
            "placebo controlled",
        ],
    ),
    (
        "B",
        &["comparative", "observational", "retrospective", "prospective"],
    ),
    ("C", &["case report", "case-report", "case-series", "case series"]),
];

/// Keywords that do not count when written as `"not <keyword>"`.
const NEGATABLE: [&str; 5] = [
    "randomized",
    "double blind",
    "double-blind",
    "placebo-controlled",
    "placebo controlled",
];

/// The evidence levels found for a record, with the keyword that triggered
/// each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceLabel {
    matches: Vec<(&'static str, &'static str)>,
}

impl EvidenceLabel {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Space-separated levels, e.g. `"A1 A2"`, or [`NO_LEVEL`].
    pub fn levels(&self) -> String {
        if self.is_empty() {
            return NO_LEVEL.to_string();
        }
        self.matches
            .iter()
            .map(|(level, _)| *level)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Space-separated keywords, in level order, or [`NO_KEYWORD`].
    pub fn keywords(&self) -> String {
        if self.is_empty() {
            return NO_KEYWORD.to_string();
        }
        self.matches
            .iter()
            .map(|(_, keyword)| keyword.trim())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn matches(&self) -> &[(&'static str, &'static str)] {
        &self.matches
    }
}

impl fmt::Display for EvidenceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.levels())
    }
}

/// Classify a record by its title and abstract.
pub fn classify(title: &str, abstract_text: &str) -> EvidenceLabel {
    let title = title.to_lowercase();
    let abstract_text = abstract_text.to_lowercase();
    let occurs = |needle: &str| title.contains(needle) || abstract_text.contains(needle);

    let matches = LEVELS
        .iter()
        .filter_map(|(level, keywords)| {
            keywords
                .iter()
                .find(|&&keyword| occurs(keyword) && !is_negated(keyword, &occurs))
                .map(|&keyword| (*level, keyword))
        })
        .collect();

    EvidenceLabel { matches }
}

fn is_negated(keyword: &str, occurs: &impl Fn(&str) -> bool) -> bool {
    if keyword == "randomized" && occurs("non-randomized") {
        return true;
    }
    NEGATABLE.contains(&keyword) && occurs(&format!("not {keyword}"))
}

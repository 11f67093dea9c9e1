//! The numbered reference list of a DRD document.

use super::DocxDocument;
use crate::ReferenceRecord;
use crate::regex::Regex;
use crate::utils::remove_numbered_prefix;
use itertools::Itertools;
use std::sync::LazyLock;

static HEADING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:references?|referenties?|reference\s+list)").unwrap()
});

/// The title runs from the first `". "` up to a year, a `vol(issue):`
/// citation or an abbreviated journal name such as `Eur J Clin`.
static TITLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.\s(.*?)\s(?:\d{4}|\d+\(\d+\):|\w+ J \w+)").unwrap()
});

/// Collect the reference list entries, without duplicates.
///
/// A list starts after a heading paragraph and ends at the first empty
/// paragraph. Entries whose title cannot be located keep an empty title.
pub fn collect_references(doc: &DocxDocument) -> Vec<ReferenceRecord> {
    let mut in_list = false;
    let mut entries = Vec::new();

    for paragraph in doc.paragraphs() {
        let text = paragraph.text();
        let text = text.trim();

        if HEADING_REGEX.is_match(text) {
            in_list = true;
            continue;
        }
        if !in_list {
            continue;
        }
        if text.is_empty() {
            in_list = false;
            continue;
        }

        let entry = remove_numbered_prefix(text).trim();
        if !entry.is_empty() {
            entries.push(entry.to_string());
        }
    }

    entries
        .into_iter()
        .unique()
        .map(|entry| {
            let title = extract_title(&entry).unwrap_or_default().to_string();
            ReferenceRecord::new(entry, "", title, "")
        })
        .collect()
}

/// The title of a reference list entry, if it can be located.
pub fn extract_title(entry: &str) -> Option<&str> {
    TITLE_REGEX
        .captures(entry)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

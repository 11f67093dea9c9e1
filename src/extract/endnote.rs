//! The EndNote-formatted reference section of an RBA document.
//!
//! The section starts at a paragraph beginning with "referen" (any case)
//! that has at least one bold run, and runs to the end of the document.
//! Every non-empty paragraph after it is one reference.

use super::DocxDocument;
use crate::ReferenceRecord;
use crate::regex::Regex;
use crate::utils::strip_punctuation;
use either::{Either, Left, Right};
use itertools::Itertools;
use std::sync::LazyLock;
use tracing::debug;

/// `Authors. Title.`: the first two period-separated segments.
static SEGMENTS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^.]+).([^?|^.]+).").unwrap());

/// A quoted title after a four-digit year, as used for reports.
static QUOTED_TITLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(.*)\d{4}.?\s?(".*")"#).unwrap());

static DOI_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bdoi:?\s?(.+)").unwrap());

/// Authors ending in "et al." followed by the title.
static ET_AL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.*et al.?)([^?|^.]+).").unwrap());

/// Publishers of guidelines that are not indexed.
const SKIPPED_PREFIXES: [&str; 4] = ["who.", "lci.", "nvn.", "nice."];

const SECTION_PREFIX: &str = "referen";

/// Collect the entries of the reference section.
pub fn collect_references(doc: &DocxDocument) -> Vec<ReferenceRecord> {
    let mut in_section = false;
    let mut entries = Vec::new();

    for paragraph in doc.paragraphs() {
        let text = paragraph.text();
        let text = text.trim();
        let is_heading = text.to_lowercase().starts_with(SECTION_PREFIX);

        if is_heading && paragraph.runs.iter().any(|r| r.bold) {
            in_section = true;
        }
        if !in_section || is_heading || text.is_empty() {
            continue;
        }
        entries.push(text.to_string());
    }

    let (skipped, references): (Vec<String>, Vec<ReferenceRecord>) =
        entries.into_iter().partition_map(parse_entry);
    if !skipped.is_empty() {
        debug!(count = skipped.len(), "skipped guideline references");
    }
    references
}

/// Split one entry into authors, title and DOI. Guideline entries come back
/// on the left.
pub fn parse_entry(entry: String) -> Either<String, ReferenceRecord> {
    let mut authors = "";
    let mut title = "";
    let mut doi = "";

    if let Some(caps) = DOI_REGEX.captures(&entry) {
        doi = strip_punctuation(caps.get(1).map_or("", |m| m.as_str()));
    }
    if let Some((a, t)) = capture_pair(&SEGMENTS_REGEX, &entry) {
        (authors, title) = (a, t);
    }
    if let Some((a, t)) = capture_pair(&QUOTED_TITLE_REGEX, &entry) {
        (authors, title) = (a, t);
    }

    let et_al = entry
        .contains("et al.")
        .then(|| capture_pair(&ET_AL_REGEX, &entry))
        .flatten();
    match et_al {
        Some((a, t)) => (authors, title) = (a, t),
        None => {
            let lower = entry.to_lowercase();
            if SKIPPED_PREFIXES.iter().any(|p| lower.starts_with(p)) {
                return Left(entry);
            }
        }
    }

    let record = ReferenceRecord::new(entry.as_str(), authors, title, doi);
    Right(record)
}

fn capture_pair<'t>(regex: &Regex, text: &'t str) -> Option<(&'t str, &'t str)> {
    let caps = regex.captures(text)?;
    let first = caps.get(1).map_or("", |m| m.as_str());
    let second = caps.get(2).map_or("", |m| m.as_str());
    Some((strip_punctuation(first), strip_punctuation(second)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::testing::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn parsed(entry: &str) -> ReferenceRecord {
        parse_entry(entry.to_string()).right().unwrap()
    }

    #[test]
    fn test_authors_title_and_doi() {
        let reference = parsed(
            "Smith J, Jones K. Effects of X on Y. J Clin Pharm. 2010;12:1-5. doi: 10.1000/abc.",
        );
        assert_eq!(reference.authors.as_deref(), Some("Smith J, Jones K"));
        assert_eq!(reference.title, "Effects of X on Y");
        assert_eq!(reference.doi(), Some("10.1000/abc"));
    }

    #[test]
    fn test_et_al_overrides_segments() {
        let reference = parsed("Smith J. et al. Effects of X on Y. J Clin Pharm. 2010.");
        assert_eq!(reference.authors.as_deref(), Some("Smith J. et al"));
        assert_eq!(reference.title, "Effects of X on Y");
    }

    #[test]
    fn test_quoted_title_after_year() {
        let reference = parsed("Health Council. Report 2019. \"Dosing in children\". The Hague.");
        assert_eq!(reference.authors.as_deref(), Some("Health Council. Report"));
        assert_eq!(reference.title, "Dosing in children");
    }

    #[rstest]
    #[case("WHO. Guidelines on epilepsy. Geneva; 2012.")]
    #[case("NICE. Epilepsies: diagnosis and management. 2012.")]
    #[case("lci. Richtlijn. 2018.")]
    fn test_guideline_bodies_are_skipped(#[case] entry: &str) {
        assert!(parse_entry(entry.to_string()).is_left());
    }

    #[test]
    fn test_guideline_with_et_al_is_kept() {
        assert!(parse_entry("WHO. Smith J et al. Epilepsy care. 2012.".to_string()).is_right());
    }

    #[test]
    fn test_raw_text_is_kept() {
        let entry = "Smith J. Title one. J Clin. 2001.";
        let reference = parsed(entry);
        assert_eq!(reference.raw_text, entry);
        assert_eq!(reference.title, "Title one");
    }

    #[test]
    fn test_too_short_entry_has_no_title() {
        let reference = parsed("ab.");
        assert_eq!(reference.title, "");
        assert!(reference.is_malformed());
    }

    #[test]
    fn test_section_needs_bold_heading() {
        let doc = document(vec![
            plain("Introduction mentions references."),
            plain("Referenties"),
            plain("Smith J. Not a reference yet. 2010."),
            bold("Referenties"),
            plain(""),
            plain("Smith J, Jones K. Effects of X on Y. J Clin Pharm. 2010."),
            plain("WHO. Guidelines. 2012."),
            plain("Brown A. Another title. Lancet. 2015."),
        ]);

        let titles: Vec<String> = collect_references(&doc)
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["Effects of X on Y", "Another title"]);
    }

    #[test]
    fn test_heading_with_mixed_runs() {
        let doc = document(vec![
            runs(&[("References", true), (" (selection)", false)]),
            plain("Smith J. Title one. J. 2001."),
        ]);
        assert_eq!(collect_references(&doc).len(), 1);
    }

    #[test]
    fn test_no_section() {
        let doc = document(vec![plain("Smith J. Title one. J. 2001.")]);
        assert!(collect_references(&doc).is_empty());
    }
}

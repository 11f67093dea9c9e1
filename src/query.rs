//! Fallback search queries for a reference.
//!
//! Queries are tried in order until one yields at least one identifier:
//!
//! 1. the DOI, when present;
//! 2. the full title;
//! 3. when the title holds more than one period, the text before the first
//!    period. Extracted titles often carry the journal name after the title
//!    (`"{title}. {journal}."`), which drowns the search.

use crate::ReferenceRecord;
use crate::utils::format_doi;

/// The ordered fallback queries for one reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateQuery {
    queries: Vec<String>,
}

impl CandidateQuery {
    /// Whether there is nothing to search with.
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// The queries in the order they should be tried.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.queries.iter().map(String::as_str)
    }

    pub fn first(&self) -> Option<&str> {
        self.queries.first().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.queries.last().map(String::as_str)
    }

    fn push(&mut self, query: &str) {
        let query = query.trim();
        if !query.is_empty() && !self.queries.iter().any(|q| q == query) {
            self.queries.push(query.to_string());
        }
    }
}

/// Build the fallback queries for `reference`.
///
/// A reference with neither a title nor a DOI yields an empty query.
pub fn build_queries(reference: &ReferenceRecord) -> CandidateQuery {
    let mut query = CandidateQuery::default();

    if let Some(doi) = reference.doi() {
        match format_doi(doi) {
            Some(formatted) => query.push(&formatted),
            None => query.push(doi),
        }
    }

    let title = reference.title.trim();
    query.push(title);

    if title.matches('.').count() > 1
        && let Some(head) = title.split('.').next()
    {
        query.push(head);
    }

    query
}

//! The bibliographic index seen by the resolver.
//!
//! A [`SearchIndex`] offers two operations: a relevance-ranked search that
//! returns external ids, and a fetch that returns one [`CandidateArticle`] per
//! requested id, in request order. The resolver uses the returned order as a
//! ranking signal and never re-ranks.
//!
//! The PubMed E-utilities implementation lives in [`eutils`] (feature
//! `eutils`).

#[cfg(feature = "eutils")]
pub mod eutils;
#[cfg(feature = "eutils")]
mod rate_limit;

use crate::CandidateArticle;
use crate::error::SearchError;
use std::collections::HashMap;

/// Search-by-query and fetch-by-id contract of a bibliographic index.
pub trait SearchIndex {
    /// Ranked external ids for a free-text query. An empty list means no hits.
    fn search(&self, query: &str) -> Result<Vec<String>, SearchError>;

    /// Records for `ids`, exactly one per id and in the same order. Ids the
    /// index knows nothing about come back as [`CandidateArticle::placeholder`].
    fn fetch(&self, ids: &[String]) -> Result<Vec<CandidateArticle>, SearchError>;
}

impl<T: SearchIndex + ?Sized> SearchIndex for &T {
    fn search(&self, query: &str) -> Result<Vec<String>, SearchError> {
        (**self).search(query)
    }

    fn fetch(&self, ids: &[String]) -> Result<Vec<CandidateArticle>, SearchError> {
        (**self).fetch(ids)
    }
}

/// Order `articles` by `ids`, filling gaps with placeholders.
///
/// The first article seen for an id wins.
pub fn align_to_ids(ids: &[String], articles: Vec<CandidateArticle>) -> Vec<CandidateArticle> {
    let mut by_id: HashMap<String, CandidateArticle> = HashMap::with_capacity(articles.len());
    for article in articles {
        by_id.entry(article.external_id.clone()).or_insert(article);
    }
    ids.iter()
        .map(|id| {
            by_id
                .get(id)
                .cloned()
                .unwrap_or_else(|| CandidateArticle::placeholder(id.clone()))
        })
        .collect()
}

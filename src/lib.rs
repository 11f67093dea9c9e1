//! Resolve review-document references against PubMed, keep a deduplicated
//! record store, and enrich screening exports.
//!
//! `refscreen` supports systematic literature reviews. References are extracted
//! from semi-structured review documents, searched in a bibliographic index
//! under several fallback queries, scored against the reference title with a
//! MinHash estimate of shingle Jaccard similarity, and appended to a CSV store
//! that never receives the same external id twice, however often the run is
//! repeated.
//!
//! # Features
//!
//! - `eutils` - PubMed E-utilities search adapter (enabled by default)
//! - `docx` - reference extraction from Word documents (enabled by default)
//! - `fulltext` - institutional full-text lookups for screening exports
//! - `regex` / `lite` - choose between `regex` and `regex-lite`
//! - `cli` - the `refscreen` command-line binary
//!
//! # Resolving references
//!
//! ```no_run
//! use refscreen::ReferenceRecord;
//! use refscreen::pipeline::Resolver;
//! use refscreen::search::eutils::EUtilsClient;
//! use refscreen::select::MatchPolicy;
//! use refscreen::store::OutputStore;
//!
//! let index = EUtilsClient::new().unwrap();
//! let resolver = Resolver::new(&index, MatchPolicy::default());
//! let mut store = OutputStore::initialize("csv/review.csv").unwrap();
//!
//! let references = vec![ReferenceRecord::from_title("Effects of X on Y")];
//! let summary = resolver.run(&references, &mut store).unwrap();
//! println!("{} new rows", summary.written());
//! ```
//!
//! # Similarity
//!
//! ```rust
//! use refscreen::minhash::similarity;
//!
//! assert_eq!(similarity("Effects of X on Y", "Effects of X on Y"), 1.0);
//! assert!(similarity("abcdef", "abcxyz") < 1.0);
//! ```
//!
//! # Error Handling
//!
//! Per-reference problems never abort a run: they come back as
//! [`pipeline::ResolutionOutcome`] values. Only conditions that make a whole
//! target unusable (an unwritable store, an unreadable document) surface as
//! [`Error`].

use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
#[cfg(feature = "docx")]
pub mod extract;
pub mod fulltext;
pub mod labels;
pub mod minhash;
pub mod pipeline;
pub mod query;
pub mod screening;
pub mod search;
pub mod select;
pub mod store;

// Reexports
pub use config::Settings;
pub use error::{
    ConfigError, Error, ParseError, Result, ScreeningError, SearchError, StoreError, ValueError,
};
#[cfg(feature = "docx")]
pub use error::ExtractError;
pub use pipeline::{ResolutionOutcome, Resolver, RunSummary};
pub use search::SearchIndex;
pub use select::{MatchDecision, MatchPolicy};
pub use store::{OutputStore, SeenIdSet};

mod regex;
mod utils;

/// Sentinel stored when the index has no title for a record.
pub const NO_TITLE: &str = "No title";
/// Sentinel stored when the index has no abstract for a record.
pub const NO_ABSTRACT: &str = "No abstract";
/// Sentinel stored when the index has no DOI for a record.
pub const NO_DOI: &str = "No DOI";

/// Data formats read by the crate, used to label parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    EUtilsXml,
    WordXml,
}

impl DataFormat {
    /// Convert the format to a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFormat::Csv => "CSV",
            DataFormat::EUtilsXml => "E-utilities XML",
            DataFormat::WordXml => "WordprocessingML",
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference as extracted from a source document.
///
/// The title drives matching; the DOI, when present, is the preferred query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// The reference text as it appeared in the document
    pub raw_text: String,
    /// Author segment, when the extractor could split one off
    pub authors: Option<String>,
    /// Title of the cited work (may be empty when extraction failed)
    pub title: String,
    /// Digital Object Identifier, when one was found
    pub doi: Option<String>,
}

impl ReferenceRecord {
    /// Create a reference from its parts. Empty author and DOI strings are
    /// stored as `None`.
    pub fn new(
        raw_text: impl Into<String>,
        authors: impl Into<String>,
        title: impl Into<String>,
        doi: impl Into<String>,
    ) -> Self {
        let authors = authors.into();
        let doi = doi.into();
        Self {
            raw_text: raw_text.into(),
            authors: (!authors.trim().is_empty()).then_some(authors),
            title: title.into(),
            doi: (!doi.trim().is_empty()).then_some(doi),
        }
    }

    /// Create a reference that only carries a title.
    pub fn from_title(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            raw_text: title.clone(),
            title,
            ..Default::default()
        }
    }

    /// The DOI, if present and not blank.
    pub fn doi(&self) -> Option<&str> {
        self.doi.as_deref().map(str::trim).filter(|d| !d.is_empty())
    }

    /// Whether the reference has neither a title nor a DOI to search with.
    pub fn is_malformed(&self) -> bool {
        self.title.trim().is_empty() && self.doi().is_none()
    }
}

/// A record returned by the bibliographic index for one external id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateArticle {
    /// Identifier assigned by the index (a PMID for PubMed)
    pub external_id: String,
    /// Article title, or [`NO_TITLE`]
    pub title: String,
    /// Abstract text, or [`NO_ABSTRACT`]
    pub abstract_text: String,
    /// DOI, or [`NO_DOI`]
    pub doi: String,
}

impl CandidateArticle {
    /// A record for an id the index returned nothing for.
    pub fn placeholder(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            title: NO_TITLE.to_string(),
            abstract_text: NO_ABSTRACT.to_string(),
            doi: NO_DOI.to_string(),
        }
    }
}

/// One persisted row of the output store.
///
/// Field order is the column order of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRow {
    pub external_id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub doi: String,
    pub inclusion_flag: u8,
}

impl OutputRow {
    /// A row for an accepted match, marked as included.
    pub fn included(article: CandidateArticle) -> Self {
        Self {
            external_id: article.external_id,
            title: article.title,
            abstract_text: article.abstract_text,
            doi: article.doi,
            inclusion_flag: 1,
        }
    }
}

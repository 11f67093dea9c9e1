//! Institutional full-text availability.
//!
//! Library link resolvers answer a PubMed id with an HTML page. A
//! `section.fullTextRecord` element means the institution has access; a
//! `div#no-result-alert` means the id matched no article at all.

use crate::error::SearchError;

#[cfg(feature = "fulltext")]
use scraper::{Html, Selector};
#[cfg(feature = "fulltext")]
use std::sync::LazyLock;
#[cfg(feature = "fulltext")]
use std::time::Duration;
#[cfg(feature = "fulltext")]
use tracing::debug;

/// Path appended to the institution URL, followed by the PubMed id.
pub const LINK_PATH: &str = "/atoztitles/link?id=pmid:";

/// What the link resolver said about one article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    FullText,
    /// The article exists but the institution has no full-text access.
    NoAccess,
    /// The id matched no article; worth a manual check.
    NotFound,
    /// The resolver answered with a non-success status.
    Unknown,
}

impl Availability {
    pub fn has_full_text(self) -> bool {
        self == Availability::FullText
    }
}

/// Looks up full-text availability by PubMed id.
pub trait FullTextIndex {
    fn availability(&self, pubmed_id: &str) -> Result<Availability, SearchError>;
}

impl<T: FullTextIndex + ?Sized> FullTextIndex for &T {
    fn availability(&self, pubmed_id: &str) -> Result<Availability, SearchError> {
        (**self).availability(pubmed_id)
    }
}

#[cfg(feature = "fulltext")]
static FULL_TEXT_RECORD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("section.fullTextRecord").expect("valid selector"));

#[cfg(feature = "fulltext")]
static NO_RESULT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#no-result-alert").expect("valid selector"));

/// Read a link resolver page.
#[cfg(feature = "fulltext")]
pub fn parse_availability(html: &str) -> Availability {
    let document = Html::parse_document(html);
    if document.select(&FULL_TEXT_RECORD).next().is_some() {
        Availability::FullText
    } else if document.select(&NO_RESULT).next().is_some() {
        Availability::NotFound
    } else {
        Availability::NoAccess
    }
}

/// Blocking client for an institution's WorldCat link resolver.
#[cfg(feature = "fulltext")]
#[derive(Debug)]
pub struct WorldCatClient {
    http: reqwest::blocking::Client,
    link_url: String,
}

#[cfg(feature = "fulltext")]
impl WorldCatClient {
    /// Client for the institution at `institution_url`, e.g.
    /// `https://example.on.worldcat.org`.
    pub fn new(institution_url: &str, timeout_secs: u64) -> Result<Self, SearchError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("refscreen/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            link_url: format!("{}{LINK_PATH}", institution_url.trim_end_matches('/')),
        })
    }

    pub fn link_url(&self) -> &str {
        &self.link_url
    }
}

#[cfg(feature = "fulltext")]
impl FullTextIndex for WorldCatClient {
    fn availability(&self, pubmed_id: &str) -> Result<Availability, SearchError> {
        let url = format!("{}{}", self.link_url, pubmed_id);
        let response = self.http.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            debug!(pubmed_id, status = status.as_u16(), "link resolver refused");
            return Ok(Availability::Unknown);
        }
        Ok(parse_availability(&response.text()?))
    }
}

//! PubMed search through the NCBI E-utilities.
//!
//! `esearch.fcgi` ranks PMIDs for a query, `efetch.fcgi` returns the article
//! records. Both answer in XML, which is read with `quick-xml`.

use super::rate_limit::RateLimiter;
use super::{SearchIndex, align_to_ids};
use crate::config::EUtilsConfig;
use crate::error::{ParseError, SearchError, ValueError, fields};
use crate::{CandidateArticle, DataFormat, NO_ABSTRACT, NO_DOI, NO_TITLE};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("refscreen/", env!("CARGO_PKG_VERSION"));

/// Blocking client for the PubMed E-utilities.
///
/// # Example
///
/// ```no_run
/// use refscreen::SearchIndex;
/// use refscreen::search::eutils::EUtilsClient;
///
/// let client = EUtilsClient::new()?;
/// let ids = client.search("clonazepam pharmacokinetics children")?;
/// for article in client.fetch(&ids)? {
///     println!("{}: {}", article.external_id, article.title);
/// }
/// # Ok::<(), refscreen::SearchError>(())
/// ```
#[derive(Debug)]
pub struct EUtilsClient {
    http: reqwest::blocking::Client,
    base_url: String,
    retmax: usize,
    api_key: Option<String>,
    tool: Option<String>,
    email: Option<String>,
    rate_limiter: RateLimiter,
}

impl EUtilsClient {
    /// Client with default settings: 20 hits per search, 3 requests/s.
    pub fn new() -> Result<Self, SearchError> {
        Self::from_config(&EUtilsConfig::default())
    }

    /// Client configured from the `[eutils]` settings section.
    pub fn from_config(config: &EUtilsConfig) -> Result<Self, SearchError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retmax: config.retmax,
            api_key: config.api_key.clone(),
            tool: config.tool.clone(),
            email: config.email.clone(),
            rate_limiter: RateLimiter::new(config.requests_per_second()),
        })
    }

    /// Override the base URL (useful for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn common_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("retmode", "xml".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        if let Some(tool) = &self.tool {
            params.push(("tool", tool.clone()));
        }
        if let Some(email) = &self.email {
            params.push(("email", email.clone()));
        }
        params
    }

    fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<String, SearchError> {
        self.rate_limiter.acquire();

        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self.http.get(&url).query(params).send()?;
        handle_response(response)
    }
}

impl SearchIndex for EUtilsClient {
    fn search(&self, query: &str) -> Result<Vec<String>, SearchError> {
        let mut params = self.common_params();
        params.push(("term", query.to_string()));
        params.push(("sort", "relevance".to_string()));
        params.push(("retmax", self.retmax.to_string()));

        let body = self.get("esearch.fcgi", &params)?;
        let ids = parse_id_list(&body)?;
        debug!(query, hits = ids.len(), "esearch");
        Ok(ids)
    }

    fn fetch(&self, ids: &[String]) -> Result<Vec<CandidateArticle>, SearchError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut params = self.common_params();
        params.push(("id", ids.join(",")));

        let body = self.get("efetch.fcgi", &params)?;
        let articles = parse_articles(&body)?;
        debug!(requested = ids.len(), received = articles.len(), "efetch");
        Ok(align_to_ids(ids, articles))
    }
}

/// Map the HTTP status to an error, or return the body.
fn handle_response(response: reqwest::blocking::Response) -> Result<String, SearchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.text()?);
    }
    let message = response.text().unwrap_or_default();
    Err(SearchError::Api {
        status: status.as_u16(),
        message,
    })
}

fn xml_error(reader: &Reader<&[u8]>, err: impl std::fmt::Display) -> ParseError {
    ParseError::xml(DataFormat::EUtilsXml, reader.buffer_position(), err)
}

/// Collect the `<Id>` values of an `esearch` response, in order.
///
/// An `<ERROR>` element in the response is reported as a syntax error.
pub fn parse_id_list(xml: &str) -> Result<Vec<String>, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut ids = Vec::new();
    let mut in_id_list = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"IdList" => in_id_list = true,
                b"Id" if in_id_list => {
                    let id = read_text(&mut reader, b"Id")?;
                    if !id.is_empty() {
                        ids.push(id);
                    }
                }
                b"ERROR" => {
                    let message = read_text(&mut reader, b"ERROR")?;
                    return Err(ParseError::without_position(
                        DataFormat::EUtilsXml,
                        ValueError::Syntax(format!("esearch error: {message}")),
                    ));
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"IdList" => in_id_list = false,
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(&reader, e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(ids)
}

/// Read the articles of an `efetch` response.
///
/// Takes the first PMID of each `<PubmedArticle>`, its `ArticleTitle`
/// (including nested markup), the first `AbstractText` and the first DOI
/// `ArticleId`. Missing fields get the sentinel values.
pub fn parse_articles(xml: &str) -> Result<Vec<CandidateArticle>, ParseError> {
    let mut reader = Reader::from_str(xml);
    // Inline markup such as `<i>N</i>-acetyl` splits words across text events
    reader.config_mut().trim_text(false);

    let mut articles = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"PubmedArticle" => {
                articles.push(parse_article(&mut reader)?);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(&reader, e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(articles)
}

fn parse_article(reader: &mut Reader<&[u8]>) -> Result<CandidateArticle, ParseError> {
    let mut pmid: Option<String> = None;
    let mut title: Option<String> = None;
    let mut abstract_text: Option<String> = None;
    let mut doi: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"PMID" => {
                    let value = read_text(reader, b"PMID")?;
                    if pmid.is_none() {
                        pmid = Some(value);
                    }
                }
                b"ArticleTitle" => {
                    let value = read_text(reader, b"ArticleTitle")?;
                    title.get_or_insert(value);
                }
                b"AbstractText" => {
                    let value = read_text(reader, b"AbstractText")?;
                    abstract_text.get_or_insert(value);
                }
                b"ArticleId" => {
                    let is_doi = e.attributes().flatten().any(|attr| {
                        attr.key.as_ref() == b"IdType" && attr.value.as_ref() == b"doi"
                    });
                    let value = read_text(reader, b"ArticleId")?;
                    if is_doi && doi.is_none() {
                        doi = Some(value);
                    }
                }
                // References cite other articles with their own ids
                b"ReferenceList" => {
                    reader
                        .read_to_end_into(e.name(), &mut Vec::new())
                        .map_err(|err| xml_error(reader, err))?;
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"PubmedArticle" => break,
            Ok(Event::Eof) => {
                return Err(xml_error(reader, "unexpected end of PubmedArticle"));
            }
            Err(e) => return Err(xml_error(reader, e)),
            _ => {}
        }
        buf.clear();
    }

    let external_id = pmid.filter(|id| !id.is_empty()).ok_or_else(|| {
        ParseError::new(
            None,
            Some(reader.buffer_position() as usize),
            DataFormat::EUtilsXml,
            ValueError::MissingValue {
                field: fields::EXTERNAL_ID,
                key: "PMID",
            },
        )
    })?;

    Ok(CandidateArticle {
        external_id,
        title: non_empty_or(title, NO_TITLE),
        abstract_text: non_empty_or(abstract_text, NO_ABSTRACT),
        doi: non_empty_or(doi, NO_DOI),
    })
}

fn non_empty_or(value: Option<String>, sentinel: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| sentinel.to_string())
}

/// Text content up to the matching end tag. Chunks around nested markup are
/// joined as they are, then whitespace runs are collapsed.
fn read_text(reader: &mut Reader<&[u8]>, closing_tag: &[u8]) -> Result<String, ParseError> {
    let mut text = String::new();
    let mut depth = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(e)) => {
                let chunk = e.unescape().map_err(|err| xml_error(reader, err))?;
                text.push_str(&chunk);
            }
            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::Start(ref e)) if e.name().as_ref() == closing_tag => depth += 1,
            Ok(Event::End(ref e)) if e.name().as_ref() == closing_tag => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Ok(Event::Eof) => {
                return Err(xml_error(
                    reader,
                    format!(
                        "unexpected EOF looking for closing tag '{}'",
                        String::from_utf8_lossy(closing_tag)
                    ),
                ));
            }
            Err(e) => return Err(xml_error(reader, e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
}

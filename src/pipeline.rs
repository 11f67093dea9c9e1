//! Sequential resolution of references into an output store.
//!
//! For each reference the fallback queries are tried until one returns ids,
//! the ids are fetched, and the first candidate that clears the match
//! threshold is appended to the store unless its id is already there.
//! Everything that can go wrong with a single reference ends up as a
//! [`ResolutionOutcome`]; only store failures stop a run.

use crate::error::{SearchError, StoreError};
use crate::query::build_queries;
use crate::search::SearchIndex;
use crate::select::{MatchPolicy, MatchSelector};
use crate::store::OutputStore;
use crate::{OutputRow, ReferenceRecord};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{debug, info, warn};

/// What happened to one reference.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOutcome {
    /// A new row was appended.
    Written {
        external_id: String,
        query: String,
        score: f64,
    },
    /// The matching record was already stored.
    AlreadyPresent {
        external_id: String,
        query: String,
        title: String,
    },
    /// No query returned ids, or no candidate cleared the threshold.
    Unresolved {
        query: Option<String>,
        title: String,
        best_score: Option<f64>,
    },
    /// Neither a title nor a DOI to search with.
    Malformed { raw_text: String },
    /// The index failed or broke its contract.
    Failed {
        query: String,
        title: String,
        error: String,
    },
}

impl ResolutionOutcome {
    /// Short lowercase name, as written to the follow-up log.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolutionOutcome::Written { .. } => "written",
            ResolutionOutcome::AlreadyPresent { .. } => "already_present",
            ResolutionOutcome::Unresolved { .. } => "unresolved",
            ResolutionOutcome::Malformed { .. } => "malformed",
            ResolutionOutcome::Failed { .. } => "failed",
        }
    }

    /// Whether the reference goes to the follow-up log. Everything except a
    /// new row does, duplicates included.
    pub fn needs_follow_up(&self) -> bool {
        !matches!(self, ResolutionOutcome::Written { .. })
    }

    fn log_entry(&self) -> FollowUpEntry<'_> {
        let (query, title, detail) = match self {
            ResolutionOutcome::Written {
                external_id,
                query,
                score,
            } => (query.as_str(), "", format!("{external_id} (score {score:.3})")),
            ResolutionOutcome::AlreadyPresent {
                external_id,
                query,
                title,
            } => (query.as_str(), title.as_str(), external_id.clone()),
            ResolutionOutcome::Unresolved {
                query,
                title,
                best_score,
            } => (
                query.as_deref().unwrap_or_default(),
                title.as_str(),
                match best_score {
                    Some(score) => format!("best score {score:.3}"),
                    None => "no results".to_string(),
                },
            ),
            ResolutionOutcome::Malformed { raw_text } => ("", raw_text.as_str(), String::new()),
            ResolutionOutcome::Failed {
                query,
                title,
                error,
            } => (query.as_str(), title.as_str(), error.clone()),
        };
        FollowUpEntry {
            outcome: self.kind(),
            query,
            title,
            detail,
        }
    }
}

#[derive(Debug, Serialize)]
struct FollowUpEntry<'a> {
    outcome: &'static str,
    query: &'a str,
    title: &'a str,
    detail: String,
}

/// The outcomes of one run, in reference order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    outcomes: Vec<ResolutionOutcome>,
}

impl RunSummary {
    pub fn outcomes(&self) -> &[ResolutionOutcome] {
        &self.outcomes
    }

    pub fn push(&mut self, outcome: ResolutionOutcome) {
        self.outcomes.push(outcome);
    }

    /// Append the outcomes of another run against the same target.
    pub fn extend(&mut self, other: RunSummary) {
        self.outcomes.extend(other.outcomes);
    }

    fn count(&self, kind: &str) -> usize {
        self.outcomes.iter().filter(|o| o.kind() == kind).count()
    }

    pub fn written(&self) -> usize {
        self.count("written")
    }

    pub fn already_present(&self) -> usize {
        self.count("already_present")
    }

    pub fn unresolved(&self) -> usize {
        self.count("unresolved")
    }

    pub fn malformed(&self) -> usize {
        self.count("malformed")
    }

    pub fn failed(&self) -> usize {
        self.count("failed")
    }

    /// Outcomes that need manual follow-up.
    pub fn follow_ups(&self) -> impl Iterator<Item = &ResolutionOutcome> {
        self.outcomes.iter().filter(|o| o.needs_follow_up())
    }

    /// Append the follow-up outcomes to a CSV log with columns
    /// `outcome,query,title,detail`, writing the header when the file is new.
    /// Returns the number of entries written.
    pub fn write_follow_up_log(&self, path: impl AsRef<Path>) -> Result<usize, StoreError> {
        let path = path.as_ref();
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;

        let mut writer = WriterBuilder::new().has_headers(is_new).from_writer(file);
        let mut count = 0;
        for outcome in self.follow_ups() {
            writer.serialize(outcome.log_entry())?;
            count += 1;
        }
        if is_new && count == 0 {
            writer.write_record(["outcome", "query", "title", "detail"])?;
        }
        writer.flush().map_err(io_err)?;
        Ok(count)
    }
}

/// Resolves references against a [`SearchIndex`] into an [`OutputStore`].
#[derive(Debug)]
pub struct Resolver<S> {
    index: S,
    selector: MatchSelector,
}

impl<S: SearchIndex> Resolver<S> {
    pub fn new(index: S, policy: MatchPolicy) -> Self {
        Self {
            index,
            selector: MatchSelector::new(&policy),
        }
    }

    /// Resolve one reference.
    ///
    /// Search and fetch failures are reported as [`ResolutionOutcome::Failed`]
    /// and stop the fallback chain for this reference. Only store errors are
    /// returned as `Err`.
    pub fn resolve_reference(
        &self,
        reference: &ReferenceRecord,
        store: &mut OutputStore,
    ) -> Result<ResolutionOutcome, StoreError> {
        if reference.is_malformed() {
            return Ok(ResolutionOutcome::Malformed {
                raw_text: reference.raw_text.clone(),
            });
        }
        let queries = build_queries(reference);

        let failed = |query: &str, error: String| ResolutionOutcome::Failed {
            query: query.to_string(),
            title: reference.title.clone(),
            error,
        };

        for query in queries.iter() {
            let ids = match self.index.search(query) {
                Ok(ids) => ids,
                Err(e) => return Ok(failed(query, e.to_string())),
            };
            if ids.is_empty() {
                debug!(query, "no results");
                continue;
            }

            let candidates = match self.index.fetch(&ids) {
                Ok(candidates) => candidates,
                Err(e) => return Ok(failed(query, e.to_string())),
            };
            if candidates.len() != ids.len() {
                let error = SearchError::Contract(format!(
                    "fetch returned {} records for {} ids",
                    candidates.len(),
                    ids.len()
                ));
                return Ok(failed(query, error.to_string()));
            }

            let decision = self.selector.select(reference, &candidates, store.seen());
            let outcome = match (decision.external_id, decision.score) {
                (Some(external_id), Some(score)) if decision.accepted => {
                    if decision.already_present {
                        ResolutionOutcome::AlreadyPresent {
                            external_id,
                            query: query.to_string(),
                            title: reference.title.clone(),
                        }
                    } else {
                        let Some(article) = candidates
                            .into_iter()
                            .find(|c| c.external_id == external_id)
                        else {
                            let error = SearchError::Contract(format!(
                                "candidate {external_id} missing from fetch"
                            ));
                            return Ok(failed(query, error.to_string()));
                        };
                        store.write(OutputRow::included(article))?;
                        ResolutionOutcome::Written {
                            external_id,
                            query: query.to_string(),
                            score,
                        }
                    }
                }
                (_, best_score) => ResolutionOutcome::Unresolved {
                    query: Some(query.to_string()),
                    title: reference.title.clone(),
                    best_score,
                },
            };
            return Ok(outcome);
        }

        Ok(ResolutionOutcome::Unresolved {
            query: queries.last().map(String::from),
            title: reference.title.clone(),
            best_score: None,
        })
    }

    /// Resolve every reference in order, logging progress.
    pub fn run(
        &self,
        references: &[ReferenceRecord],
        store: &mut OutputStore,
    ) -> Result<RunSummary, StoreError> {
        let total = references.len();
        info!(store = %store.path().display(), total, "resolving references");

        let mut summary = RunSummary::default();
        for (i, reference) in references.iter().enumerate() {
            info!("Processing reference {}/{}", i + 1, total);
            let outcome = self.resolve_reference(reference, store)?;
            log_outcome(&outcome);
            summary.push(outcome);
        }

        info!(
            written = summary.written(),
            already_present = summary.already_present(),
            unresolved = summary.unresolved(),
            malformed = summary.malformed(),
            failed = summary.failed(),
            "run finished"
        );
        Ok(summary)
    }
}

fn log_outcome(outcome: &ResolutionOutcome) {
    match outcome {
        ResolutionOutcome::Written {
            external_id, score, ..
        } => debug!(external_id, score, "written"),
        ResolutionOutcome::AlreadyPresent { title, .. } => {
            debug!(title, "already in the store, skipped")
        }
        ResolutionOutcome::Unresolved { query, title, .. } => warn!(
            query = query.as_deref().unwrap_or_default(),
            title, "reference could not be retrieved"
        ),
        ResolutionOutcome::Malformed { raw_text } => {
            warn!(raw_text, "reference has no title or DOI")
        }
        ResolutionOutcome::Failed {
            query,
            title,
            error,
        } => warn!(query, title, error, "search failed"),
    }
}

/// Open the store at `path` and resolve `references` into it.
pub fn resolve_into<S: SearchIndex>(
    index: S,
    policy: MatchPolicy,
    references: &[ReferenceRecord],
    path: impl AsRef<Path>,
) -> Result<RunSummary, StoreError> {
    let mut store = OutputStore::initialize(path)?;
    Resolver::new(index, policy).run(references, &mut store)
}

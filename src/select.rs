//! Choosing the accepted candidate for a reference.
//!
//! Candidates are scored in the order the index ranked them. The first one
//! whose title is similar enough to the reference title wins; later
//! candidates are never consulted, even if they would score higher.

use crate::minhash::{MinHasher, NUM_PERM, SHINGLE_LEN};
use crate::store::SeenIdSet;
use crate::utils::strip_punctuation;
use crate::{CandidateArticle, ReferenceRecord};
use serde::{Deserialize, Serialize};

/// Minimum similarity for a candidate to be accepted.
pub const DEFAULT_THRESHOLD: f64 = 0.9;

/// Matching constants, loaded from the `[matching]` settings section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    /// Acceptance threshold, in `[0, 1]`
    pub threshold: f64,
    /// Shingle length in characters
    pub shingle_len: usize,
    /// Number of simulated hash functions
    pub num_perm: usize,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            shingle_len: SHINGLE_LEN,
            num_perm: NUM_PERM,
        }
    }
}

impl MatchPolicy {
    /// Check the constants are usable.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!(
                "matching.threshold must be between 0 and 1, got {}",
                self.threshold
            ));
        }
        if self.shingle_len == 0 {
            return Err("matching.shingle_len must be at least 1".to_string());
        }
        if self.num_perm == 0 {
            return Err("matching.num_perm must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Why a decision came out the way it did.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchReason {
    /// A new id cleared the threshold.
    Accepted,
    /// The winning id is already in the store.
    AlreadyPresent,
    /// Candidates were scored but none cleared the threshold.
    BelowThreshold { best: Option<f64> },
    /// There was nothing to score.
    NoCandidates,
}

/// The outcome of [`MatchSelector::select`].
#[derive(Debug, Clone, PartialEq)]
pub struct MatchDecision {
    pub accepted: bool,
    /// The accepted id was already stored; no new row should be written.
    pub already_present: bool,
    pub external_id: Option<String>,
    pub score: Option<f64>,
    pub reason: MatchReason,
}

impl MatchDecision {
    fn accept(external_id: &str, score: f64, already_present: bool) -> Self {
        Self {
            accepted: true,
            already_present,
            external_id: Some(external_id.to_string()),
            score: Some(score),
            reason: if already_present {
                MatchReason::AlreadyPresent
            } else {
                MatchReason::Accepted
            },
        }
    }

    fn reject(best: Option<f64>) -> Self {
        Self {
            accepted: false,
            already_present: false,
            external_id: None,
            score: best,
            reason: match best {
                Some(_) => MatchReason::BelowThreshold { best },
                None => MatchReason::NoCandidates,
            },
        }
    }

    /// Accepted and not yet stored.
    pub fn is_new(&self) -> bool {
        self.accepted && !self.already_present
    }
}

/// Scores candidates against a reference under a [`MatchPolicy`].
#[derive(Debug, Clone)]
pub struct MatchSelector {
    threshold: f64,
    hasher: MinHasher,
}

impl MatchSelector {
    pub fn new(policy: &MatchPolicy) -> Self {
        Self {
            threshold: policy.threshold,
            hasher: MinHasher::new(policy.shingle_len, policy.num_perm),
        }
    }

    /// Similarity of a candidate title to a reference title, ignoring
    /// surrounding punctuation. A reference title with nothing left after
    /// stripping matches nothing.
    pub fn score(&self, candidate_title: &str, reference_title: &str) -> f64 {
        let reference_title = strip_punctuation(reference_title);
        if reference_title.is_empty() {
            return 0.0;
        }
        self.hasher
            .similarity(strip_punctuation(candidate_title), reference_title)
    }

    /// Pick the first candidate, in ranked order, that clears the threshold.
    pub fn select(
        &self,
        reference: &ReferenceRecord,
        candidates: &[CandidateArticle],
        seen: &SeenIdSet,
    ) -> MatchDecision {
        let mut best: Option<f64> = None;

        for candidate in candidates {
            let score = self.score(&candidate.title, &reference.title);
            if score >= self.threshold {
                let already_present = seen.contains(&candidate.external_id);
                return MatchDecision::accept(&candidate.external_id, score, already_present);
            }
            best = Some(best.map_or(score, |b: f64| b.max(score)));
        }

        MatchDecision::reject(best)
    }
}

impl Default for MatchSelector {
    fn default() -> Self {
        Self::new(&MatchPolicy::default())
    }
}

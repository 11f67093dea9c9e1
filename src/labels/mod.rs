//! Keyword labels for screening rows.
//!
//! Both labellers look at the title and abstract of a record only; they are
//! cheap, deterministic, and independent per row.

pub mod evidence;
pub mod pk;

pub use evidence::EvidenceLabel;
pub use pk::PkLabel;

/// Labels computed for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLabels {
    pub evidence: EvidenceLabel,
    pub pk: PkLabel,
}

/// Compute every label for a title and abstract.
pub fn label(title: &str, abstract_text: &str) -> RecordLabels {
    RecordLabels {
        evidence: evidence::classify(title, abstract_text),
        pk: pk::detect(title, abstract_text),
    }
}

//! Error types.
//!
//! Each concern gets its own error enum. [`ParseError`] carries line
//! information for problems found inside CSV or XML content, and [`Error`]
//! wraps everything for callers that only need one type.

use crate::DataFormat;
use std::path::PathBuf;
use thiserror::Error;

/// Field name constants for consistent error reporting.
pub mod fields {
    pub const EXTERNAL_ID: &str = "external_id";
    pub const TITLE: &str = "title";
    pub const ABSTRACT: &str = "abstract";
    pub const DOI: &str = "doi";
    pub const INCLUSION_FLAG: &str = "inclusion_flag";
    pub const RECORD_ID: &str = "record_id";
    pub const LANGUAGE: &str = "language";
    pub const LABELING_TIME: &str = "labeling_time";
    pub const NOTES: &str = "notes";
    pub const ORIGINAL_PUBLICATION: &str = "original_publication";
    pub const ACCESSION_NUMBER: &str = "accession_number";
    pub const FULL_TEXT: &str = "full-text";
}

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[cfg(feature = "docx")]
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Screening(#[from] ScreeningError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for Results using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Parse error with location and context information.
#[derive(Error, Debug)]
#[error("Error in {format} content{}: {error}",
    match (line, column) {
        (Some(l), Some(c)) => format!(" at line {} column {}", l, c),
        (Some(l), None) => format!(" at line {}", l),
        (None, Some(c)) => format!(" at column {}", c),
        (None, None) => String::new(),
    }
)]
pub struct ParseError {
    /// Line number where the error occurred (1-based, None if not available)
    pub line: Option<usize>,
    /// Column or byte position where the error occurred (None if not available)
    pub column: Option<usize>,
    /// The format being read
    pub format: DataFormat,
    /// The specific error that occurred
    pub error: ValueError,
}

impl ParseError {
    /// Create a new ParseError.
    pub fn new(
        line: Option<usize>,
        column: Option<usize>,
        format: DataFormat,
        error: ValueError,
    ) -> Self {
        Self {
            line,
            column,
            format,
            error,
        }
    }

    /// Create a ParseError with just line information.
    pub fn at_line(line: usize, format: DataFormat, error: ValueError) -> Self {
        Self::new(Some(line), None, format, error)
    }

    /// Create a ParseError without position information.
    pub fn without_position(format: DataFormat, error: ValueError) -> Self {
        Self::new(None, None, format, error)
    }

    /// Wrap a low-level XML reader error.
    #[cfg(any(feature = "eutils", feature = "docx"))]
    pub(crate) fn xml(format: DataFormat, position: u64, err: impl std::fmt::Display) -> Self {
        Self::new(
            None,
            Some(position as usize),
            format,
            ValueError::Syntax(format!("XML parsing error: {}", err)),
        )
    }
}

/// Specific value-level errors that can occur while reading content.
#[derive(Error, Debug)]
pub enum ValueError {
    #[error("Bad syntax: {0}")]
    Syntax(String),

    #[error("Missing value for {key}")]
    MissingValue {
        field: &'static str,
        key: &'static str,
    },
}

/// Errors raised by the output store. All of them are fatal for the target
/// being processed.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on store {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Failed to write store row: {0}")]
    Write(#[from] csv::Error),

    #[error("Store {} has unexpected header {found:?}", path.display())]
    Schema { path: PathBuf, found: Vec<String> },

    #[error("External id {external_id} is already present in the store")]
    Duplicate { external_id: String },
}

/// Errors raised by a [`SearchIndex`](crate::search::SearchIndex).
///
/// These are contained per reference by the pipeline.
#[derive(Error, Debug)]
pub enum SearchError {
    /// HTTP request failed (network, timeout, etc.)
    #[cfg(any(feature = "eutils", feature = "fulltext"))]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The index answered with an error status code.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be understood.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The index returned a result that breaks the adapter contract.
    #[error("Contract violation: {0}")]
    Contract(String),

    /// The index could not be reached for another reason.
    #[error("Index unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while reading a source document.
#[cfg(feature = "docx")]
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Not a valid Word document: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Document has no {0} part")]
    MissingPart(&'static str),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Errors raised while processing a screening export.
#[derive(Error, Debug)]
pub enum ScreeningError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Failed to write processed export: {0}")]
    Write(#[from] csv::Error),

    #[error("Screening export has no {0} column")]
    MissingColumn(&'static str),

    #[error("Full-text lookup unavailable: {0}")]
    FullText(#[from] SearchError),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// Conversion implementations for external error types

impl From<csv::Error> for ParseError {
    fn from(err: csv::Error) -> Self {
        let (line, column) = if let Some(position) = err.position() {
            (
                Some(position.line() as usize),
                Some(position.byte() as usize),
            )
        } else {
            (None, None)
        };

        ParseError::new(
            line,
            column,
            DataFormat::Csv,
            ValueError::Syntax(err.to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let error = ParseError::at_line(
            42,
            DataFormat::Csv,
            ValueError::Syntax("Unterminated quote".to_string()),
        );

        let display = format!("{}", error);
        assert!(display.contains("line 42"));
        assert!(display.contains("CSV content"));
        assert!(display.contains("Unterminated quote"));
    }

    #[test]
    fn test_parse_error_without_position() {
        let error = ParseError::without_position(
            DataFormat::EUtilsXml,
            ValueError::MissingValue {
                field: fields::EXTERNAL_ID,
                key: "PMID",
            },
        );

        let display = format!("{}", error);
        assert!(display.contains("E-utilities XML content"));
        assert!(!display.contains("line"));
    }

    #[test]
    fn test_value_error_display() {
        let error = ValueError::MissingValue {
            field: fields::TITLE,
            key: "title",
        };
        assert_eq!(format!("{}", error), "Missing value for title");
    }

    #[test]
    fn test_duplicate_display() {
        let error = StoreError::Duplicate {
            external_id: "111".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "External id 111 is already present in the store"
        );
    }

    #[test]
    fn test_csv_error_conversion() {
        let csv_content = "external_id,title\n1,a,extra";
        let mut reader = csv::Reader::from_reader(csv_content.as_bytes());
        let result = reader.records().next();

        if let Some(Err(csv_err)) = result {
            let parse_err: ParseError = csv_err.into();
            assert_eq!(parse_err.format, DataFormat::Csv);
            assert!(matches!(parse_err.error, ValueError::Syntax(_)));
        }
    }
}

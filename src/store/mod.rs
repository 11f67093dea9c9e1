//! The deduplicating, append-only CSV store of accepted records.
//!
//! A store is initialised once per target. Its existing ids are loaded into a
//! [`SeenIdSet`], and every accepted row is appended and flushed immediately,
//! so an interrupted run leaves a valid store behind and a repeated run adds
//! nothing it already holds.
//!
//! # Example
//!
//! ```no_run
//! use refscreen::{CandidateArticle, OutputRow};
//! use refscreen::store::OutputStore;
//!
//! let mut store = OutputStore::initialize("csv/review.csv")?;
//! if !store.seen().contains("111") {
//!     store.write(OutputRow::included(CandidateArticle::placeholder("111")))?;
//! }
//! # Ok::<(), refscreen::StoreError>(())
//! ```

mod schema;

pub use schema::{HEADER, LEGACY_HEADER, StoreSchema};

use crate::OutputRow;
use crate::error::{ParseError, StoreError};
use csv::{ReaderBuilder, WriterBuilder};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// External ids already held by a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenIdSet(HashSet<String>);

impl SeenIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, external_id: &str) -> bool {
        self.0.contains(external_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns `false` when the id was already present.
    pub(crate) fn insert(&mut self, external_id: impl Into<String>) -> bool {
        self.0.insert(external_id.into())
    }
}

impl<S: Into<String>> FromIterator<S> for SeenIdSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// An open output store.
#[derive(Debug)]
pub struct OutputStore {
    path: PathBuf,
    schema: StoreSchema,
    seen: SeenIdSet,
    writer: csv::Writer<File>,
    written: usize,
}

impl OutputStore {
    /// Open the store at `path`, creating it (and its parent directories) with
    /// the header when it does not exist or is empty.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or written, is not valid CSV, or
    /// carries a header that is neither the current nor the legacy one.
    pub fn initialize(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };

        let existing = match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(io_err(e)),
        };

        let (schema, seen, needs_header, needs_newline) = match &existing {
            Some(bytes) if !String::from_utf8_lossy(bytes).trim().is_empty() => {
                let content = String::from_utf8_lossy(bytes);
                let (schema, seen) = read_store(&path, &content)?;
                (schema, seen, false, !content.ends_with('\n'))
            }
            _ => (StoreSchema::Current, SeenIdSet::new(), true, false),
        };

        if existing.is_none()
            && let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        if needs_header {
            file.set_len(0).map_err(io_err)?;
        }
        if needs_newline {
            file.write_all(b"\n").map_err(io_err)?;
        }

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            writer.write_record(HEADER)?;
            writer.flush().map_err(io_err)?;
        }

        debug!(path = %path.display(), ids = seen.len(), ?schema, "opened store");

        Ok(Self {
            path,
            schema,
            seen,
            writer,
            written: 0,
        })
    }

    /// The ids currently held, including those written through this handle.
    pub fn seen(&self) -> &SeenIdSet {
        &self.seen
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> StoreSchema {
        self.schema
    }

    /// Rows appended through this handle.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Append one row and flush it to disk.
    ///
    /// # Errors
    ///
    /// [`StoreError::Duplicate`] if the id is already stored; nothing is
    /// written in that case.
    pub fn write(&mut self, row: OutputRow) -> Result<(), StoreError> {
        if self.seen.contains(&row.external_id) {
            return Err(StoreError::Duplicate {
                external_id: row.external_id,
            });
        }

        self.writer.serialize(&row)?;
        self.writer.flush().map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        self.seen.insert(row.external_id);
        self.written += 1;
        Ok(())
    }
}

/// Check the header of existing store content and collect its ids.
fn read_store(path: &Path, content: &str) -> Result<(StoreSchema, SeenIdSet), StoreError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let header = reader.headers().map_err(ParseError::from)?;
    let schema = StoreSchema::detect(header.iter()).ok_or_else(|| StoreError::Schema {
        path: path.to_path_buf(),
        found: header.iter().map(String::from).collect(),
    })?;

    let mut seen = SeenIdSet::new();
    for result in reader.records() {
        let record = result.map_err(ParseError::from)?;
        match record.get(0).map(str::trim) {
            Some(id) if !id.is_empty() => {
                seen.insert(id);
            }
            _ => {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                warn!(path = %path.display(), line, "store row without an external id");
            }
        }
    }

    Ok((schema, seen))
}

/// Store location for a source document: `<dir>/csv/<name>.csv`.
///
/// A leading number followed by a label before the first period keeps only
/// the number (`"3b. Title.docx"` becomes `"3. Title.csv"`).
pub fn output_path_for(document: impl AsRef<Path>) -> PathBuf {
    let document = document.as_ref();
    let dir = document.parent().unwrap_or_else(|| Path::new(""));
    let stem = document
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let digits = stem.len() - stem.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let label_end = stem[digits..].find('.').map_or(stem.len(), |i| digits + i);
    let name = if digits > 0 && label_end > digits {
        format!("{}{}", &stem[..digits], &stem[label_end..])
    } else {
        stem
    };

    dir.join("csv").join(format!("{name}.csv"))
}

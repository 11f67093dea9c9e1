//! Reference extraction from Word review documents.
//!
//! A [`DocxDocument`] holds the body of `word/document.xml` as paragraphs and
//! tables with just enough run formatting (bold, underline) for the
//! extractors to recognise headings and titles:
//!
//! - [`endnote`]: the reference section of an RBA document
//! - [`tables`]: titles in the summary tables of an RBA document
//! - [`drd`]: the numbered reference list of a DRD document
//!
//! # Example
//!
//! ```no_run
//! use refscreen::extract::{DocxDocument, Layout, collect_references};
//!
//! let doc = DocxDocument::open("docs/3b. Risicoanalyse clonazepam.docx")?;
//! for reference in collect_references(&doc, Layout::Rba) {
//!     println!("{}", reference.title);
//! }
//! # Ok::<(), refscreen::ExtractError>(())
//! ```

mod docx;
pub mod drd;
pub mod endnote;
pub mod tables;

use crate::ReferenceRecord;
use crate::error::ExtractError;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

const DOCUMENT_PART: &str = "word/document.xml";

/// A run of text sharing one formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub underline: bool,
}

impl Run {
    pub fn new(text: impl Into<String>, bold: bool, underline: bool) -> Self {
        Self {
            text: text.into(),
            bold,
            underline,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub runs: Vec<Run>,
}

impl Paragraph {
    /// The concatenated text of all runs.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    pub fn first_run(&self) -> Option<&Run> {
        self.runs.first()
    }

    pub fn last_run(&self) -> Option<&Run> {
        self.runs.last()
    }
}

/// A table cell. Paragraphs of tables nested in the cell are flattened into it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    pub paragraphs: Vec<Paragraph>,
}

impl Cell {
    /// Paragraph texts joined with newlines.
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.rows.iter().flatten()
    }
}

/// A top-level element of the document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

/// The body of a Word document, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocxDocument {
    blocks: Vec<Block>,
}

impl DocxDocument {
    /// Read the main document part of a `.docx` file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExtractError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut archive = zip::ZipArchive::new(file)?;
        let mut part = match archive.by_name(DOCUMENT_PART) {
            Ok(part) => part,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(ExtractError::MissingPart(DOCUMENT_PART));
            }
            Err(e) => return Err(e.into()),
        };

        let mut xml = String::new();
        part.read_to_string(&mut xml)
            .map_err(|source| ExtractError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let doc = Self::from_xml(&xml)?;
        debug!(
            path = %path.display(),
            paragraphs = doc.paragraphs().count(),
            tables = doc.tables().count(),
            "read document"
        );
        Ok(doc)
    }

    /// Parse the content of a `word/document.xml` part.
    pub fn from_xml(xml: &str) -> Result<Self, crate::ParseError> {
        docx::parse_document(xml).map(|blocks| Self { blocks })
    }

    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Top-level paragraphs, skipping tables.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            Block::Table(_) => None,
        })
    }

    /// Top-level tables.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Table(t) => Some(t),
            Block::Paragraph(_) => None,
        })
    }
}

/// How references are laid out in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Layout {
    /// Risk-benefit analysis: reference section plus summary tables
    #[default]
    Rba,
    /// Drug reference document: numbered reference list
    Drd,
}

/// Run the extractors that belong to `layout`, in document order.
pub fn collect_references(doc: &DocxDocument, layout: Layout) -> Vec<ReferenceRecord> {
    match layout {
        Layout::Rba => {
            let mut references = endnote::collect_references(doc);
            references.extend(tables::collect_references(doc));
            references
        }
        Layout::Drd => drd::collect_references(doc),
    }
}

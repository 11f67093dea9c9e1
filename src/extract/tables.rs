//! Titles from the summary tables of an RBA document.
//!
//! A summary cell opens with a bold run and mentions "samenvatting" or
//! "summary". Its leading bold text is the title of the summarised study and
//! the plain text that follows it names the authors.

use super::{Cell, DocxDocument};
use crate::ReferenceRecord;
use crate::regex::Regex;
use crate::utils::normalize_space;
use std::sync::LazyLock;

/// Section numbers such as `1.2` mark headings, not titles.
static SECTION_NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9].[0-9]").unwrap());

const SUMMARY_MARKERS: [&str; 2] = ["samenvatting", "summary"];

/// Collect one reference per summary cell, in table order.
pub fn collect_references(doc: &DocxDocument) -> Vec<ReferenceRecord> {
    doc.tables()
        .flat_map(|table| table.cells())
        .filter(|cell| is_summary_cell(cell))
        .filter_map(reference_from_cell)
        .collect()
}

fn is_summary_cell(cell: &Cell) -> bool {
    let starts_bold = cell
        .paragraphs
        .first()
        .and_then(|p| p.first_run())
        .is_some_and(|r| r.bold);
    if !starts_bold {
        return false;
    }
    let text = cell.text().to_lowercase();
    SUMMARY_MARKERS.iter().any(|m| text.contains(m))
}

fn reference_from_cell(cell: &Cell) -> Option<ReferenceRecord> {
    let mut bold_text = String::new();
    let mut title = String::new();
    let mut authors = String::new();

    for (i, paragraph) in cell.paragraphs.iter().enumerate() {
        let (Some(first), Some(last)) = (paragraph.first_run(), paragraph.last_run()) else {
            continue;
        };

        if i == 0 && first.bold && !last.bold {
            // title and authors share the first paragraph
            for run in &paragraph.runs {
                if run.bold {
                    push_word(&mut bold_text, &run.text);
                } else {
                    title.clone_from(&bold_text);
                }
                if !title.is_empty() && !run.bold && run.text != " " {
                    push_word(&mut authors, &run.text);
                }
            }
        } else if first.bold && last.bold && title.is_empty() {
            push_word(&mut bold_text, &paragraph.text());
        } else if !last.bold
            && i > 0
            && cell.paragraphs[i - 1].last_run().is_some_and(|r| r.bold)
        {
            title.clone_from(&bold_text);
            push_word(&mut authors, &paragraph.text());
        } else if first.underline {
            let lower = first.text.to_lowercase();
            if SUMMARY_MARKERS.iter().any(|m| lower.starts_with(m)) {
                break;
            }
        }
    }

    let title = normalize_space(&title);
    if title.is_empty() || SECTION_NUMBER_REGEX.is_match(&title) {
        return None;
    }
    Some(ReferenceRecord::new(
        cell.text(),
        normalize_space(&authors),
        title,
        "",
    ))
}

fn push_word(buffer: &mut String, text: &str) {
    buffer.push_str(text.trim());
    buffer.push(' ');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::testing::*;
    use crate::extract::{Block, Paragraph, Run, Table};
    use pretty_assertions::assert_eq;

    fn underlined(text: &str) -> Paragraph {
        Paragraph {
            runs: vec![Run::new(text, false, true)],
        }
    }

    fn doc_with_cells(cells: Vec<Vec<Paragraph>>) -> DocxDocument {
        let row = cells
            .into_iter()
            .map(|paragraphs| Cell { paragraphs })
            .collect();
        DocxDocument::from_blocks(vec![Block::Table(Table { rows: vec![row] })])
    }

    #[test]
    fn test_title_and_authors_in_first_paragraph() {
        let doc = doc_with_cells(vec![vec![
            runs(&[("Effects of X\u{a0}on Y.", true), (" Smith J, 2010", false)]),
            underlined("Summary"),
            plain("The study found..."),
        ]]);

        let references = collect_references(&doc);
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].title, "Effects of X on Y.");
        assert_eq!(references[0].authors.as_deref(), Some("Smith J, 2010"));
    }

    #[test]
    fn test_title_over_several_bold_paragraphs() {
        let doc = doc_with_cells(vec![vec![
            bold("Long title part one"),
            bold("part two"),
            plain("Smith J, Jones K"),
            underlined("Samenvatting"),
        ]]);

        let references = collect_references(&doc);
        assert_eq!(references[0].title, "Long title part one part two");
        assert_eq!(references[0].authors.as_deref(), Some("Smith J, Jones K"));
    }

    #[test]
    fn test_cells_without_marker_or_bold_start_are_ignored() {
        let doc = doc_with_cells(vec![
            vec![bold("Title"), plain("Smith J")],
            vec![plain("Title"), plain("Summary")],
        ]);
        assert!(collect_references(&doc).is_empty());
    }

    #[test]
    fn test_section_numbered_titles_are_dropped() {
        let doc = doc_with_cells(vec![vec![
            runs(&[("1.2 Samenvatting", true), (" algemeen", false)]),
        ]]);
        assert!(collect_references(&doc).is_empty());
    }

    #[test]
    fn test_cell_without_authors_has_no_title() {
        let doc = doc_with_cells(vec![vec![bold("Summary of findings")]]);
        assert!(collect_references(&doc).is_empty());
    }
}

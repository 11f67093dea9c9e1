//! WordprocessingML body parsing.
//!
//! Elements are matched on their local name, so the `w:` prefix may be bound
//! to any namespace. Only direct run properties count for bold and underline;
//! styles and paragraph-mark properties are ignored.

use super::{Block, Cell, Paragraph, Run, Table};
use crate::DataFormat;
use crate::error::ParseError;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

#[derive(Debug, Default)]
struct TableBuilder {
    rows: Vec<Vec<Cell>>,
    row: Option<Vec<Cell>>,
    cell: Option<Cell>,
}

#[derive(Debug, Default)]
struct BodyBuilder {
    blocks: Vec<Block>,
    tables: Vec<TableBuilder>,
    paragraph: Option<Paragraph>,
    run: Option<Run>,
    in_paragraph_props: bool,
    in_run_props: bool,
    in_text: bool,
}

impl BodyBuilder {
    fn start(&mut self, e: &BytesStart<'_>) {
        match e.local_name().as_ref() {
            b"tbl" => self.tables.push(TableBuilder::default()),
            b"tr" => {
                if let Some(table) = self.tables.last_mut() {
                    table.row = Some(Vec::new());
                }
            }
            b"tc" => {
                if let Some(table) = self.tables.last_mut() {
                    table.cell = Some(Cell::default());
                }
            }
            b"p" => self.paragraph = Some(Paragraph::default()),
            b"pPr" => self.in_paragraph_props = true,
            b"r" if self.paragraph.is_some() => self.run = Some(Run::default()),
            b"rPr" if self.run.is_some() && !self.in_paragraph_props => self.in_run_props = true,
            b"t" if self.run.is_some() => self.in_text = true,
            _ => self.property_or_break(e),
        }
    }

    fn empty(&mut self, e: &BytesStart<'_>) {
        match e.local_name().as_ref() {
            // Self-closing paragraphs and cells still occupy a position
            b"p" => {
                self.paragraph = Some(Paragraph::default());
                self.end_paragraph();
            }
            b"tc" => {
                if let Some(table) = self.tables.last_mut() {
                    table.cell = Some(Cell::default());
                }
                self.end_cell();
            }
            _ => self.property_or_break(e),
        }
    }

    fn property_or_break(&mut self, e: &BytesStart<'_>) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        match e.local_name().as_ref() {
            b"b" if self.in_run_props => run.bold = toggle_value(e),
            b"u" if self.in_run_props => run.underline = underline_value(e),
            b"tab" if !self.in_run_props => run.text.push('\t'),
            b"br" | b"cr" if !self.in_run_props => run.text.push('\n'),
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_text
            && let Some(run) = self.run.as_mut()
        {
            run.text.push_str(text);
        }
    }

    fn end(&mut self, local_name: &[u8]) {
        match local_name {
            b"t" => self.in_text = false,
            b"rPr" => self.in_run_props = false,
            b"pPr" => self.in_paragraph_props = false,
            b"r" => {
                if let (Some(run), Some(paragraph)) = (self.run.take(), self.paragraph.as_mut()) {
                    paragraph.runs.push(run);
                }
                self.in_run_props = false;
                self.in_text = false;
            }
            b"p" => self.end_paragraph(),
            b"tc" => self.end_cell(),
            b"tr" => {
                if let Some(table) = self.tables.last_mut()
                    && let Some(row) = table.row.take()
                {
                    table.rows.push(row);
                }
            }
            b"tbl" => self.end_table(),
            _ => {}
        }
    }

    fn end_paragraph(&mut self) {
        let Some(paragraph) = self.paragraph.take() else {
            return;
        };
        self.in_paragraph_props = false;
        match self.tables.last_mut() {
            Some(TableBuilder {
                cell: Some(cell), ..
            }) => cell.paragraphs.push(paragraph),
            Some(_) => {}
            None => self.blocks.push(Block::Paragraph(paragraph)),
        }
    }

    fn end_cell(&mut self) {
        if let Some(table) = self.tables.last_mut()
            && let Some(cell) = table.cell.take()
        {
            table.row.get_or_insert_with(Vec::new).push(cell);
        }
    }

    fn end_table(&mut self) {
        let Some(builder) = self.tables.pop() else {
            return;
        };
        let table = Table { rows: builder.rows };
        match self.tables.last_mut() {
            Some(TableBuilder {
                cell: Some(cell), ..
            }) => cell
                .paragraphs
                .extend(table.rows.into_iter().flatten().flat_map(|c| c.paragraphs)),
            Some(_) => {}
            None => self.blocks.push(Block::Table(table)),
        }
    }
}

/// `w:b`-style toggles: on unless `w:val` is `0`, `false` or `off`.
fn toggle_value(e: &BytesStart<'_>) -> bool {
    match attribute_val(e) {
        Some(val) => !matches!(val.as_str(), "0" | "false" | "off"),
        None => true,
    }
}

fn underline_value(e: &BytesStart<'_>) -> bool {
    attribute_val(e).is_none_or(|val| val != "none")
}

fn attribute_val(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == b"val")
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Text boxes hold paragraphs of their own, and `mc:Fallback` repeats the
/// content of the preferred `mc:Choice`.
fn is_skipped(e: &BytesStart<'_>) -> bool {
    matches!(e.local_name().as_ref(), b"txbxContent" | b"Fallback")
}

/// Parse the body of a `word/document.xml` part into blocks.
pub(crate) fn parse_document(xml: &str) -> Result<Vec<Block>, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut body = BodyBuilder::default();
    let mut buf = Vec::new();

    loop {
        let pos = reader.buffer_position();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if is_skipped(e) => {
                reader
                    .read_to_end_into(e.name(), &mut Vec::new())
                    .map_err(|err| ParseError::xml(DataFormat::WordXml, pos, err))?;
            }
            Ok(Event::Start(ref e)) => body.start(e),
            Ok(Event::Empty(ref e)) => body.empty(e),
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| ParseError::xml(DataFormat::WordXml, pos, err))?;
                body.text(&text);
            }
            Ok(Event::End(ref e)) => body.end(e.local_name().as_ref()),
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::xml(DataFormat::WordXml, pos, e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(body.blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn wrap(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr/></w:body></w:document>"#
        )
    }

    fn paragraphs(blocks: &[Block]) -> Vec<&Paragraph> {
        blocks
            .iter()
            .filter_map(|b| match b {
                Block::Paragraph(p) => Some(p),
                Block::Table(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_text_boxes_do_not_split_the_surrounding_paragraph() {
        let text_box = r#"<w:txbxContent><w:p><w:r><w:t>Box text</w:t></w:r></w:p></w:txbxContent>"#;
        let xml = wrap(&format!(
            r#"<w:p><w:r><w:t>Before </w:t></w:r>
                <w:r><mc:AlternateContent xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006">
                    <mc:Choice Requires="wps"><w:drawing><wps:txbx xmlns:wps="urn:wps">{text_box}</wps:txbx></w:drawing></mc:Choice>
                    <mc:Fallback><w:pict><v:textbox xmlns:v="urn:v">{text_box}</v:textbox></w:pict></mc:Fallback>
                </mc:AlternateContent></w:r>
                <w:r><w:t>after.</w:t></w:r></w:p>
            <w:p><w:r><w:t>Next</w:t></w:r></w:p>"#
        ));
        let blocks = parse_document(&xml).unwrap();
        let texts: Vec<String> = paragraphs(&blocks).iter().map(|p| p.text()).collect();

        assert_eq!(texts, vec!["Before after.".to_string(), "Next".to_string()]);
    }

    #[test]
    fn test_runs_carry_formatting() {
        let xml = wrap(
            r#"<w:p><w:pPr><w:rPr><w:b/></w:rPr></w:pPr>
                <w:r><w:rPr><w:b/><w:u w:val="single"/></w:rPr><w:t>Bold </w:t></w:r>
                <w:r><w:rPr><w:b w:val="0"/></w:rPr><w:t xml:space="preserve"> plain &amp; simple</w:t></w:r>
                <w:r><w:t>end</w:t></w:r></w:p>"#,
        );
        let blocks = parse_document(&xml).unwrap();
        let para = paragraphs(&blocks)[0];

        assert_eq!(
            para.runs,
            vec![
                Run::new("Bold ", true, true),
                Run::new(" plain & simple", false, false),
                Run::new("end", false, false),
            ]
        );
        assert_eq!(para.text(), "Bold  plain & simpleend");
    }

    #[test]
    fn test_tabs_and_breaks() {
        let xml = wrap(r#"<w:p><w:r><w:t>12.</w:t><w:tab/><w:t>Smith</w:t><w:br/><w:t>x</w:t></w:r></w:p>"#);
        let blocks = parse_document(&xml).unwrap();
        assert_eq!(paragraphs(&blocks)[0].text(), "12.\tSmith\nx");
    }

    #[test]
    fn test_underline_none() {
        let xml = wrap(r#"<w:p><w:r><w:rPr><w:u w:val="none"/></w:rPr><w:t>a</w:t></w:r></w:p>"#);
        let blocks = parse_document(&xml).unwrap();
        assert!(!paragraphs(&blocks)[0].runs[0].underline);
    }

    #[test]
    fn test_empty_paragraph_is_kept() {
        let xml = wrap(r#"<w:p><w:r><w:t>a</w:t></w:r></w:p><w:p/><w:p><w:pPr/></w:p>"#);
        let blocks = parse_document(&xml).unwrap();
        let texts: Vec<String> = paragraphs(&blocks).iter().map(|p| p.text()).collect();
        assert_eq!(texts, vec!["a", "", ""]);
    }

    #[test]
    fn test_tables_keep_rows_and_cells() {
        let xml = wrap(
            r#"<w:p><w:r><w:t>before</w:t></w:r></w:p>
            <w:tbl><w:tblPr/>
              <w:tr><w:tc><w:p><w:r><w:t>a1</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>b1</w:t></w:r></w:p><w:p><w:r><w:t>b1'</w:t></w:r></w:p></w:tc></w:tr>
              <w:tr><w:tc><w:p/></w:tc></w:tr>
            </w:tbl>
            <w:p><w:r><w:t>after</w:t></w:r></w:p>"#,
        );
        let blocks = parse_document(&xml).unwrap();

        assert_eq!(blocks.len(), 3);
        let Block::Table(table) = &blocks[1] else {
            panic!("expected a table");
        };
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].len(), 2);
        assert_eq!(table.rows[0][1].text(), "b1\nb1'");
        assert_eq!(table.rows[1][0].text(), "");
        assert_eq!(paragraphs(&blocks)[1].text(), "after");
    }

    #[test]
    fn test_nested_table_is_flattened_into_cell() {
        let xml = wrap(
            r#"<w:tbl><w:tr><w:tc>
                <w:p><w:r><w:t>outer</w:t></w:r></w:p>
                <w:tbl><w:tr><w:tc><w:p><w:r><w:t>inner</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
                <w:p/>
            </w:tc></w:tr></w:tbl>"#,
        );
        let blocks = parse_document(&xml).unwrap();

        assert_eq!(blocks.len(), 1);
        let Block::Table(table) = &blocks[0] else {
            panic!("expected a table");
        };
        assert_eq!(table.rows[0][0].text(), "outer\ninner\n");
    }

    #[test]
    fn test_hyperlink_runs_are_included() {
        let xml = wrap(
            r#"<w:p><w:r><w:t>see </w:t></w:r><w:hyperlink><w:r><w:t>link</w:t></w:r></w:hyperlink></w:p>"#,
        );
        let blocks = parse_document(&xml).unwrap();
        assert_eq!(paragraphs(&blocks)[0].text(), "see link");
    }

    #[test]
    fn test_deleted_text_is_ignored() {
        let xml = wrap(r#"<w:p><w:del><w:r><w:delText>gone</w:delText></w:r></w:del><w:r><w:t>kept</w:t></w:r></w:p>"#);
        let blocks = parse_document(&xml).unwrap();
        assert_eq!(paragraphs(&blocks)[0].text(), "kept");
    }

    #[test]
    fn test_malformed_xml() {
        let err = parse_document("<w:document><w:body><w:p></w:body>").unwrap_err();
        assert_eq!(err.format, DataFormat::WordXml);
    }
}

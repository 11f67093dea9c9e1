//! Enrichment of screening exports.
//!
//! A screening export is a CSV file with one row per record and at least the
//! `record_id`, `title` and `abstract` columns. Processing filters rows by
//! language, optionally marks full-text access, turns DOIs into links, appends
//! evidence and PK labels, merges labeling time and notes from a separate
//! labeling file, and writes the result next to the export as
//! `<name>_processed.csv`.

use crate::config::ScreeningConfig;
use crate::DataFormat;
use crate::error::{ParseError, ScreeningError, ValueError, fields};
use crate::fulltext::{Availability, FullTextIndex};
use crate::labels;
use csv::{ReaderBuilder, WriterBuilder};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Columns appended by [`ScreeningTable::apply_labels`].
pub const LABEL_COLUMNS: [&str; 4] = ["evidence", "keyword for evidence", "PK", "PK_keyword"];

/// An export held in memory as strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreeningTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ScreeningTable {
    /// Load an export from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ScreeningError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ScreeningError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    /// Load an export, checking the required columns are present.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ScreeningError> {
        let (headers, rows) = read_csv(reader)?;
        let table = Self { headers, rows };
        for required in [fields::RECORD_ID, fields::TITLE, fields::ABSTRACT] {
            if table.column(required).is_none() {
                return Err(ScreeningError::MissingColumn(required));
            }
        }
        Ok(table)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by exact header name.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// The value of `name` in row `row`, if both exist.
    pub fn get(&self, row: usize, name: &str) -> Option<&str> {
        let column = self.column(name)?;
        self.rows.get(row)?.get(column).map(String::as_str)
    }

    /// Drop rows in a language that is not allowed.
    ///
    /// A `language` value is checked against `allowed_languages`. When it is
    /// blank, the language of the `original_publication` text is detected and
    /// checked against `detected_languages`. Rows with neither are kept.
    /// Returns the number of rows removed.
    pub fn retain_languages(&mut self, config: &ScreeningConfig) -> usize {
        let language = self.column(fields::LANGUAGE);
        let publication = self.column(fields::ORIGINAL_PUBLICATION);
        let before = self.rows.len();
        self.rows.retain(|row| {
            let declared = language.map_or("", |c| row[c].trim());
            if !declared.is_empty() {
                return config.allowed_languages.iter().any(|a| a == declared);
            }
            match detect_language(publication.map_or("", |c| row[c].trim())) {
                Some(code) => config.detected_languages.iter().any(|a| a == code),
                None => true,
            }
        });
        before - self.rows.len()
    }

    /// Add a `full-text` column: `1` when `index` reports full-text access
    /// for the row's `accession_number`, `0` otherwise. Failed lookups count
    /// as no access. Returns the number of rows with access.
    pub fn mark_full_text(&mut self, index: &dyn FullTextIndex) -> Result<usize, ScreeningError> {
        let Some(id_column) = self.column(fields::ACCESSION_NUMBER) else {
            return Err(ScreeningError::MissingColumn(fields::ACCESSION_NUMBER));
        };

        let mut available = 0;
        let mut flags = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let pubmed_id = row[id_column].trim();
            let has_full_text = if pubmed_id.is_empty() {
                debug!("row without accession number");
                false
            } else {
                match index.availability(pubmed_id) {
                    Ok(Availability::NotFound) => {
                        warn!(pubmed_id, "no article found, check full-text access manually");
                        false
                    }
                    Ok(availability) => availability.has_full_text(),
                    Err(e) => {
                        warn!(pubmed_id, error = %e, "full-text lookup failed");
                        false
                    }
                }
            };
            available += usize::from(has_full_text);
            flags.push(if has_full_text { "1" } else { "0" }.to_string());
        }

        self.set_column(fields::FULL_TEXT, flags);
        Ok(available)
    }

    /// Prefix every non-empty DOI with `prefix`.
    pub fn link_dois(&mut self, prefix: &str) {
        let Some(column) = self.column(fields::DOI) else {
            return;
        };
        for row in &mut self.rows {
            let doi = row[column].trim();
            if !doi.is_empty() && !doi.starts_with(prefix) {
                row[column] = format!("{prefix}{doi}");
            }
        }
    }

    /// Label every row by its title and abstract.
    pub fn apply_labels(&mut self) {
        let (Some(title), Some(abstract_col)) =
            (self.column(fields::TITLE), self.column(fields::ABSTRACT))
        else {
            return;
        };

        let labelled: Vec<labels::RecordLabels> = self
            .rows
            .par_iter()
            .map(|row| labels::label(&row[title], &row[abstract_col]))
            .collect();

        let mut columns: [Vec<String>; 4] = Default::default();
        for label in labelled {
            columns[0].push(label.evidence.levels());
            columns[1].push(label.evidence.keywords());
            columns[2].push(label.pk.flag().to_string());
            columns[3].push(label.pk.keyword().unwrap_or_default().to_string());
        }
        for (name, values) in LABEL_COLUMNS.into_iter().zip(columns) {
            self.set_column(name, values);
        }
    }

    /// Left-join labeling time and notes by record id.
    pub fn merge_labeling(&mut self, labeling: &LabelingData) {
        let Some(id_column) = self.column(fields::RECORD_ID) else {
            return;
        };

        let (times, notes): (Vec<String>, Vec<String>) = self
            .rows
            .iter()
            .map(|row| match labeling.get(row[id_column].trim()) {
                Some(entry) => (entry.labeling_time.clone(), entry.notes.clone()),
                None => (String::new(), String::new()),
            })
            .unzip();

        self.set_column(fields::LABELING_TIME, times);
        self.set_column(fields::NOTES, notes);
    }

    /// Replace the column `name`, or append it.
    fn set_column(&mut self, name: &str, values: Vec<String>) {
        let column = match self.column(name) {
            Some(column) => column,
            None => {
                self.headers.push(name.to_string());
                for row in &mut self.rows {
                    row.push(String::new());
                }
                self.headers.len() - 1
            }
        };
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[column] = value;
        }
    }

    /// Write the table as CSV.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), ScreeningError> {
        let mut writer = WriterBuilder::new().from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Write the table to `path`, replacing it.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ScreeningError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| ScreeningError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.write_to(file)
    }
}

/// One row of a labeling file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelingEntry {
    pub labeling_time: String,
    pub notes: String,
}

/// Labeling time and notes keyed by record id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelingData {
    entries: HashMap<String, LabelingEntry>,
}

impl LabelingData {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ScreeningError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ScreeningError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    /// Read a CSV with `record_id`, `labeling_time` and `notes` columns. The
    /// first row wins for repeated ids.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ScreeningError> {
        let (headers, rows) = read_csv(reader)?;
        let position = |name: &'static str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or(ScreeningError::MissingColumn(name))
        };
        let id = position(fields::RECORD_ID)?;
        let time = position(fields::LABELING_TIME)?;
        let notes = position(fields::NOTES)?;

        let mut entries = HashMap::with_capacity(rows.len());
        for row in rows {
            entries
                .entry(row[id].trim().to_string())
                .or_insert_with(|| LabelingEntry {
                    labeling_time: row[time].clone(),
                    notes: row[notes].clone(),
                });
        }
        Ok(Self { entries })
    }

    pub fn get(&self, record_id: &str) -> Option<&LabelingEntry> {
        self.entries.get(record_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, LabelingEntry)> for LabelingData {
    fn from_iter<I: IntoIterator<Item = (String, LabelingEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Headers and rows, with short rows padded to the header width. Rows with
/// more cells than there are headers are rejected.
fn read_csv<R: Read>(reader: R) -> Result<(Vec<String>, Vec<Vec<String>>), ScreeningError> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(ParseError::from)?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = h.trim();
            if i == 0 { h.trim_start_matches('\u{feff}') } else { h }.to_string()
        })
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(ParseError::from)?;
        if record.len() > headers.len() {
            let line = record.position().map_or(0, |p| p.line() as usize);
            return Err(ParseError::at_line(
                line,
                DataFormat::Csv,
                ValueError::Syntax(format!(
                    "row has {} cells for {} columns",
                    record.len(),
                    headers.len()
                )),
            )
            .into());
        }
        let mut row: Vec<String> = record.iter().map(String::from).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }
    Ok((headers, rows))
}

/// `<dir>/<stem>_processed.csv` for an export at `<dir>/<stem>.<ext>`.
pub fn processed_path(export: impl AsRef<Path>) -> PathBuf {
    let export = export.as_ref();
    let stem = export
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    export.with_file_name(format!("{stem}_processed.csv"))
}

/// ISO 639-3 code of the language `text` is written in.
fn detect_language(text: &str) -> Option<&'static str> {
    if text.is_empty() {
        return None;
    }
    whatlang::detect_lang(text).map(|lang| lang.code())
}

/// Apply every enrichment step to `table`. The full-text column is only
/// added when `full_text` is given.
pub fn enrich(
    table: &mut ScreeningTable,
    labeling: Option<&LabelingData>,
    full_text: Option<&dyn FullTextIndex>,
    config: &ScreeningConfig,
) -> Result<(), ScreeningError> {
    let removed = table.retain_languages(config);
    info!(removed, remaining = table.len(), "language filter applied");

    if let Some(index) = full_text {
        info!(rows = table.len(), "checking full-text access");
        let available = table.mark_full_text(index)?;
        info!(available, "full-text check finished");
    }

    table.link_dois(&config.doi_url_prefix);
    table.apply_labels();

    if let Some(labeling) = labeling {
        table.merge_labeling(labeling);
    }
    Ok(())
}

#[cfg(feature = "fulltext")]
fn full_text_index(
    config: &ScreeningConfig,
) -> Result<Option<Box<dyn FullTextIndex>>, ScreeningError> {
    const TIMEOUT_SECS: u64 = 30;

    let Some(url) = config.full_text_url() else {
        return Ok(None);
    };
    let client = crate::fulltext::WorldCatClient::new(url, TIMEOUT_SECS)?;
    Ok(Some(Box::new(client)))
}

#[cfg(not(feature = "fulltext"))]
fn full_text_index(
    config: &ScreeningConfig,
) -> Result<Option<Box<dyn FullTextIndex>>, ScreeningError> {
    if config.full_text_url().is_some() {
        warn!("built without the `fulltext` feature, skipping the full-text check");
    }
    Ok(None)
}

/// Process the export at `export` and write the enriched table next to it.
/// Returns the path written.
pub fn process(
    export: impl AsRef<Path>,
    labeling: Option<&Path>,
    config: &ScreeningConfig,
) -> Result<PathBuf, ScreeningError> {
    let export = export.as_ref();
    let mut table = ScreeningTable::from_path(export)?;
    info!(path = %export.display(), rows = table.len(), "loaded screening export");

    let labeling = labeling.map(LabelingData::from_path).transpose()?;
    let full_text = full_text_index(config)?;
    enrich(&mut table, labeling.as_ref(), full_text.as_deref(), config)?;

    let output = processed_path(export);
    table.write(&output)?;
    info!(path = %output.display(), rows = table.len(), "wrote processed export");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const EXPORT: &str = "\
record_id,title,abstract,doi,language
1,A randomized trial of X,Clearance was measured.,10.1/a,eng
2,Un essai,Résumé,10.1/b,fre
3,Case report,,,
4,Observational study,No PK here,10.1/d,dut
";

    fn config() -> ScreeningConfig {
        ScreeningConfig::default()
    }

    #[test]
    fn test_missing_required_column() {
        let err = ScreeningTable::from_reader("record_id,title\n1,x\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ScreeningError::MissingColumn("abstract")));
    }

    #[test]
    fn test_language_filter_keeps_blank_languages() {
        let mut table = ScreeningTable::from_reader(EXPORT.as_bytes()).unwrap();
        let removed = table.retain_languages(&config());

        assert_eq!(removed, 1);
        let ids: Vec<&str> = (0..table.len())
            .map(|i| table.get(i, "record_id").unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "3", "4"]);
    }

    #[test]
    fn test_blank_language_falls_back_to_original_publication() {
        let mut table = ScreeningTable::from_reader(
            "\
record_id,title,abstract,language,original_publication
1,T,,,The effects of the drug on the children were studied in the hospital over a period of two years.
2,T,,,Les effets du médicament sur les enfants ont été étudiés à l'hôpital pendant une période de deux ans.
3,T,,,Die Wirkung des Arzneimittels auf die Kinder wurde im Krankenhaus über einen Zeitraum von zwei Jahren untersucht.
4,T,,fre,The effects of the drug on the children were studied in the hospital over a period of two years.
5,T,,,
"
            .as_bytes(),
        )
        .unwrap();

        let removed = table.retain_languages(&config());

        assert_eq!(removed, 2);
        let ids: Vec<&str> = (0..table.len())
            .map(|i| table.get(i, "record_id").unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "3", "5"]);
    }

    struct Library(HashMap<&'static str, Availability>);

    impl FullTextIndex for Library {
        fn availability(&self, pubmed_id: &str) -> Result<Availability, SearchError> {
            self.0
                .get(pubmed_id)
                .copied()
                .ok_or_else(|| SearchError::Unavailable("connection refused".to_string()))
        }
    }

    fn library() -> Library {
        Library(HashMap::from([
            ("111", Availability::FullText),
            ("222", Availability::NoAccess),
            ("333", Availability::NotFound),
            ("444", Availability::Unknown),
        ]))
    }

    #[test]
    fn test_full_text_column() {
        let mut table = ScreeningTable::from_reader(
            "record_id,title,abstract,accession_number\n1,T,,111\n2,T,,222\n3,T,,333\n4,T,,444\n5,T,,\n6,T,,999\n"
                .as_bytes(),
        )
        .unwrap();

        let available = table.mark_full_text(&library()).unwrap();

        assert_eq!(available, 1);
        let flags: Vec<&str> = (0..table.len())
            .map(|i| table.get(i, "full-text").unwrap())
            .collect();
        assert_eq!(flags, vec!["1", "0", "0", "0", "0", "0"]);
    }

    #[test]
    fn test_full_text_needs_accession_numbers() {
        let mut table = ScreeningTable::from_reader(EXPORT.as_bytes()).unwrap();
        let err = table.mark_full_text(&library()).unwrap_err();
        assert!(matches!(err, ScreeningError::MissingColumn("accession_number")));
    }

    #[test]
    fn test_enrich_runs_full_text_check_when_given() {
        let mut table = ScreeningTable::from_reader(
            "record_id,title,abstract,accession_number,doi\n1,T,,111,10.1/a\n".as_bytes(),
        )
        .unwrap();
        let library = library();
        enrich(&mut table, None, Some(&library as &dyn FullTextIndex), &config()).unwrap();

        assert_eq!(table.get(0, "full-text"), Some("1"));
        assert_eq!(table.get(0, "doi"), Some("https://www.doi.org/10.1/a"));
        assert_eq!(table.get(0, "evidence"), Some("C"));
    }

    #[test]
    fn test_dois_become_links() {
        let mut table = ScreeningTable::from_reader(EXPORT.as_bytes()).unwrap();
        table.link_dois("https://www.doi.org/");
        assert_eq!(table.get(0, "doi"), Some("https://www.doi.org/10.1/a"));
        assert_eq!(table.get(2, "doi"), Some(""));

        // linking twice does not double the prefix
        table.link_dois("https://www.doi.org/");
        assert_eq!(table.get(0, "doi"), Some("https://www.doi.org/10.1/a"));
    }

    #[test]
    fn test_labels_are_appended() {
        let mut table = ScreeningTable::from_reader(EXPORT.as_bytes()).unwrap();
        table.apply_labels();

        assert_eq!(&table.headers()[5..], &LABEL_COLUMNS.map(String::from));
        assert_eq!(table.get(0, "evidence"), Some("A2"));
        assert_eq!(table.get(0, "keyword for evidence"), Some("randomized"));
        assert_eq!(table.get(0, "PK"), Some("1"));
        assert_eq!(table.get(0, "PK_keyword"), Some("clearance"));
        assert_eq!(table.get(2, "evidence"), Some("C"));
        assert_eq!(table.get(3, "evidence"), Some("B"));
        assert_eq!(table.get(3, "PK"), Some("0"));
        assert_eq!(table.get(3, "PK_keyword"), Some(""));
    }

    #[test]
    fn test_labeling_is_left_joined() {
        let mut table = ScreeningTable::from_reader(EXPORT.as_bytes()).unwrap();
        let labeling = LabelingData::from_reader(
            "record_id,labeling_time,notes\n1,2024-01-01 10:00,relevant\n1,later,dup\n4,2024-01-02,\n"
                .as_bytes(),
        )
        .unwrap();
        table.merge_labeling(&labeling);

        assert_eq!(labeling.len(), 2);
        assert_eq!(table.get(0, "labeling_time"), Some("2024-01-01 10:00"));
        assert_eq!(table.get(0, "notes"), Some("relevant"));
        assert_eq!(table.get(1, "labeling_time"), Some(""));
        assert_eq!(table.get(3, "labeling_time"), Some("2024-01-02"));
    }

    #[test]
    fn test_labeling_needs_columns() {
        let err = LabelingData::from_reader("record_id,notes\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ScreeningError::MissingColumn("labeling_time")));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table =
            ScreeningTable::from_reader("record_id,title,abstract,doi\n1,T\n".as_bytes()).unwrap();
        assert_eq!(table.get(0, "doi"), Some(""));
    }

    #[test]
    fn test_rows_wider_than_header_are_rejected() {
        let err = ScreeningTable::from_reader(
            "record_id,title,abstract\n1,A case report,x\n2,A case report,x,EXTRA\n".as_bytes(),
        )
        .unwrap_err();
        let ScreeningError::Parse(err) = err else {
            panic!("expected a parse error, got {err}");
        };
        assert_eq!(err.line, Some(3));
        assert!(err.to_string().contains("4 cells for 3 columns"));
    }

    #[test]
    fn test_appended_columns_keep_rows_aligned() {
        let mut table =
            ScreeningTable::from_reader("record_id,title,abstract\n1,A case report\n".as_bytes())
                .unwrap();
        table.apply_labels();
        assert_eq!(table.rows()[0].len(), table.headers().len());
        assert_eq!(table.get(0, "evidence"), Some("C"));
    }

    #[test]
    fn test_processed_path() {
        assert_eq!(
            processed_path("/data/export.v2.csv"),
            PathBuf::from("/data/export.v2_processed.csv")
        );
        assert_eq!(processed_path("export.csv"), PathBuf::from("export_processed.csv"));
    }

    #[test]
    fn test_process_writes_enriched_file() {
        let dir = TempDir::new().unwrap();
        let export = dir.path().join("export.csv");
        let labeling = dir.path().join("labeling.csv");
        std::fs::write(&export, EXPORT).unwrap();
        std::fs::write(&labeling, "record_id,labeling_time,notes\n3,t3,n3\n").unwrap();

        let output = process(&export, Some(labeling.as_path()), &config()).unwrap();
        assert_eq!(output, dir.path().join("export_processed.csv"));

        let written = ScreeningTable::from_path(&output).unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(
            written.headers().last().map(String::as_str),
            Some("notes")
        );
        assert_eq!(written.get(1, "notes"), Some("n3"));
        assert_eq!(written.get(0, "doi"), Some("https://www.doi.org/10.1/a"));
    }
}

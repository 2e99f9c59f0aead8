//! CSV-backed tabular source and sink for input rows and results.

use crate::rows::{InputRow, OutputTable, RowResult, SENTINEL_SCORE};
use std::error::Error;
use std::fmt;
use std::path::Path;

/// Header of the mobile reference-image column.
pub const MOBILE_REFERENCE_COLUMN: &str = "Mobile Response Link";
/// Header of the desktop reference-image column.
pub const DESKTOP_REFERENCE_COLUMN: &str = "Desktop Response Link";
/// Header of the website URL column.
pub const WEBSITE_COLUMN: &str = "Website URL";
/// Header of the appended mobile similarity column.
pub const MOBILE_MATCH_COLUMN: &str = "Mobile Match %";
/// Header of the appended desktop similarity column.
pub const DESKTOP_MATCH_COLUMN: &str = "Desktop Match %";

/// Errors surfaced while reading or writing the tabular source.
#[derive(Debug)]
pub enum TableError {
    /// The CSV file could not be read or parsed.
    Csv(csv::Error),
    /// A required column is absent from the header row.
    MissingColumn(&'static str),
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv(err) => write!(f, "csv error: {err}"),
            Self::MissingColumn(name) => write!(f, "input sheet missing column '{name}'"),
        }
    }
}

impl Error for TableError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Csv(err) => Some(err),
            Self::MissingColumn(_) => None,
        }
    }
}

/// An in-memory copy of the external tabular source.
///
/// All original columns are preserved so the write-back replaces the sheet in
/// full, results appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    headers: Vec<String>,
    records: Vec<Vec<String>>,
}

impl Sheet {
    /// Builds a sheet from raw headers and records, used by tests and callers
    /// with non-CSV sources.
    pub fn new(headers: Vec<String>, records: Vec<Vec<String>>) -> Self {
        Self { headers, records }
    }

    /// Reads the full sheet from a CSV file.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let mut reader = csv::Reader::from_path(path).map_err(TableError::Csv)?;
        let headers = reader
            .headers()
            .map_err(TableError::Csv)?
            .iter()
            .map(str::to_string)
            .collect();
        let mut records = Vec::new();
        for record in reader.records() {
            let record = record.map_err(TableError::Csv)?;
            records.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { headers, records })
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the sheet holds no data rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Column headers in sheet order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn column(&self, name: &'static str) -> Result<usize, TableError> {
        self.headers
            .iter()
            .position(|header| header == name)
            .ok_or(TableError::MissingColumn(name))
    }

    /// Extracts the pipeline's input rows, indexes assigned in sheet order.
    pub fn input_rows(&self) -> Result<Vec<InputRow>, TableError> {
        let mobile = self.column(MOBILE_REFERENCE_COLUMN)?;
        let desktop = self.column(DESKTOP_REFERENCE_COLUMN)?;
        let website = self.column(WEBSITE_COLUMN)?;

        let cell = |record: &Vec<String>, col: usize| {
            record.get(col).cloned().unwrap_or_default()
        };

        Ok(self
            .records
            .iter()
            .enumerate()
            .map(|(index, record)| InputRow {
                index,
                mobile_reference: cell(record, mobile),
                desktop_reference: cell(record, desktop),
                website_url: cell(record, website),
            })
            .collect())
    }

    /// Returns a copy of the sheet with the two match columns filled in.
    ///
    /// Existing match columns are overwritten in place; otherwise they are
    /// appended after the original columns. A row without a result keeps the
    /// sentinel, though the coordinator guarantees totality.
    pub fn with_results(&self, results: &OutputTable) -> Sheet {
        let mut headers = self.headers.clone();
        let mobile_col = Self::ensure_column(&mut headers, MOBILE_MATCH_COLUMN);
        let desktop_col = Self::ensure_column(&mut headers, DESKTOP_MATCH_COLUMN);

        let records = self
            .records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let mut record = record.clone();
                record.resize(headers.len(), String::new());
                let result = results
                    .get(index)
                    .copied()
                    .unwrap_or_else(|| RowResult::failed(index));
                record[mobile_col] = format_score(result.mobile_similarity);
                record[desktop_col] = format_score(result.desktop_similarity);
                record
            })
            .collect();

        Sheet { headers, records }
    }

    fn ensure_column(headers: &mut Vec<String>, name: &str) -> usize {
        match headers.iter().position(|header| header == name) {
            Some(col) => col,
            None => {
                headers.push(name.to_string());
                headers.len() - 1
            }
        }
    }

    /// Replaces the file at `path` with the full sheet contents.
    pub fn write_csv_path(&self, path: impl AsRef<Path>) -> Result<(), TableError> {
        let mut writer = csv::Writer::from_path(path).map_err(TableError::Csv)?;
        writer.write_record(&self.headers).map_err(TableError::Csv)?;
        for record in &self.records {
            writer.write_record(record).map_err(TableError::Csv)?;
        }
        writer.flush().map_err(|err| TableError::Csv(err.into()))?;
        Ok(())
    }
}

fn format_score(score: f64) -> String {
    if score == SENTINEL_SCORE {
        "0.00".to_string()
    } else {
        format!("{score:.2}")
    }
}

// Recipient data read from an uploaded spreadsheet (XLSX/ODS via calamine, CSV via csv)
use calamine::{open_workbook_auto, Data, Reader};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{CertError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: HashMap<String, String>,
}

impl Row {
    pub fn get(&self, column: &str) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Roster {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Self::from_csv_reader(std::fs::File::open(path)?),
            "xlsx" | "xlsm" | "xls" | "ods" => Self::from_workbook(path),
            other => Err(CertError::UnsupportedUpload(format!(
                "spreadsheet with extension '{}'",
                other
            ))),
        }
    }

    fn from_workbook(path: &Path) -> Result<Self> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| CertError::Spreadsheet("workbook has no worksheets".to_string()))??;

        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(cells) => cells.iter().map(|c| cell_text(c).trim().to_string()).collect(),
            None => return Ok(Self::default()),
        };

        let records = rows.map(|cells| cells.iter().map(cell_text).collect::<Vec<_>>());
        Ok(Self::from_records(headers, records))
    }

    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut records = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }
        Ok(Self::from_records(headers, records))
    }

    fn from_records<I>(headers: Vec<String>, records: I) -> Self
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let rows = records
            .into_iter()
            .filter(|values| values.iter().any(|v| !v.trim().is_empty()))
            .map(|values| {
                let mut cells = HashMap::with_capacity(headers.len());
                for (header, value) in headers.iter().zip(values) {
                    // A repeated header keeps the value of its first column.
                    if !header.is_empty() {
                        cells.entry(header.clone()).or_insert(value);
                    }
                }
                Row { cells }
            })
            .collect();

        Self { headers, rows }
    }

    /// Fails with every requested column that is not a header.
    pub fn require_columns<S: AsRef<str>>(&self, columns: &[S]) -> Result<()> {
        let missing: Vec<String> = columns
            .iter()
            .map(AsRef::as_ref)
            .filter(|col| !self.headers.iter().any(|h| h == col))
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CertError::MissingColumns(missing))
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => float_text(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) if naive.time() == chrono::NaiveTime::MIN => {
                naive.date().format("%Y-%m-%d").to_string()
            }
            Some(naive) => naive.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => float_text(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

// Spreadsheets store identifiers like NIP as floats; keep them digit-for-digit.
fn float_text(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e21 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

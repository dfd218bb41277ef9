//! Row loading from CSV and JSON files.
//!
//! CSV files must have a header row; each record becomes a keyed row, so
//! column order in the file does not matter. JSON files hold an array whose
//! items are either arrays (positional rows) or objects (keyed rows).

use std::io::Read;
use std::path::Path;

use serde_json::{Map, Value as Json};
use thiserror::Error;
use tracing::debug;

use crate::codec::RawRow;

/// Errors loading rows.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to parse JSON rows: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Column count mismatch in CSV row {row}: expected {expected} columns, found {found}")]
    ColumnCount {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Unsupported input format: {0}")]
    UnknownFormat(String),
}

/// Input file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Json,
}

impl InputFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, InputError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(InputFormat::Csv),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(InputFormat::Json),
            other => Err(InputError::UnknownFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }
}

/// Read CSV rows with a header row.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<RawRow>, InputError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for (idx, result) in csv_reader.records().enumerate() {
        let record = result?;
        if record.len() != headers.len() {
            return Err(InputError::ColumnCount {
                row: idx + 1,
                expected: headers.len(),
                found: record.len(),
            });
        }
        let values: Map<String, Json> = headers
            .iter()
            .zip(record.iter())
            .map(|(name, value)| (name.clone(), Json::String(value.to_string())))
            .collect();
        rows.push(RawRow::Keyed(values));
    }
    debug!("Read {} CSV rows", rows.len());
    Ok(rows)
}

/// Read a JSON array of rows.
pub fn read_json<R: Read>(reader: R) -> Result<Vec<RawRow>, InputError> {
    let rows: Vec<RawRow> = serde_json::from_reader(reader)?;
    debug!("Read {} JSON rows", rows.len());
    Ok(rows)
}

/// Read rows from a file, picking the format from its extension.
pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<RawRow>, InputError> {
    let path = path.as_ref();
    let format = InputFormat::from_path(path)?;
    let file = std::fs::File::open(path)?;
    match format {
        InputFormat::Csv => read_csv(file),
        InputFormat::Json => read_json(file),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_csv() {
        let data = "id,name\n1,alice\n2,\n";
        let rows = read_csv(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        let expected: RawRow = serde_json::from_value(json!({"id": "2", "name": ""})).unwrap();
        assert_eq!(rows[1], expected);
    }

    #[test]
    fn test_read_csv_ragged_row() {
        let data = "id,name\n1\n";
        assert!(read_csv(data.as_bytes()).is_err());
    }

    #[test]
    fn test_read_json_mixed_rows() {
        let data = r#"[[1, "a"], {"id": 2, "name": "b"}]"#;
        let rows = read_json(data.as_bytes()).unwrap();
        assert_eq!(rows[0], RawRow::Positional(vec![json!(1), json!("a")]));
        assert!(matches!(rows[1], RawRow::Keyed(_)));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            InputFormat::from_path(Path::new("rows.CSV")).unwrap(),
            InputFormat::Csv
        );
        assert_eq!(
            InputFormat::from_path(Path::new("rows.json")).unwrap(),
            InputFormat::Json
        );
        assert!(InputFormat::from_path(Path::new("rows.xml")).is_err());
    }
}

//! CSV ingest.
//!
//! Turns a table of already-projected records into observations. Column names
//! are configurable and matched case-insensitively. Ingest is strict: the first
//! unparsable row rejects the file, since a dataset is never built from a
//! partial table.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, info};

use crate::dataset::SpatialDataset;
use crate::domain::{DatasetConfig, Observation};
use crate::error::KrigeError;

/// Which CSV columns hold the coordinates and the value.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvColumns {
    pub x: String,
    pub y: String,
    pub value: String,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self {
            x: "x".into(),
            y: "y".into(),
            value: "value".into(),
        }
    }
}

/// Ingest output: validated dataset plus bookkeeping for the report.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub dataset: SpatialDataset,
    pub rows_read: usize,
}

/// Load a CSV file into a validated [`SpatialDataset`].
///
/// `value_scale` multiplies every value (e.g. [`crate::dataset::KNOTS_TO_MPS`]).
pub fn load_dataset(
    path: &Path,
    columns: &CsvColumns,
    value_scale: f64,
    config: &DatasetConfig,
) -> Result<IngestedData, KrigeError> {
    let file = File::open(path)
        .map_err(|e| KrigeError::Io(format!("failed to open CSV '{}': {e}", path.display())))?;
    let observations = read_observations(file, columns, value_scale)?;
    let rows_read = observations.len();
    let dataset = SpatialDataset::load(observations, config)?;
    info!(
        path = %path.display(),
        rows = rows_read,
        "loaded observations"
    );
    Ok(IngestedData { dataset, rows_read })
}

/// Parse observations from any CSV reader.
pub fn read_observations<R: Read>(
    reader: R,
    columns: &CsvColumns,
    value_scale: f64,
) -> Result<Vec<Observation>, KrigeError> {
    if !(value_scale.is_finite() && value_scale != 0.0) {
        return Err(KrigeError::InvalidConfig(format!(
            "value scale must be finite and non-zero, got {value_scale}"
        )));
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| KrigeError::Data(format!("failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let x_idx = require_column(&header_map, &columns.x)?;
    let y_idx = require_column(&header_map, &columns.y)?;
    let v_idx = require_column(&header_map, &columns.value)?;

    let mut out = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| match e.position() {
            Some(pos) => KrigeError::Data(format!("line {}: CSV parse error: {e}", pos.line())),
            None => KrigeError::Data(format!("CSV parse error: {e}")),
        })?;
        // The reader skips empty lines, so count from the record's own position.
        let line = record.position().map_or(0, |pos| pos.line());
        if record.iter().all(|f| f.is_empty()) {
            debug!(line, "skipping blank row");
            continue;
        }

        let x = parse_field(&record, x_idx, &columns.x, line)?;
        let y = parse_field(&record, y_idx, &columns.y, line)?;
        let v = parse_field(&record, v_idx, &columns.value, line)?;
        out.push(Observation::new(x, y, v * value_scale));
    }

    if out.is_empty() {
        return Err(KrigeError::Data("CSV has no data rows".into()));
    }
    Ok(out)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn require_column(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, KrigeError> {
    header_map
        .get(&normalize_header_name(name))
        .copied()
        .ok_or_else(|| KrigeError::Data(format!("missing required column: `{name}`")))
}

fn parse_field(record: &StringRecord, idx: usize, name: &str, line: u64) -> Result<f64, KrigeError> {
    let raw = record.get(idx).unwrap_or("");
    raw.parse::<f64>()
        .map_err(|_| KrigeError::Data(format!("line {line}: invalid `{name}` value '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_renamed_columns_with_scale() {
        let csv = "\u{feff}Easting,Northing,Wind\n100,200,10\n150,250,20\n";
        let columns = CsvColumns {
            x: "easting".into(),
            y: "northing".into(),
            value: "wind".into(),
        };
        let obs = read_observations(csv.as_bytes(), &columns, 0.5).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[1], Observation::new(150.0, 250.0, 10.0));

        let obs = read_observations(csv.as_bytes(), &columns, crate::dataset::KNOTS_TO_MPS).unwrap();
        assert!((obs[0].value - 5.14444).abs() < 1e-9);
    }

    #[test]
    fn missing_column_is_reported() {
        let csv = "x,y,speed\n1,2,3\n";
        let err = read_observations(csv.as_bytes(), &CsvColumns::default(), 1.0).unwrap_err();
        match err {
            KrigeError::Data(msg) => assert!(msg.contains("`value`"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bad_row_rejects_the_file() {
        let csv = "x,y,value\n1,2,3\n4,oops,6\n";
        let err = read_observations(csv.as_bytes(), &CsvColumns::default(), 1.0).unwrap_err();
        match err {
            KrigeError::Data(msg) => assert!(msg.contains("line 3"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reported_line_accounts_for_empty_lines() {
        let csv = "x,y,value\n1,2,3\n\n4,oops,6\n";
        let err = read_observations(csv.as_bytes(), &CsvColumns::default(), 1.0).unwrap_err();
        match err {
            KrigeError::Data(msg) => assert!(msg.starts_with("line 4:"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn blank_rows_are_skipped_but_empty_tables_fail() {
        let csv = "x,y,value\n1,2,3\n,,\n";
        assert_eq!(read_observations(csv.as_bytes(), &CsvColumns::default(), 1.0).unwrap().len(), 1);
        let err = read_observations("x,y,value\n".as_bytes(), &CsvColumns::default(), 1.0).unwrap_err();
        assert!(matches!(err, KrigeError::Data(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_dataset(
            Path::new("/definitely/not/here.csv"),
            &CsvColumns::default(),
            1.0,
            &DatasetConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, KrigeError::Io(_)));
        assert_eq!(err.exit_code(), 2);
    }
}

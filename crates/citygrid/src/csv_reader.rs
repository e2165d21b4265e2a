use crate::constants::{
    FORMULA_HEADER, ID_HEADER, LATITUDE_HEADER, LONGITUDE_HEADER, NAME_HEADER,
};
use crate::error::{CityGridError, Result};
use crate::fields::FieldDisplayMap;
use crate::layer::DerivedField;

use csv::{ReaderBuilder, StringRecord, Trim};
use std::io::Read;
use std::path::Path;

/// Numeric values of one row, in table column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFields {
    entries: Vec<(String, Option<f64>)>,
}

impl RawFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column value. Keys are expected to be unique per row.
    pub fn push(&mut self, key: impl Into<String>, value: Option<f64>) {
        self.entries.push((key.into(), value));
    }

    /// `None` if the column does not exist, `Some(None)` if the cell is missing.
    pub fn get(&self, key: &str) -> Option<Option<f64>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Option<f64>)> for RawFields {
    fn from_iter<I: IntoIterator<Item = (K, Option<f64>)>>(iter: I) -> Self {
        let mut fields = RawFields::new();
        for (k, v) in iter {
            fields.push(k, v);
        }
        fields
    }
}

/// One sample point of a city table
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub raw_fields: RawFields,
}

/// Point table with its numeric columns resolved at load time
#[derive(Debug, Clone, Default)]
pub struct PointTable {
    /// numeric metric columns (excluding Name/ID/Latitude/Longitude)
    pub numeric_columns: Vec<String>,
    pub records: Vec<PointRecord>,
}

impl PointTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Reads a city point table from a CSV file
///
/// # Errors
/// Returns error if the file cannot be read, a required column is missing,
/// or a coordinate cannot be parsed
pub fn read_point_table<P: AsRef<Path>>(path: P) -> Result<PointTable> {
    let file = std::fs::File::open(path)?;
    read_point_table_from_reader(file)
}

/// Read a point table with at least `Name`, `Latitude`, `Longitude` columns.
/// - A column is numeric when every non-empty cell parses as a number
/// - Empty and NaN cells are kept as missing values
/// - Non-numeric columns are dropped
pub fn read_point_table_from_reader<R: Read>(reader: R) -> Result<PointTable> {
    let mut rdr = csv_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| CityGridError::CsvHeader(format!("Failed to read headers: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let name_idx = find_column(&headers, NAME_HEADER)?;
    let lat_idx = find_column(&headers, LATITUDE_HEADER)?;
    let lon_idx = find_column(&headers, LONGITUDE_HEADER)?;

    // (CSV row number, record)
    let mut rows: Vec<(usize, StringRecord)> = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let rec = result?;
        if rec.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        rows.push((i + 2, rec));
    }

    let metric_idx: Vec<usize> = (0..headers.len())
        .filter(|&idx| ![name_idx, lat_idx, lon_idx].contains(&idx))
        .filter(|&idx| !headers[idx].eq_ignore_ascii_case(ID_HEADER))
        .filter(|&idx| {
            rows.iter()
                .all(|(_, rec)| cell(rec, idx).is_empty() || cell(rec, idx).parse::<f64>().is_ok())
        })
        .collect();

    let numeric_columns: Vec<String> = metric_idx.iter().map(|&idx| headers[idx].clone()).collect();

    let mut records = Vec::with_capacity(rows.len());
    for (row, rec) in &rows {
        let raw_fields = metric_idx
            .iter()
            .map(|&idx| (headers[idx].as_str(), parse_metric(cell(rec, idx))))
            .collect();

        records.push(PointRecord {
            name: cell(rec, name_idx).to_string(),
            latitude: parse_coordinate(rec, lat_idx, LATITUDE_HEADER, *row)?,
            longitude: parse_coordinate(rec, lon_idx, LONGITUDE_HEADER, *row)?,
            raw_fields,
        });
    }

    Ok(PointTable {
        numeric_columns,
        records,
    })
}

/// Reads derived field definitions (`Name,Formula`) from a CSV file
pub fn read_derived_fields<P: AsRef<Path>>(path: P) -> Result<Vec<DerivedField>> {
    let file = std::fs::File::open(path)?;
    read_derived_fields_from_reader(file)
}

/// Rows keep their table order, which is also the evaluation order.
/// Rows without a name are skipped.
pub fn read_derived_fields_from_reader<R: Read>(reader: R) -> Result<Vec<DerivedField>> {
    let mut rdr = csv_reader(reader);
    validate_csv_headers(&mut rdr, [NAME_HEADER, FORMULA_HEADER])?;

    let mut fields = Vec::new();
    for result in rdr.records() {
        let rec = result?;
        let name = cell(&rec, 0);
        if name.is_empty() {
            continue;
        }
        fields.push(DerivedField::new(name, cell(&rec, 1)));
    }
    Ok(fields)
}

/// Reads the display-name dictionary (`ID,Name`) from a CSV file
pub fn read_field_names<P: AsRef<Path>>(path: P) -> Result<FieldDisplayMap> {
    let file = std::fs::File::open(path)?;
    read_field_names_from_reader(file)
}

pub fn read_field_names_from_reader<R: Read>(reader: R) -> Result<FieldDisplayMap> {
    let mut rdr = csv_reader(reader);
    validate_csv_headers(&mut rdr, [ID_HEADER, NAME_HEADER])?;

    let mut map = FieldDisplayMap::new();
    for result in rdr.records() {
        let rec = result?;
        let id = cell(&rec, 0);
        if id.is_empty() {
            continue;
        }
        map.insert(id, cell(&rec, 1));
    }
    Ok(map)
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true) // short rows read as empty cells
        .from_reader(reader)
}

/// Validates the leading headers of a two-column table
fn validate_csv_headers<R: Read>(
    csv_reader: &mut csv::Reader<R>,
    expected: [&str; 2],
) -> Result<()> {
    let headers = csv_reader
        .headers()
        .map_err(|e| CityGridError::CsvHeader(format!("Failed to read headers: {}", e)))?;

    for (idx, name) in expected.iter().enumerate() {
        let found = headers.get(idx).ok_or_else(|| {
            CityGridError::CsvHeader(format!("Missing '{}' column at index {}", name, idx))
        })?;
        if !found.eq_ignore_ascii_case(name) {
            return Err(CityGridError::CsvHeader(format!(
                "Expected '{}' in column {}, found '{}'",
                name, idx, found
            )));
        }
    }
    Ok(())
}

fn find_column(headers: &[String], name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| CityGridError::MissingColumn {
            column: name.to_string(),
        })
}

fn cell(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).map(str::trim).unwrap_or("")
}

fn parse_metric(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| !v.is_nan())
}

fn parse_coordinate(record: &StringRecord, idx: usize, column: &str, row: usize) -> Result<f64> {
    let value = cell(record, idx);
    value
        .parse()
        .map_err(|source| CityGridError::InvalidCoordinate {
            row,
            column: column.to_string(),
            value: value.to_string(),
            source,
        })
}

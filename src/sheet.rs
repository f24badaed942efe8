//! Spreadsheet ingestion.
//!
//! Every upload and static reference file goes through [`Table`]: the first
//! row is the header, each following row a vector of [`Cell`]s. Column lookup
//! is done through [`Table::resolve`], which compares normalized header names
//! so that `Units(lessons) Passed`, `Unitslessons Passed` and
//! `Unitslessons_Passed` all land on the same field.

use std::fmt;
use std::path::Path;

use anyhow::Context;
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::error::ReportError;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Empty cells, blank strings and NaN all count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.is_empty(),
            Cell::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric view of the cell; text is parsed, anything else is `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if !n.is_nan() => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
            _ => None,
        }
    }

    /// Display text used in report cells, `"N/A"` when missing.
    pub fn display_or_na(&self) -> String {
        if self.is_missing() {
            "N/A".to_string()
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Header normalization shared by every ingestion path: trim, drop
/// parentheses, spaces become underscores.
pub fn normalize_column_name(name: &str) -> String {
    name.trim().replace(['(', ')'], "").replace(' ', "_")
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { headers, rows }
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let table = match ext.as_str() {
            "csv" => read_csv(path),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_workbook(path),
            _ => Err(ReportError::Sheet {
                path: path.to_path_buf(),
                reason: format!("unsupported file type '.{ext}'"),
            }
            .into()),
        }?;

        tracing::debug!(
            path = %path.display(),
            columns = table.headers.len(),
            rows = table.rows.len(),
            "spreadsheet loaded"
        );
        Ok(table)
    }

    /// Index of the first header matching any alias, compared after
    /// normalization on both sides.
    pub fn resolve(&self, aliases: &[&str]) -> Option<usize> {
        resolve_column(&self.headers, aliases)
    }

    /// Like [`Table::resolve`] but a miss is a schema error naming the first alias.
    pub fn require(&self, aliases: &[&str], origin: &str) -> Result<usize, ReportError> {
        self.resolve(aliases)
            .ok_or_else(|| ReportError::schema(aliases[0], origin, &self.headers))
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&Cell::Empty)
    }

    /// Rewrites one column in place.
    pub fn map_column(&mut self, col: usize, f: impl Fn(&Cell) -> Cell) {
        for row in self.rows.iter_mut() {
            if let Some(cell) = row.get_mut(col) {
                *cell = f(cell);
            }
        }
    }
}

/// The single place where drifting column names are reconciled. Each alias
/// list names the canonical field first, then the variants seen upstream.
pub fn resolve_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_column_name(h)).collect();
    aliases.iter().find_map(|alias| {
        let wanted = normalize_column_name(alias);
        normalized.iter().position(|h| *h == wanted)
    })
}

fn read_csv(path: &Path) -> anyhow::Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("failed to read headers of {}", path.display()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("bad record in {}", path.display()))?;
        let mut row: Vec<Cell> = record.iter().map(csv_field_to_cell).collect();
        row.resize(headers.len(), Cell::Empty);
        if row.iter().all(Cell::is_missing) {
            continue;
        }
        rows.push(row);
    }

    Ok(Table::new(headers, rows))
}

/// CSV fields stay text so IDs like `007` and comments like `1e3` keep their
/// spelling; [`Cell::as_number`] parses them where a number is needed.
fn csv_field_to_cell(field: &str) -> Cell {
    if field.is_empty() {
        Cell::Empty
    } else {
        Cell::Text(field.to_string())
    }
}

fn read_workbook(path: &Path) -> anyhow::Result<Table> {
    let mut workbook = open_workbook_auto(path).map_err(|e| ReportError::Sheet {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => {
            return Err(ReportError::Sheet {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
            .into())
        }
        None => {
            return Err(ReportError::Sheet {
                path: path.to_path_buf(),
                reason: "workbook has no worksheets".to_string(),
            }
            .into())
        }
    };

    let mut row_iter = range.rows();
    let headers: Vec<String> = match row_iter.next() {
        Some(header_row) => header_row
            .iter()
            .map(|c| data_to_cell(c).to_string().trim().to_string())
            .collect(),
        None => return Ok(Table::default()),
    };

    let mut rows = Vec::new();
    for raw in row_iter {
        let mut row: Vec<Cell> = raw.iter().map(data_to_cell).collect();
        row.resize(headers.len(), Cell::Empty);
        if row.iter().all(Cell::is_missing) {
            continue;
        }
        rows.push(row);
    }

    Ok(Table::new(headers, rows))
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => serial_to_cell(dt.as_f64(), dt.is_duration()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) => Cell::Empty,
    }
}

/// Durations (`Study Time` columns stored as time) become `H:MM:SS` text,
/// however many hours they span. Serials below one day count as durations even
/// without a duration format. Everything else is a calendar datetime.
fn serial_to_cell(serial: f64, is_duration: bool) -> Cell {
    if !serial.is_finite() {
        return Cell::Empty;
    }
    if is_duration || (0.0..1.0).contains(&serial) {
        return duration_text(serial);
    }
    match excel_serial_to_datetime(serial) {
        Some(dt) => Cell::DateTime(dt),
        None => Cell::Empty,
    }
}

fn duration_text(serial: f64) -> Cell {
    let total_secs = (serial.abs() * 86_400.0).round() as i64;
    Cell::Text(format!(
        "{}:{:02}:{:02}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60
    ))
}

pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

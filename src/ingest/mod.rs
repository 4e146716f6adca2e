/// Readers for the CAMELS text formats.
///
/// - `forcing`   : Maurer lumped forcing files (precipitation).
/// - `streamflow`: USGS quality-controlled daily discharge files.
///
/// Both readers produce a `DailySeries` sorted by date. Files are read
/// whole and closed before parsing.

pub mod forcing;
pub mod streamflow;

use chrono::NaiveDate;
use std::fs;
use std::path::Path;

use crate::model::{DailySeries, IngestError};

pub use forcing::{parse_forcing, read_forcing_file};
pub use streamflow::{parse_streamflow, read_streamflow_file};

pub(crate) fn read_text(path: &Path) -> Result<String, IngestError> {
    fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Columns of one whitespace-delimited data row.
pub(crate) struct Row<'a> {
    pub line: usize,
    pub fields: Vec<&'a str>,
}

impl Row<'_> {
    fn malformed(&self, path: &Path, reason: String) -> IngestError {
        IngestError::Malformed {
            path: path.to_path_buf(),
            line: self.line,
            reason,
        }
    }

    pub fn field(&self, path: &Path, index: usize) -> Result<&str, IngestError> {
        self.fields.get(index).copied().ok_or_else(|| {
            self.malformed(
                path,
                format!("expected at least {} columns, found {}", index + 1, self.fields.len()),
            )
        })
    }

    pub fn number(&self, path: &Path, index: usize) -> Result<f64, IngestError> {
        let raw = self.field(path, index)?;
        raw.parse()
            .map_err(|_| self.malformed(path, format!("column {}: '{}' is not a number", index + 1, raw)))
    }

    /// Builds a calendar date from the year, month and day columns.
    pub fn date(&self, path: &Path, year: usize, month: usize, day: usize) -> Result<NaiveDate, IngestError> {
        let y: i32 = self.int(path, year)?;
        let m: u32 = self.int(path, month)?;
        let d: u32 = self.int(path, day)?;
        NaiveDate::from_ymd_opt(y, m, d)
            .ok_or_else(|| self.malformed(path, format!("{}-{:02}-{:02} is not a valid date", y, m, d)))
    }

    fn int<T: std::str::FromStr>(&self, path: &Path, index: usize) -> Result<T, IngestError> {
        let raw = self.field(path, index)?;
        raw.parse()
            .map_err(|_| self.malformed(path, format!("column {}: '{}' is not an integer", index + 1, raw)))
    }
}

/// Splits the body of a file into data rows, skipping `skip_lines` leading
/// lines and blank lines. With `allow_header`, a first row whose year column
/// holds no digit at all is a column-name line and is dropped; anything
/// else, including a mangled year, stays a data row.
pub(crate) fn data_rows(
    text: &str,
    skip_lines: usize,
    year_column: usize,
    allow_header: bool,
) -> Vec<Row<'_>> {
    let mut rows: Vec<Row<'_>> = text
        .lines()
        .enumerate()
        .skip(skip_lines)
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| Row {
            line: i + 1,
            fields: l.split_whitespace().collect(),
        })
        .collect();

    let has_header = allow_header
        && rows
            .first()
            .and_then(|r| r.fields.get(year_column))
            .is_some_and(|f| !f.bytes().any(|b| b.is_ascii_digit()));
    if has_header {
        rows.remove(0);
    }
    rows
}

/// Orders parsed observations by date. For repeated dates the last
/// occurrence in the file wins. Returns the series and the number of
/// duplicates dropped.
pub(crate) fn into_series(mut obs: Vec<(NaiveDate, Option<f64>)>) -> (DailySeries, usize) {
    // Stable sort keeps file order among equal dates.
    obs.sort_by_key(|(date, _)| *date);

    let mut series = DailySeries::new();
    let mut duplicates = 0;
    for (date, value) in obs {
        if series.dates.last() == Some(&date) {
            if let Some(last) = series.values.last_mut() {
                *last = value;
            }
            duplicates += 1;
        } else {
            series.push(date, value);
        }
    }
    (series, duplicates)
}

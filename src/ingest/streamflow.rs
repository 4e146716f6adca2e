/// USGS quality-controlled daily streamflow files.
///
/// Layout (no header):
///
/// ```text
/// 01013500 1980 01 01   655.00 A
/// 01013500 1980 01 02  -999.00 M
/// ```
///
/// Columns are gauge, year, month, day, discharge (cfs) and a quality flag.
/// The `-999` sentinel is kept as a number here; it becomes a missing value
/// in `analysis::normalize`.

use std::path::Path;

use super::{data_rows, into_series, read_text};
use crate::logging::{self, Stage};
use crate::model::{DailySeries, IngestError};

const YEAR_COL: usize = 1;
const MONTH_COL: usize = 2;
const DAY_COL: usize = 3;
const DISCHARGE_COL: usize = 4;

/// Parses streamflow file text into a daily discharge series.
///
/// Returns the series and the number of duplicate dates that were dropped.
pub fn parse_streamflow(text: &str, path: &Path) -> Result<(DailySeries, usize), IngestError> {
    let mut obs = Vec::new();
    for row in data_rows(text, 0, YEAR_COL, false) {
        let date = row.date(path, YEAR_COL, MONTH_COL, DAY_COL)?;
        let discharge = row.number(path, DISCHARGE_COL)?;
        obs.push((date, Some(discharge)));
    }
    if obs.is_empty() {
        return Err(IngestError::Empty(path.to_path_buf()));
    }
    Ok(into_series(obs))
}

pub fn read_streamflow_file(path: &Path) -> Result<DailySeries, IngestError> {
    let text = read_text(path)?;
    let (series, duplicates) = parse_streamflow(&text, path)?;
    if duplicates > 0 {
        logging::warn(
            Stage::Streamflow,
            None,
            &format!("{}: {} duplicate dates, kept last", path.display(), duplicates),
        );
    }
    Ok(series)
}

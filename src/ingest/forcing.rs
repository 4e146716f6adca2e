/// Maurer lumped forcing files.
///
/// Layout:
///
/// ```text
/// 47.23739                      <- gauge latitude
/// 250                           <- mean elevation
/// 2252.7                        <- basin area
/// Year Mnth Day Hr Dayl(s) PRCP(mm/day) SRAD(W/m2) SWE(mm) Tmax(C) Tmin(C) Vp(Pa)
/// 1980 01 01 12 30172.51 0.00 153.40 0.00 -4.19 -15.42 180.88
/// ```
///
/// Only the date and the precipitation column are kept.

use std::path::Path;

use super::{data_rows, into_series, read_text};
use crate::logging::{self, Stage};
use crate::model::{DailySeries, IngestError};

/// Metadata lines before the column header.
pub const HEADER_LINES: usize = 3;

const YEAR_COL: usize = 0;
const MONTH_COL: usize = 1;
const DAY_COL: usize = 2;
const PRCP_COL: usize = 5;

/// Parses forcing file text into a daily precipitation series.
///
/// Returns the series and the number of duplicate dates that were dropped.
pub fn parse_forcing(text: &str, path: &Path) -> Result<(DailySeries, usize), IngestError> {
    let mut obs = Vec::new();
    for row in data_rows(text, HEADER_LINES, YEAR_COL, true) {
        let date = row.date(path, YEAR_COL, MONTH_COL, DAY_COL)?;
        let prcp = row.number(path, PRCP_COL)?;
        obs.push((date, Some(prcp)));
    }
    if obs.is_empty() {
        return Err(IngestError::Empty(path.to_path_buf()));
    }
    Ok(into_series(obs))
}

pub fn read_forcing_file(path: &Path) -> Result<DailySeries, IngestError> {
    let text = read_text(path)?;
    let (series, duplicates) = parse_forcing(&text, path)?;
    if duplicates > 0 {
        logging::warn(
            Stage::Forcing,
            None,
            &format!("{}: {} duplicate dates, kept last", path.display(), duplicates),
        );
    }
    Ok(series)
}

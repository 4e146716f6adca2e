/// Lagged feature table.
///
/// For each day `t` the table holds precipitation and standardized
/// streamflow at `t, t-1, ..., t-5` (P0..P5, Q0..Q5). Lags are taken by
/// position on the joined daily axis. Rows where any of the 12 values is
/// missing are dropped, never imputed.

use chrono::NaiveDate;

use crate::model::{DateWindow, ModelError, MAX_LAG};

/// Number of regression features: P0..P5 and Q1..Q5.
pub const FEATURE_COUNT: usize = 2 * MAX_LAG + 1;

/// One complete row: `precip[n]` is Pn, `flow[n]` is Qn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagRow {
    pub date: NaiveDate,
    pub precip: [f64; MAX_LAG + 1],
    pub flow: [f64; MAX_LAG + 1],
}

impl LagRow {
    /// Regression target, Q0.
    pub fn target(&self) -> f64 {
        self.flow[0]
    }

    /// Every column except Q0.
    pub fn features(&self) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        out[..=MAX_LAG].copy_from_slice(&self.precip);
        out[MAX_LAG + 1..].copy_from_slice(&self.flow[1..]);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LagTable {
    pub rows: Vec<LagRow>,
}

impl LagTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Design matrix and target for the rows inside `window`.
    pub fn window(&self, window: DateWindow) -> (Vec<[f64; FEATURE_COUNT]>, Vec<f64>) {
        self.rows
            .iter()
            .filter(|r| window.contains(r.date))
            .map(|r| (r.features(), r.target()))
            .unzip()
    }
}

/// Gathers `values[i], values[i-1], ..., values[i-MAX_LAG]`, or `None` if
/// any is missing.
fn lagged(values: &[Option<f64>], i: usize) -> Option<[f64; MAX_LAG + 1]> {
    let mut out = [0.0; MAX_LAG + 1];
    for (lag, slot) in out.iter_mut().enumerate() {
        *slot = values[i - lag]?;
    }
    Some(out)
}

/// Builds the lag table for one gauge. All three slices share one axis.
pub fn build_lag_table(
    dates: &[NaiveDate],
    precip: &[Option<f64>],
    flow: &[Option<f64>],
) -> Result<LagTable, ModelError> {
    for len in [precip.len(), flow.len()] {
        if len != dates.len() {
            return Err(ModelError::DimensionMismatch {
                expected: dates.len(),
                got: len,
            });
        }
    }

    let rows: Vec<LagRow> = (MAX_LAG..dates.len())
        .filter_map(|i| {
            Some(LagRow {
                date: dates[i],
                precip: lagged(precip, i)?,
                flow: lagged(flow, i)?,
            })
        })
        .collect();

    if rows.is_empty() {
        return Err(ModelError::InsufficientHistory);
    }
    Ok(LagTable { rows })
}

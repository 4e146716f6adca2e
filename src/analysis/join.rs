/// Date-axis joins across gauges.
///
/// Precipitation and streamflow are joined differently, and the difference
/// decides which dates survive:
///
/// - precipitation uses an inner join: a date is kept only if it appears in
///   the template series and in every gauge's series;
/// - streamflow keeps the template gauge's own axis: every gauge's values
///   are aligned onto it and dates a gauge lacks become missing.
///
/// The template is always the gauge with the smallest code.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::model::{DailySeries, GaugeId};

/// A shared date axis with one value column per gauge.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GaugeFrame {
    pub dates: Vec<NaiveDate>,
    pub columns: BTreeMap<GaugeId, Vec<Option<f64>>>,
}

impl GaugeFrame {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, gauge: &GaugeId) -> Option<&[Option<f64>]> {
        self.columns.get(gauge).map(|c| c.as_slice())
    }

    pub fn column_mut(&mut self, gauge: &GaugeId) -> Option<&mut Vec<Option<f64>>> {
        self.columns.get_mut(gauge)
    }

    /// Values of one gauge re-indexed onto `axis`; dates not in this frame
    /// (or gauges not in it) yield `None`.
    pub fn values_on(&self, gauge: &GaugeId, axis: &[NaiveDate]) -> Vec<Option<f64>> {
        let Some(column) = self.columns.get(gauge) else {
            return vec![None; axis.len()];
        };
        axis.iter()
            .map(|d| {
                self.dates
                    .binary_search(d)
                    .ok()
                    .and_then(|i| column[i])
            })
            .collect()
    }
}

/// Value of a sorted series on `date`: `None` if the date is absent,
/// `Some(None)` if present but missing.
fn lookup(series: &DailySeries, date: &NaiveDate) -> Option<Option<f64>> {
    series
        .dates
        .binary_search(date)
        .ok()
        .map(|i| series.values[i])
}

/// Picks the template series: the one belonging to the smallest gauge code.
pub fn template<'a>(series: &'a [(GaugeId, DailySeries)]) -> Option<&'a (GaugeId, DailySeries)> {
    series.iter().min_by(|a, b| a.0.cmp(&b.0))
}

/// Inner join: keeps the template dates present in every series.
pub fn inner_join(template: &DailySeries, series: &[(GaugeId, DailySeries)]) -> GaugeFrame {
    let dates: Vec<NaiveDate> = template
        .dates
        .iter()
        .filter(|d| series.iter().all(|(_, s)| lookup(s, d).is_some()))
        .copied()
        .collect();

    let columns = series
        .iter()
        .map(|(gauge, s)| {
            let values = dates.iter().map(|d| lookup(s, d).flatten()).collect();
            (gauge.clone(), values)
        })
        .collect();

    GaugeFrame { dates, columns }
}

/// Aligns every series onto the template's axis. Dates outside a series
/// become `None`; dates only a non-template series has are dropped.
pub fn left_join_onto(template: &DailySeries, series: &[(GaugeId, DailySeries)]) -> GaugeFrame {
    let dates = template.dates.clone();

    let columns = series
        .iter()
        .map(|(gauge, s)| {
            let values = dates.iter().map(|d| lookup(s, d).flatten()).collect();
            (gauge.clone(), values)
        })
        .collect();

    GaugeFrame { dates, columns }
}

/// The four-stage regional run.
///
/// 1. resolve gauges, basin areas and file paths (`discovery`),
/// 2. load and join series, clean and scale streamflow (`ingest`, `analysis`),
/// 3. build lag tables and fit each gauge (`analysis::lags`, `analysis::regression`),
/// 4. write scores into the feature table (`table`).
///
/// Input problems abort the run. Modeling problems skip only the affected
/// gauge and are recorded in the report.

use std::collections::BTreeMap;

use crate::analysis::join::{self, GaugeFrame};
use crate::analysis::lags::build_lag_table;
use crate::analysis::normalize::prepare_streamflow;
use crate::analysis::regression::fit_gauge;
use crate::config::RunConfig;
use crate::discovery;
use crate::ingest::{read_forcing_file, read_streamflow_file};
use crate::logging::{self, Stage};
use crate::model::{DailySeries, Gauge, GaugeFit, GaugeId, ModelError, PipelineError};
use crate::report::{self, GaugeOutcome, RunReport};
use crate::table::{self, FeatureTable};

/// Joined inputs for every gauge of the region.
#[derive(Debug, Clone)]
pub struct Assembled {
    /// Precipitation on the intersection of all forcing dates.
    pub precip: GaugeFrame,
    /// Standardized streamflow on the template gauge's axis.
    pub flow: GaugeFrame,
    /// Gauges whose streamflow could not be prepared.
    pub failures: BTreeMap<GaugeId, ModelError>,
    pub sentinels_replaced: usize,
}

// ---------------------------------------------------------------------------
// Stage 2: time-series assembly
// ---------------------------------------------------------------------------

/// Reads both series for every gauge. Any unreadable or malformed file is
/// fatal and names the gauge.
pub fn load_series(
    gauges: &[Gauge],
) -> Result<(Vec<(GaugeId, DailySeries)>, Vec<(GaugeId, DailySeries)>), PipelineError> {
    let mut precip = Vec::with_capacity(gauges.len());
    let mut flow = Vec::with_capacity(gauges.len());

    for gauge in gauges {
        let p = read_forcing_file(&gauge.forcing_path).map_err(|source| PipelineError::Ingest {
            gauge: gauge.id.clone(),
            source,
        })?;
        let q = read_streamflow_file(&gauge.streamflow_path).map_err(|source| {
            PipelineError::Ingest {
                gauge: gauge.id.clone(),
                source,
            }
        })?;
        logging::debug(
            Stage::Forcing,
            Some(&gauge.id),
            &format!("{} precipitation days, {} streamflow days", p.len(), q.len()),
        );
        precip.push((gauge.id.clone(), p));
        flow.push((gauge.id.clone(), q));
    }

    Ok((precip, flow))
}

/// Joins the series and prepares streamflow (sentinel → missing, divide by
/// basin area, standardize) gauge by gauge.
pub fn assemble(
    gauges: &[Gauge],
    precip_series: &[(GaugeId, DailySeries)],
    flow_series: &[(GaugeId, DailySeries)],
    sentinel: f64,
) -> Assembled {
    let precip = match join::template(precip_series) {
        Some((_, template)) => join::inner_join(template, precip_series),
        None => GaugeFrame::default(),
    };
    let mut flow = match join::template(flow_series) {
        Some((_, template)) => join::left_join_onto(template, flow_series),
        None => GaugeFrame::default(),
    };
    logging::info(
        Stage::Streamflow,
        None,
        &format!(
            "Joined axes: {} precipitation days (inner), {} streamflow days (template)",
            precip.len(),
            flow.len()
        ),
    );

    let mut failures = BTreeMap::new();
    let mut sentinels_replaced = 0;
    for gauge in gauges {
        let Some(column) = flow.column_mut(&gauge.id) else {
            continue;
        };
        match prepare_streamflow(column, gauge.basin_area, sentinel) {
            Ok(replaced) => {
                sentinels_replaced += replaced;
                if replaced > 0 {
                    logging::debug(
                        Stage::Streamflow,
                        Some(&gauge.id),
                        &format!("{} missing observations", replaced),
                    );
                }
            }
            Err(err) => {
                failures.insert(gauge.id.clone(), err);
            }
        }
    }

    Assembled {
        precip,
        flow,
        failures,
        sentinels_replaced,
    }
}

// ---------------------------------------------------------------------------
// Stage 3: per-gauge modeling
// ---------------------------------------------------------------------------

/// Fits one gauge on the precipitation axis.
pub fn model_gauge(
    gauge: &GaugeId,
    assembled: &Assembled,
    config: &RunConfig,
) -> Result<GaugeFit, ModelError> {
    if let Some(err) = assembled.failures.get(gauge) {
        return Err(err.clone());
    }
    let dates = &assembled.precip.dates;
    let precip = assembled
        .precip
        .column(gauge)
        .ok_or(ModelError::InsufficientHistory)?;
    let flow = assembled.flow.values_on(gauge, dates);

    let table = build_lag_table(dates, precip, &flow)?;
    let model = &config.settings.model;
    fit_gauge(gauge, &table, model.train_window(), model.test_window())
}

pub fn model_gauges(gauges: &[Gauge], assembled: &Assembled, config: &RunConfig) -> Vec<GaugeOutcome> {
    gauges
        .iter()
        .map(|gauge| match model_gauge(&gauge.id, assembled, config) {
            Ok(fit) => {
                logging::info(
                    Stage::Model,
                    Some(&gauge.id),
                    &format!(
                        "R² = {:.4} (train {} rows, test {} rows)",
                        fit.r_squared, fit.train_rows, fit.test_rows
                    ),
                );
                GaugeOutcome::Scored(fit)
            }
            Err(err) => {
                logging::log_gauge_skipped(&gauge.id, &err);
                GaugeOutcome::Skipped {
                    gauge: gauge.id.clone(),
                    reason: err.to_string(),
                }
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Full run
// ---------------------------------------------------------------------------

/// Stages 1 to 3: everything up to, but not including, the table write.
pub fn analyze(config: &RunConfig) -> Result<RunReport, PipelineError> {
    let gauges = discovery::resolve_gauges(config)?;
    let (precip, flow) = load_series(&gauges)?;
    let assembled = assemble(&gauges, &precip, &flow, config.settings.model.missing_sentinel);
    let outcomes = model_gauges(&gauges, &assembled, config);

    let model = &config.settings.model;
    Ok(RunReport::new(
        &config.region,
        model.train_window(),
        model.test_window(),
        outcomes,
        assembled.sentinels_replaced,
    ))
}

/// Runs the analysis and writes results into an already opened table.
pub fn run_with_table(
    config: &RunConfig,
    table: &mut dyn FeatureTable,
) -> Result<RunReport, PipelineError> {
    let mut report = analyze(config)?;
    let summary = &report.summary;
    logging::log_run_summary(summary.total, summary.scored, summary.skipped);

    if report.summary.scored == 0 {
        finish_report(config, &report)?;
        return Err(PipelineError::NoResults {
            skipped: report.summary.skipped,
        });
    }

    let fits = report.fits();
    report.summary.rows_written = table::write_results(table, &fits, &config.settings.table)?;
    logging::info(
        Stage::Table,
        None,
        &format!(
            "Wrote {} '{}' values",
            report.summary.rows_written, config.settings.table.result_field
        ),
    );

    finish_report(config, &report)?;
    Ok(report)
}

/// Runs the analysis against the configured feature table.
pub fn run(config: &RunConfig) -> Result<RunReport, PipelineError> {
    let mut table = table::open_table(&config.feature_table)?;
    run_with_table(config, table.as_mut())
}

fn finish_report(config: &RunConfig, report: &RunReport) -> Result<(), PipelineError> {
    if !config.settings.logging.write_report {
        return Ok(());
    }
    let path = report::report_path(&config.workspace, &config.region);
    report::write_report(report, &path)?;
    logging::info(
        Stage::System,
        None,
        &format!("Report written to {}", path.display()),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn gauge(code: &str, area: f64) -> Gauge {
        Gauge {
            id: GaugeId::parse(code).unwrap(),
            basin_area: area,
            forcing_path: PathBuf::new(),
            streamflow_path: PathBuf::new(),
        }
    }

    fn series(start: NaiveDate, values: &[f64]) -> DailySeries {
        let mut s = DailySeries::new();
        for (d, v) in start.iter_days().zip(values) {
            s.push(d, Some(*v));
        }
        s
    }

    #[test]
    fn test_assemble_isolates_degenerate_gauge() {
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let gauges = vec![gauge("01000000", 2.0), gauge("02000000", 2.0)];
        let precip = vec![
            (gauges[0].id.clone(), series(start, &[1.0, 2.0, 3.0])),
            (gauges[1].id.clone(), series(start, &[1.0, 2.0, 3.0])),
        ];
        let flow = vec![
            (gauges[0].id.clone(), series(start, &[4.0, -999.0, 8.0])),
            (gauges[1].id.clone(), series(start, &[5.0, 5.0, 5.0])),
        ];

        let assembled = assemble(&gauges, &precip, &flow, -999.0);
        assert_eq!(assembled.sentinels_replaced, 1);
        assert!(assembled.failures.contains_key(&gauges[1].id));
        assert!(!assembled.failures.contains_key(&gauges[0].id));

        let col = assembled.flow.column(&gauges[0].id).unwrap();
        assert!(col[1].is_none());
        // Two present values standardize to ±1/√2.
        let a = col[0].unwrap();
        let b = col[2].unwrap();
        assert!((a + b).abs() < 1e-12);
        assert!((b - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
    }
}

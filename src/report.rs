/// Run report written to the workspace.
///
/// One JSON document per run: which gauges were scored, which were skipped
/// and why, and the windows the scores refer to.

use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{DateWindow, GaugeFit, GaugeId, PipelineError};

// ---------------------------------------------------------------------------
// Report Structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: String,
    pub region: String,
    pub train_window: DateWindow,
    pub test_window: DateWindow,
    pub gauges: Vec<GaugeOutcome>,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum GaugeOutcome {
    Scored(GaugeFit),
    Skipped { gauge: GaugeId, reason: String },
}

impl GaugeOutcome {
    pub fn fit(&self) -> Option<&GaugeFit> {
        match self {
            GaugeOutcome::Scored(fit) => Some(fit),
            GaugeOutcome::Skipped { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub scored: usize,
    pub skipped: usize,
    /// Streamflow observations that carried the missing-data sentinel.
    pub sentinels_replaced: usize,
    pub rows_written: usize,
}

impl RunReport {
    pub fn new(
        region: &str,
        train_window: DateWindow,
        test_window: DateWindow,
        gauges: Vec<GaugeOutcome>,
        sentinels_replaced: usize,
    ) -> Self {
        let scored = gauges.iter().filter(|g| g.fit().is_some()).count();
        let summary = RunSummary {
            total: gauges.len(),
            scored,
            skipped: gauges.len() - scored,
            sentinels_replaced,
            rows_written: 0,
        };
        Self {
            timestamp: Utc::now().to_rfc3339(),
            region: region.to_string(),
            train_window,
            test_window,
            gauges,
            summary,
        }
    }

    pub fn fits(&self) -> Vec<GaugeFit> {
        self.gauges.iter().filter_map(|g| g.fit().cloned()).collect()
    }
}

/// `r_squared_region_<region>.json` inside the workspace.
pub fn report_path(workspace: &Path, region: &str) -> PathBuf {
    workspace.join(format!("r_squared_region_{}.json", region))
}

pub fn write_report(report: &RunReport, path: &Path) -> Result<(), PipelineError> {
    let report_err = |reason: String| PipelineError::Report {
        path: path.to_path_buf(),
        reason,
    };
    let json = serde_json::to_string_pretty(report).map_err(|e| report_err(e.to_string()))?;
    fs::write(path, json).map_err(|e| report_err(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn window() -> DateWindow {
        DateWindow::new(
            NaiveDate::from_ymd_opt(1999, 10, 1).unwrap(),
            NaiveDate::from_ymd_opt(2008, 9, 30).unwrap(),
        )
    }

    fn sample() -> RunReport {
        let scored = GaugeOutcome::Scored(GaugeFit {
            gauge: GaugeId::parse("01013500").unwrap(),
            r_squared: 0.62,
            intercept: 0.01,
            coefficients: vec![0.1; 11],
            train_rows: 3288,
            test_rows: 3652,
        });
        let skipped = GaugeOutcome::Skipped {
            gauge: GaugeId::parse("01022500").unwrap(),
            reason: "training window has no rows".to_string(),
        };
        RunReport::new("01", window(), window(), vec![scored, skipped], 12)
    }

    #[test]
    fn test_summary_counts() {
        let report = sample();
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.scored, 1);
        assert_eq!(report.summary.skipped, 1);
        assert_eq!(report.fits().len(), 1);
    }

    #[test]
    fn test_serialized_outcomes_are_tagged() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["gauges"][0]["status"], "scored");
        assert_eq!(value["gauges"][0]["gauge"], "01013500");
        assert_eq!(value["gauges"][1]["status"], "skipped");
        assert_eq!(value["train_window"]["start"], "1999-10-01");
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = report_path(dir.path(), "01");
        write_report(&sample(), &path).unwrap();
        assert!(path.ends_with("r_squared_region_01.json"));
        assert!(fs::read_to_string(&path).unwrap().contains("\"region\": \"01\""));
    }
}

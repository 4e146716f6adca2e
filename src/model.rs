/// Core data types for the CAMELS regional regression.
///
/// This module defines the shared domain model imported by all other modules:
/// gauge identifiers, daily series, fixed analysis windows, fit results and
/// the error types raised by each pipeline stage.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Discharge value used by the USGS QC files to mark a missing observation.
pub const MISSING_SENTINEL: f64 = -999.0;

/// Number of lagged days used for both precipitation and streamflow.
pub const MAX_LAG: usize = 5;

/// Length of a CAMELS gauge code.
pub const GAUGE_CODE_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Gauge identity
// ---------------------------------------------------------------------------

/// An 8-digit USGS gauge code, e.g. `01013500`.
///
/// Ordering is lexicographic on the code, which for fixed-width digit
/// strings is the same as numeric ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct GaugeId(String);

impl GaugeId {
    /// Parses a gauge code. The code must be exactly 8 ASCII digits.
    pub fn parse(code: &str) -> Result<Self, DiscoveryError> {
        if code.len() != GAUGE_CODE_LEN || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DiscoveryError::InvalidGaugeCode(code.to_string()));
        }
        Ok(GaugeId(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric form of the code, used to match feature table keys.
    /// Leading zeros are dropped: `01013500` → `1013500`.
    pub fn numeric(&self) -> i64 {
        // Always 8 digits, so this cannot overflow or fail.
        self.0.bytes().fold(0i64, |acc, b| acc * 10 + i64::from(b - b'0'))
    }
}

impl fmt::Display for GaugeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A gauge with everything needed to load its series.
#[derive(Debug, Clone, PartialEq)]
pub struct Gauge {
    pub id: GaugeId,
    /// Drainage area from line 3 of the forcing file. Always finite and > 0.
    pub basin_area: f64,
    pub forcing_path: PathBuf,
    pub streamflow_path: PathBuf,
}

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// A daily, date-ordered series. `None` marks a missing observation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DailySeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<Option<f64>>,
}

impl DailySeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, date: NaiveDate, value: Option<f64>) {
        self.dates.push(date);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Analysis windows
// ---------------------------------------------------------------------------

/// An inclusive calendar window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Which of the two fixed windows a row count or error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Train,
    Test,
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowKind::Train => write!(f, "training"),
            WindowKind::Test => write!(f, "testing"),
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of modeling one gauge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeFit {
    pub gauge: GaugeId,
    /// Coefficient of determination on the testing window.
    pub r_squared: f64,
    pub intercept: f64,
    /// Coefficients in feature order P0..P5, Q1..Q5.
    pub coefficients: Vec<f64>,
    pub train_rows: usize,
    pub test_rows: usize,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while enumerating gauges and reading basin areas.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cannot read directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no gauge files found in {}", .0.display())]
    NoGauges(PathBuf),
    #[error("invalid gauge code '{0}': expected 8 digits")]
    InvalidGaugeCode(String),
    #[error("gauge {gauge}: forcing file {} not readable: {source}", path.display())]
    MissingForcing {
        gauge: GaugeId,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("gauge {gauge}: streamflow file {} does not exist", path.display())]
    MissingStreamflow { gauge: GaugeId, path: PathBuf },
    #[error("gauge {gauge}: basin area in {} line 3 is invalid: {reason}", path.display())]
    InvalidBasinArea {
        gauge: GaugeId,
        path: PathBuf,
        reason: String,
    },
}

/// Errors raised while parsing forcing or streamflow files.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} line {line}: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("{} contains no data rows", .0.display())]
    Empty(PathBuf),
}

/// Per-gauge modeling failures. These skip the gauge rather than abort the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("basin area {0} is not a positive finite number")]
    InvalidBasinArea(f64),
    #[error("streamflow has {present} usable values or zero variance; cannot standardize")]
    DegenerateSeries { present: usize },
    #[error("no rows with complete 5-day lag history")]
    InsufficientHistory,
    #[error("{window} window has no rows")]
    EmptyWindow { window: WindowKind },
    #[error("least-squares solve failed: {0}")]
    SolveFailed(String),
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

impl ModelError {
    /// Insufficient-data failures are expected for short or gappy records.
    pub fn is_data_shortage(&self) -> bool {
        matches!(
            self,
            ModelError::DegenerateSeries { .. }
                | ModelError::InsufficientHistory
                | ModelError::EmptyWindow { .. }
        )
    }
}

/// Errors raised by a feature table backend or by result validation.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("cannot read feature table {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("feature table {} is not a GeoJSON FeatureCollection: {reason}", path.display())]
    Format { path: PathBuf, reason: String },
    #[error("field '{0}' already exists in the feature table")]
    FieldExists(String),
    #[error("field '{0}' does not exist in the feature table")]
    UnknownField(String),
    #[error("gauge {gauge}: no feature row has {key_field} = {key}")]
    NoMatchingRow {
        gauge: GaugeId,
        key_field: String,
        key: i64,
    },
    #[error("gauge {gauge}: {count} feature rows have {key_field} = {key}, expected exactly one")]
    AmbiguousMatch {
        gauge: GaugeId,
        key_field: String,
        key: i64,
        count: usize,
    },
    #[error("gauge {gauge}: score {value} is not a finite number")]
    NonFiniteScore { gauge: GaugeId, value: f64 },
    #[error("invalid table identifier '{0}'")]
    InvalidIdentifier(String),
    #[error("database error: {0}")]
    Database(#[from] postgres::Error),
}

/// Top-level error for a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("gauge {gauge}: {source}")]
    Ingest { gauge: GaugeId, source: IngestError },
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("no gauge produced a result ({skipped} skipped)")]
    NoResults { skipped: usize },
    #[error("cannot write report {}: {reason}", path.display())]
    Report { path: PathBuf, reason: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

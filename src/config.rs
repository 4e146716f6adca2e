/// Run configuration.
///
/// A run is described by the five positional parameters (`RunConfig`) plus
/// optional analysis settings read from `camels_regression.toml` in the
/// workspace directory. Every stage receives these explicitly; nothing is
/// stored in process-wide state.

use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::LogLevel;
use crate::model::{DateWindow, PipelineError, MISSING_SENTINEL};

/// Name of the optional settings file inside the workspace.
pub const CONFIG_FILE_NAME: &str = "camels_regression.toml";

// ---------------------------------------------------------------------------
// Feature table location
// ---------------------------------------------------------------------------

/// Where the external feature table lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSource {
    /// A GeoJSON FeatureCollection, edited in place.
    GeoJson(PathBuf),
    /// A PostgreSQL table; `table` may be schema-qualified.
    Postgres { url: String, table: String },
}

impl TableSource {
    /// Interprets the fifth positional parameter.
    ///
    /// `postgres://` and `postgresql://` URLs name the table in the fragment,
    /// e.g. `postgresql://gis@localhost/camels#public.hcdn_nhru`. Anything
    /// else is treated as a GeoJSON file path.
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        if raw.starts_with("postgres://") || raw.starts_with("postgresql://") {
            let (url, table) = raw.split_once('#').ok_or_else(|| {
                PipelineError::Config(format!(
                    "database feature table '{}' must name a table after '#'",
                    raw
                ))
            })?;
            if table.is_empty() {
                return Err(PipelineError::Config(format!(
                    "database feature table '{}' has an empty table name",
                    raw
                )));
            }
            Ok(TableSource::Postgres {
                url: url.to_string(),
                table: table.to_string(),
            })
        } else {
            Ok(TableSource::GeoJson(PathBuf::from(raw)))
        }
    }
}

// ---------------------------------------------------------------------------
// Positional parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Output folder; receives the log file, run report and optional settings.
    pub workspace: PathBuf,
    /// Hydrological region code, e.g. `01`.
    pub region: String,
    /// Root of the per-region Maurer forcing folders.
    pub forcing_root: PathBuf,
    /// Root of the per-region USGS streamflow folders.
    pub streamflow_root: PathBuf,
    pub feature_table: TableSource,
    pub settings: AnalysisConfig,
}

impl RunConfig {
    pub fn forcing_dir(&self) -> PathBuf {
        self.forcing_root.join(&self.region)
    }

    pub fn streamflow_dir(&self) -> PathBuf {
        self.streamflow_root.join(&self.region)
    }
}

// ---------------------------------------------------------------------------
// Settings file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub files: FileSettings,
    pub model: ModelSettings,
    pub table: TableSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    pub forcing_suffix: String,
    pub streamflow_suffix: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            forcing_suffix: "_lump_maurer_forcing_leap.txt".to_string(),
            streamflow_suffix: "_streamflow_qc.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelSettings {
    pub missing_sentinel: f64,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
}

impl Default for ModelSettings {
    fn default() -> Self {
        // Water years 2000-2008 for training, 1990-1999 for testing.
        Self {
            missing_sentinel: MISSING_SENTINEL,
            train_start: ymd(1999, 10, 1),
            train_end: ymd(2008, 9, 30),
            test_start: ymd(1989, 10, 1),
            test_end: ymd(1999, 9, 30),
        }
    }
}

impl ModelSettings {
    pub fn train_window(&self) -> DateWindow {
        DateWindow::new(self.train_start, self.train_end)
    }

    pub fn test_window(&self) -> DateWindow {
        DateWindow::new(self.test_start, self.test_end)
    }
}

/// Builds one of the fixed default window bounds.
fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day)
        .expect("default window bound is a valid calendar date")
}

/// What to do when the result field already exists in the feature table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingField {
    #[default]
    Fail,
    Overwrite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableSettings {
    /// Numeric field holding the gauge id.
    pub key_field: String,
    /// Float field added to receive R².
    pub result_field: String,
    pub on_existing_field: ExistingField,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            key_field: "hru_id".to_string(),
            result_field: "r_squared".to_string(),
            on_existing_field: ExistingField::Fail,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    pub level: LogLevel,
    /// Log file name, relative to the workspace.
    pub file: Option<String>,
    pub timestamps: bool,
    pub write_report: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            timestamps: false,
            write_report: true,
        }
    }
}

impl AnalysisConfig {
    /// Parses settings from TOML text and checks them.
    pub fn from_toml(text: &str) -> Result<Self, PipelineError> {
        let config: AnalysisConfig =
            toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `camels_regression.toml` from the workspace, or defaults if absent.
    pub fn load(workspace: &Path) -> Result<Self, PipelineError> {
        let path = workspace.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let m = &self.model;
        if m.train_start > m.train_end {
            return Err(PipelineError::Config(format!(
                "train_start {} is after train_end {}",
                m.train_start, m.train_end
            )));
        }
        if m.test_start > m.test_end {
            return Err(PipelineError::Config(format!(
                "test_start {} is after test_end {}",
                m.test_start, m.test_end
            )));
        }
        if !m.missing_sentinel.is_finite() {
            return Err(PipelineError::Config(
                "missing_sentinel must be a finite number".to_string(),
            ));
        }
        if self.table.key_field.is_empty() || self.table.result_field.is_empty() {
            return Err(PipelineError::Config(
                "key_field and result_field must not be empty".to_string(),
            ));
        }
        if self.table.key_field == self.table.result_field {
            return Err(PipelineError::Config(format!(
                "result_field '{}' must differ from key_field",
                self.table.result_field
            )));
        }
        Ok(())
    }

    /// Absolute log file path, if file logging is enabled.
    pub fn log_path(&self, workspace: &Path) -> Option<PathBuf> {
        self.logging.file.as_ref().map(|f| workspace.join(f))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Structured logging for the regional regression run
///
/// Provides context-rich logging with pipeline stage and gauge identifiers,
/// timestamps, and severity levels. Supports console output and an
/// append-only log file in the workspace.

use chrono::Utc;
use serde::Deserialize;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::model::{GaugeId, ModelError};

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovery,
    Forcing,
    Streamflow,
    Model,
    Table,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Discovery => write!(f, "DISC"),
            Stage::Forcing => write!(f, "FORC"),
            Stage::Streamflow => write!(f, "FLOW"),
            Stage::Model => write!(f, "MODEL"),
            Stage::Table => write!(f, "TABLE"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - short, gappy or flat record for this gauge
    Expected,
    /// Unexpected failure - numerical problem worth investigating
    Unexpected,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<PathBuf>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<PathBuf>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, stage: Stage, gauge: Option<&GaugeId>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let gauge_part = gauge.map(|g| format!(" [{}]", g)).unwrap_or_default();
        let log_entry = format_entry(&timestamp.to_string(), level, stage, gauge, message);

        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warn => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", stage, gauge_part, message),
                LogLevel::Warn => eprintln!("   ⚠ {}{}: {}", stage, gauge_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", stage, gauge_part, message),
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path.display(), e);
            }
        }
    }

    fn append_to_file(path: &PathBuf, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

/// One log line: `<timestamp> <LEVEL> <STAGE> [gauge]: message`.
fn format_entry(
    timestamp: &str,
    level: LogLevel,
    stage: Stage,
    gauge: Option<&GaugeId>,
    message: &str,
) -> String {
    let gauge_part = gauge.map(|g| format!(" [{}]", g)).unwrap_or_default();
    format!("{} {} {}{}: {}", timestamp, level, stage, gauge_part, message)
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<PathBuf>, console_timestamps: bool) {
    Logger::init(min_level, log_file, console_timestamps);
}

fn emit(level: LogLevel, stage: Stage, gauge: Option<&GaugeId>, message: &str) {
    if let Ok(slot) = LOGGER.lock() {
        if let Some(logger) = slot.as_ref() {
            logger.log(level, stage, gauge, message);
        }
    }
}

pub fn info(stage: Stage, gauge: Option<&GaugeId>, message: &str) {
    emit(LogLevel::Info, stage, gauge, message);
}

pub fn warn(stage: Stage, gauge: Option<&GaugeId>, message: &str) {
    emit(LogLevel::Warn, stage, gauge, message);
}

pub fn error(stage: Stage, gauge: Option<&GaugeId>, message: &str) {
    emit(LogLevel::Error, stage, gauge, message);
}

pub fn debug(stage: Stage, gauge: Option<&GaugeId>, message: &str) {
    emit(LogLevel::Debug, stage, gauge, message);
}

// ---------------------------------------------------------------------------
// Gauge Failure Logging
// ---------------------------------------------------------------------------

pub fn classify_model_failure(err: &ModelError) -> FailureType {
    if err.is_data_shortage() {
        FailureType::Expected
    } else {
        FailureType::Unexpected
    }
}

/// Log a skipped gauge with its classified reason
pub fn log_gauge_skipped(gauge: &GaugeId, err: &ModelError) {
    let failure_type = classify_model_failure(err);
    let message = format!("skipped [{}]: {}", failure_type, err);

    match failure_type {
        FailureType::Expected => warn(Stage::Model, Some(gauge), &message),
        FailureType::Unexpected => error(Stage::Model, Some(gauge), &message),
    }
}

/// Log a summary of the modeling pass
pub fn log_run_summary(total: usize, scored: usize, skipped: usize) {
    let message = format!(
        "Regression complete: {}/{} gauges scored, {} skipped",
        scored, total, skipped
    );

    if skipped == 0 {
        info(Stage::System, None, &message);
    } else if scored == 0 {
        error(Stage::System, None, &message);
    } else {
        warn(Stage::System, None, &message);
    }
}

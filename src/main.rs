use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use camels_regression::config::{AnalysisConfig, RunConfig, TableSource};
use camels_regression::logging::{self, Stage};
use camels_regression::model::PipelineError;
use camels_regression::pipeline;

#[derive(Parser)]
#[command(
    name = "camels_regression",
    version,
    about = "Score lagged linear streamflow models for every CAMELS gauge in a region"
)]
struct Cli {
    /// Output folder (log file, run report, optional camels_regression.toml)
    workspace: PathBuf,
    /// Hydrological region code, e.g. 01
    region: String,
    /// Folder holding the per-region Maurer forcing folders
    maurer: PathBuf,
    /// Folder holding the per-region USGS streamflow folders
    usgs_streamflow: PathBuf,
    /// GeoJSON feature table, or postgresql://...#[schema.]table
    feature_table: String,
}

fn build_config(cli: Cli) -> Result<RunConfig, PipelineError> {
    let settings = AnalysisConfig::load(&cli.workspace)?;
    let feature_table = TableSource::parse(&cli.feature_table)?;
    Ok(RunConfig {
        workspace: cli.workspace,
        region: cli.region,
        forcing_root: cli.maurer,
        streamflow_root: cli.usgs_streamflow,
        feature_table,
        settings,
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match build_config(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("camels_regression: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let log = &config.settings.logging;
    logging::init_logger(log.level, config.settings.log_path(&config.workspace), log.timestamps);
    logging::info(
        Stage::System,
        None,
        &format!("Region {}: starting regression run", config.region),
    );

    match pipeline::run(&config) {
        Ok(report) => {
            logging::info(
                Stage::System,
                None,
                &format!(
                    "Done: {} gauges scored, {} skipped, {} rows written",
                    report.summary.scored, report.summary.skipped, report.summary.rows_written
                ),
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            logging::error(Stage::System, None, &e.to_string());
            ExitCode::FAILURE
        }
    }
}

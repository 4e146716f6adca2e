/// Gauge and file discovery for one CAMELS region.
///
/// The gauge set is defined by the streamflow folder: every file there
/// contributes the gauge code in its first 8 characters. Each gauge must
/// also have a forcing file, whose third line holds the basin area.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::RunConfig;
use crate::logging::{self, Stage};
use crate::model::{DiscoveryError, Gauge, GaugeId, GAUGE_CODE_LEN};

// ---------------------------------------------------------------------------
// Gauge enumeration
// ---------------------------------------------------------------------------

/// Lists the gauges in a region's streamflow folder, sorted by code.
///
/// Hidden files and subdirectories are ignored. Every remaining file name
/// must start with an 8-digit gauge code.
pub fn discover_gauges(streamflow_dir: &Path) -> Result<Vec<GaugeId>, DiscoveryError> {
    let read_dir_err = |source| DiscoveryError::ReadDir {
        path: streamflow_dir.to_path_buf(),
        source,
    };

    let mut gauges = BTreeSet::new();
    for entry in fs::read_dir(streamflow_dir).map_err(read_dir_err)? {
        let entry = entry.map_err(read_dir_err)?;
        if !entry.file_type().map_err(read_dir_err)?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let code = name.get(..GAUGE_CODE_LEN).unwrap_or(&name);
        gauges.insert(GaugeId::parse(code)?);
    }

    if gauges.is_empty() {
        return Err(DiscoveryError::NoGauges(streamflow_dir.to_path_buf()));
    }
    Ok(gauges.into_iter().collect())
}

pub fn forcing_path(forcing_dir: &Path, gauge: &GaugeId, suffix: &str) -> PathBuf {
    forcing_dir.join(format!("{}{}", gauge, suffix))
}

pub fn streamflow_path(streamflow_dir: &Path, gauge: &GaugeId, suffix: &str) -> PathBuf {
    streamflow_dir.join(format!("{}{}", gauge, suffix))
}

// ---------------------------------------------------------------------------
// Basin area
// ---------------------------------------------------------------------------

/// Parses the basin-area literal from a forcing file header.
///
/// Only a plain decimal or scientific-notation number is accepted; the area
/// must be finite and strictly positive.
pub fn parse_basin_area(line: &str) -> Result<f64, String> {
    let literal = line.trim();
    if literal.is_empty() {
        return Err("line is empty".to_string());
    }
    let area: f64 = literal
        .parse()
        .map_err(|_| format!("'{}' is not a number", literal))?;
    if !area.is_finite() {
        return Err(format!("'{}' is not finite", literal));
    }
    if area <= 0.0 {
        return Err(format!("area {} must be greater than zero", area));
    }
    Ok(area)
}

/// Reads line 3 of a gauge's forcing file as its basin area.
pub fn read_basin_area(gauge: &GaugeId, path: &Path) -> Result<f64, DiscoveryError> {
    let text = fs::read_to_string(path).map_err(|source| DiscoveryError::MissingForcing {
        gauge: gauge.clone(),
        path: path.to_path_buf(),
        source,
    })?;

    let invalid = |reason: String| DiscoveryError::InvalidBasinArea {
        gauge: gauge.clone(),
        path: path.to_path_buf(),
        reason,
    };

    let line = text
        .lines()
        .nth(2)
        .ok_or_else(|| invalid("file has fewer than 3 lines".to_string()))?;
    parse_basin_area(line).map_err(invalid)
}

// ---------------------------------------------------------------------------
// Region resolution
// ---------------------------------------------------------------------------

/// Resolves every gauge of the configured region with its basin area and
/// file paths. Any missing or malformed input aborts the run.
pub fn resolve_gauges(config: &RunConfig) -> Result<Vec<Gauge>, DiscoveryError> {
    let forcing_dir = config.forcing_dir();
    let streamflow_dir = config.streamflow_dir();
    let files = &config.settings.files;

    let ids = discover_gauges(&streamflow_dir)?;
    logging::info(
        Stage::Discovery,
        None,
        &format!(
            "Region {}: {} gauges in {}",
            config.region,
            ids.len(),
            streamflow_dir.display()
        ),
    );

    let mut gauges = Vec::with_capacity(ids.len());
    for id in ids {
        let forcing = forcing_path(&forcing_dir, &id, &files.forcing_suffix);
        let streamflow = streamflow_path(&streamflow_dir, &id, &files.streamflow_suffix);
        if !streamflow.is_file() {
            return Err(DiscoveryError::MissingStreamflow {
                gauge: id,
                path: streamflow,
            });
        }

        let basin_area = read_basin_area(&id, &forcing)?;
        logging::debug(
            Stage::Discovery,
            Some(&id),
            &format!("basin area {}", basin_area),
        );

        gauges.push(Gauge {
            id,
            basin_area,
            forcing_path: forcing,
            streamflow_path: streamflow,
        });
    }

    Ok(gauges)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

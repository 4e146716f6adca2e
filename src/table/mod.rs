/// External feature table access.
///
/// The regression results land in a geospatial attribute table that this
/// crate does not own. Two backends implement `FeatureTable`:
///
/// - `geojson::GeoJsonTable`  : a FeatureCollection file, edited in place;
/// - `database::PostgresTable`: a PostgreSQL / PostGIS table.
///
/// `write_results` checks every gauge against the table before touching it,
/// so a missing or duplicated key never leaves a half-written field.

pub mod geojson;
pub mod database;

use crate::config::{ExistingField, TableSettings, TableSource};
use crate::logging::{self, Stage};
use crate::model::{GaugeFit, TableError};

pub use self::geojson::GeoJsonTable;
pub use self::database::PostgresTable;

/// Row-level access to an attribute table keyed by a numeric field.
pub trait FeatureTable {
    /// Returns `true` if the table already has a field called `name`.
    fn has_field(&mut self, name: &str) -> Result<bool, TableError>;

    /// Adds a floating-point field. Errors with `FieldExists` if present.
    fn add_float_field(&mut self, name: &str) -> Result<(), TableError>;

    /// Number of rows whose `key_field` equals `key`.
    fn count_matching(&mut self, key_field: &str, key: i64) -> Result<usize, TableError>;

    /// Sets `field` on every row whose `key_field` equals `key`; returns the
    /// number of rows updated.
    fn set_float(
        &mut self,
        key_field: &str,
        key: i64,
        field: &str,
        value: f64,
    ) -> Result<usize, TableError>;

    /// Persists pending changes.
    fn flush(&mut self) -> Result<(), TableError>;
}

/// Opens the backend named by the fifth positional parameter.
pub fn open_table(source: &TableSource) -> Result<Box<dyn FeatureTable>, TableError> {
    match source {
        TableSource::GeoJson(path) => Ok(Box::new(GeoJsonTable::open(path)?)),
        TableSource::Postgres { url, table } => Ok(Box::new(PostgresTable::connect(url, table)?)),
    }
}

/// Confirms that every fit has a finite score and matches exactly one row.
pub fn validate_matches(
    table: &mut dyn FeatureTable,
    fits: &[GaugeFit],
    key_field: &str,
) -> Result<(), TableError> {
    for fit in fits {
        if !fit.r_squared.is_finite() {
            return Err(TableError::NonFiniteScore {
                gauge: fit.gauge.clone(),
                value: fit.r_squared,
            });
        }
        let key = fit.gauge.numeric();
        match table.count_matching(key_field, key)? {
            1 => {}
            0 => {
                return Err(TableError::NoMatchingRow {
                    gauge: fit.gauge.clone(),
                    key_field: key_field.to_string(),
                    key,
                })
            }
            count => {
                return Err(TableError::AmbiguousMatch {
                    gauge: fit.gauge.clone(),
                    key_field: key_field.to_string(),
                    key,
                    count,
                })
            }
        }
    }
    Ok(())
}

/// Adds the result field and writes one score per gauge.
///
/// Validation (field collision, finite scores, one row per gauge) happens
/// before any mutation. Returns the number of rows written.
pub fn write_results(
    table: &mut dyn FeatureTable,
    fits: &[GaugeFit],
    settings: &TableSettings,
) -> Result<usize, TableError> {
    let field = settings.result_field.as_str();
    let key_field = settings.key_field.as_str();

    let exists = table.has_field(field)?;
    if exists && settings.on_existing_field == ExistingField::Fail {
        return Err(TableError::FieldExists(field.to_string()));
    }

    validate_matches(table, fits, key_field)?;

    if exists {
        logging::warn(
            Stage::Table,
            None,
            &format!("field '{}' exists, overwriting matched rows", field),
        );
    } else {
        table.add_float_field(field)?;
        logging::info(Stage::Table, None, &format!("added field '{}'", field));
    }

    let mut written = 0;
    for fit in fits {
        written += table.set_float(key_field, fit.gauge.numeric(), field, fit.r_squared)?;
        logging::debug(
            Stage::Table,
            Some(&fit.gauge),
            &format!("{} = {:.4}", field, fit.r_squared),
        );
    }
    table.flush()?;

    Ok(written)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GaugeId;
    use std::collections::BTreeMap;

    /// In-memory table: rows of (key, fields).
    #[derive(Default)]
    struct MemoryTable {
        fields: Vec<String>,
        rows: Vec<(i64, BTreeMap<String, f64>)>,
        flushed: bool,
    }

    impl FeatureTable for MemoryTable {
        fn has_field(&mut self, name: &str) -> Result<bool, TableError> {
            Ok(self.fields.iter().any(|f| f == name))
        }

        fn add_float_field(&mut self, name: &str) -> Result<(), TableError> {
            if self.has_field(name)? {
                return Err(TableError::FieldExists(name.to_string()));
            }
            self.fields.push(name.to_string());
            Ok(())
        }

        fn count_matching(&mut self, _key_field: &str, key: i64) -> Result<usize, TableError> {
            Ok(self.rows.iter().filter(|(k, _)| *k == key).count())
        }

        fn set_float(
            &mut self,
            _key_field: &str,
            key: i64,
            field: &str,
            value: f64,
        ) -> Result<usize, TableError> {
            let mut n = 0;
            for (_, values) in self.rows.iter_mut().filter(|(k, _)| *k == key) {
                values.insert(field.to_string(), value);
                n += 1;
            }
            Ok(n)
        }

        fn flush(&mut self) -> Result<(), TableError> {
            self.flushed = true;
            Ok(())
        }
    }

    fn fit(code: &str, r2: f64) -> GaugeFit {
        GaugeFit {
            gauge: GaugeId::parse(code).unwrap(),
            r_squared: r2,
            intercept: 0.0,
            coefficients: vec![],
            train_rows: 1,
            test_rows: 1,
        }
    }

    fn table_with_keys(keys: &[i64]) -> MemoryTable {
        MemoryTable {
            fields: vec!["hru_id".to_string()],
            rows: keys.iter().map(|k| (*k, BTreeMap::new())).collect(),
            flushed: false,
        }
    }

    #[test]
    fn test_writes_each_score_once() {
        let mut table = table_with_keys(&[1013500, 1022500]);
        let fits = vec![fit("01013500", 0.81), fit("01022500", -0.2)];

        let written = write_results(&mut table, &fits, &TableSettings::default()).unwrap();
        assert_eq!(written, 2);
        assert!(table.flushed);
        assert_eq!(table.rows[0].1["r_squared"], 0.81);
        assert_eq!(table.rows[1].1["r_squared"], -0.2);
    }

    #[test]
    fn test_missing_row_fails_before_any_change() {
        let mut table = table_with_keys(&[1013500]);
        let fits = vec![fit("01013500", 0.5), fit("01022500", 0.6)];

        let err = write_results(&mut table, &fits, &TableSettings::default()).unwrap_err();
        assert!(matches!(err, TableError::NoMatchingRow { key: 1022500, .. }));
        assert!(!table.fields.contains(&"r_squared".to_string()));
        assert!(table.rows[0].1.is_empty());
    }

    #[test]
    fn test_duplicate_rows_are_ambiguous() {
        let mut table = table_with_keys(&[1013500, 1013500]);
        let err = write_results(&mut table, &[fit("01013500", 0.5)], &TableSettings::default())
            .unwrap_err();
        assert!(matches!(err, TableError::AmbiguousMatch { count: 2, .. }));
    }

    #[test]
    fn test_non_finite_score_fails_before_any_change() {
        let mut table = table_with_keys(&[1013500, 1022500]);
        let fits = vec![fit("01013500", 0.5), fit("01022500", f64::NAN)];

        let err = write_results(&mut table, &fits, &TableSettings::default()).unwrap_err();
        match err {
            TableError::NonFiniteScore { gauge, .. } => assert_eq!(gauge.as_str(), "01022500"),
            other => panic!("unexpected error: {}", other),
        }
        assert!(!table.fields.contains(&"r_squared".to_string()));
        assert!(table.rows.iter().all(|(_, values)| values.is_empty()));
    }

    #[test]
    fn test_existing_field_policy() {
        let mut table = table_with_keys(&[1013500]);
        table.fields.push("r_squared".to_string());
        let fits = vec![fit("01013500", 0.5)];

        let err = write_results(&mut table, &fits, &TableSettings::default()).unwrap_err();
        assert!(matches!(err, TableError::FieldExists(_)));

        let overwrite = TableSettings {
            on_existing_field: ExistingField::Overwrite,
            ..TableSettings::default()
        };
        assert_eq!(write_results(&mut table, &fits, &overwrite).unwrap(), 1);
        assert_eq!(table.rows[0].1["r_squared"], 0.5);
    }
}

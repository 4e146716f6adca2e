/// GeoJSON FeatureCollection attribute table.
///
/// Attributes live in each feature's `properties` object. Geometry, ids and
/// foreign members are carried through untouched; the file is rewritten only
/// on `flush`, via a sibling temporary file and a rename.

use geojson::{FeatureCollection, GeoJson};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::FeatureTable;
use crate::model::TableError;

pub struct GeoJsonTable {
    path: PathBuf,
    collection: FeatureCollection,
    dirty: bool,
}

impl GeoJsonTable {
    pub fn open(path: &Path) -> Result<Self, TableError> {
        let text = fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    /// Parses GeoJSON text that must hold a FeatureCollection.
    pub fn parse(path: &Path, text: &str) -> Result<Self, TableError> {
        let format_err = |reason: String| TableError::Format {
            path: path.to_path_buf(),
            reason,
        };
        let geojson: GeoJson = text.parse().map_err(|e: geojson::Error| format_err(e.to_string()))?;
        let collection =
            FeatureCollection::try_from(geojson).map_err(|e| format_err(e.to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            collection,
            dirty: false,
        })
    }
}

/// A key matches when it is a JSON number equal to `key`. Integral floats
/// such as `1013500.0` match as well.
fn key_matches(value: Option<&Value>, key: i64) -> bool {
    match value {
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => i == key,
            None => n.as_f64().is_some_and(|f| f == key as f64),
        },
        _ => false,
    }
}

impl FeatureTable for GeoJsonTable {
    fn has_field(&mut self, name: &str) -> Result<bool, TableError> {
        Ok(self.collection.features.iter().any(|f| f.contains_property(name)))
    }

    fn add_float_field(&mut self, name: &str) -> Result<(), TableError> {
        if self.has_field(name)? {
            return Err(TableError::FieldExists(name.to_string()));
        }
        for feature in self.collection.features.iter_mut() {
            feature.set_property(name, Value::Null);
        }
        self.dirty = true;
        Ok(())
    }

    fn count_matching(&mut self, key_field: &str, key: i64) -> Result<usize, TableError> {
        Ok(self
            .collection
            .features
            .iter()
            .filter(|f| key_matches(f.property(key_field), key))
            .count())
    }

    fn set_float(
        &mut self,
        key_field: &str,
        key: i64,
        field: &str,
        value: f64,
    ) -> Result<usize, TableError> {
        if !self.has_field(field)? {
            return Err(TableError::UnknownField(field.to_string()));
        }
        let mut updated = 0;
        for feature in self.collection.features.iter_mut() {
            if key_matches(feature.property(key_field), key) {
                feature.set_property(field, value);
                updated += 1;
            }
        }
        if updated > 0 {
            self.dirty = true;
        }
        Ok(updated)
    }

    fn flush(&mut self) -> Result<(), TableError> {
        if !self.dirty {
            return Ok(());
        }
        let io_err = |source| TableError::Io {
            path: self.path.clone(),
            source,
        };
        let text = GeoJson::FeatureCollection(self.collection.clone()).to_string();

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, text).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;

        self.dirty = false;
        Ok(())
    }
}

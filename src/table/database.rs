/// PostgreSQL / PostGIS feature table.
///
/// The table is addressed as `[schema.]table`. Identifiers are validated and
/// double-quoted before being spliced into SQL; values always travel as
/// bind parameters. Each update is its own statement (autocommit), so a
/// failure part-way leaves earlier gauges written.

use postgres::{Client, NoTls};

use super::FeatureTable;
use crate::model::TableError;

pub struct PostgresTable {
    client: Client,
    schema: Option<String>,
    table: String,
}

/// Accepts `[A-Za-z_][A-Za-z0-9_]*`.
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn quote(ident: &str) -> Result<String, TableError> {
    if !is_identifier(ident) {
        return Err(TableError::InvalidIdentifier(ident.to_string()));
    }
    Ok(format!("\"{}\"", ident))
}

/// Splits `schema.table` into its parts.
fn split_table_name(name: &str) -> Result<(Option<String>, String), TableError> {
    match name.split_once('.') {
        Some((schema, table)) => {
            quote(schema)?;
            quote(table)?;
            Ok((Some(schema.to_string()), table.to_string()))
        }
        None => {
            quote(name)?;
            Ok((None, name.to_string()))
        }
    }
}

impl PostgresTable {
    pub fn connect(url: &str, table: &str) -> Result<Self, TableError> {
        let (schema, table) = split_table_name(table)?;
        let client = Client::connect(url, NoTls)?;
        Ok(Self {
            client,
            schema,
            table,
        })
    }

    /// Fully quoted table reference for SQL text.
    fn qualified(&self) -> Result<String, TableError> {
        match &self.schema {
            Some(schema) => Ok(format!("{}.{}", quote(schema)?, quote(&self.table)?)),
            None => quote(&self.table),
        }
    }
}

impl FeatureTable for PostgresTable {
    fn has_field(&mut self, name: &str) -> Result<bool, TableError> {
        let row = self.client.query_one(
            "SELECT COUNT(*) FROM information_schema.columns
             WHERE table_schema::text = COALESCE($1::text, current_schema()::text)
               AND table_name::text = $2::text
               AND column_name::text = $3::text",
            &[&self.schema, &self.table, &name],
        )?;
        let count: i64 = row.get(0);
        Ok(count > 0)
    }

    fn add_float_field(&mut self, name: &str) -> Result<(), TableError> {
        if self.has_field(name)? {
            return Err(TableError::FieldExists(name.to_string()));
        }
        let sql = format!("ALTER TABLE {} ADD COLUMN {} REAL", self.qualified()?, quote(name)?);
        self.client.batch_execute(&sql)?;
        Ok(())
    }

    fn count_matching(&mut self, key_field: &str, key: i64) -> Result<usize, TableError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {}::bigint = $1",
            self.qualified()?,
            quote(key_field)?
        );
        let row = self.client.query_one(&sql, &[&key])?;
        let count: i64 = row.get(0);
        Ok(count as usize)
    }

    fn set_float(
        &mut self,
        key_field: &str,
        key: i64,
        field: &str,
        value: f64,
    ) -> Result<usize, TableError> {
        let sql = format!(
            "UPDATE {} SET {} = $1::real WHERE {}::bigint = $2",
            self.qualified()?,
            quote(field)?,
            quote(key_field)?
        );
        // REAL column: single precision, like a shapefile FLOAT field.
        let updated = self.client.execute(&sql, &[&(value as f32), &key])?;
        Ok(updated as usize)
    }

    fn flush(&mut self) -> Result<(), TableError> {
        Ok(())
    }
}

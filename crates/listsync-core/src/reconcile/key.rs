//! Primary-key construction

use std::collections::BTreeMap;

use super::numeric::{strip_integral_suffix, NumericProfile};
use crate::error::{Error, Result};
use crate::models::{KeyedTable, Record, Table};

/// Separator placed between key column values.
pub const KEY_SEPARATOR: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyColumn {
    name: String,
    profile: NumericProfile,
}

/// Builds composite string keys from an ordered list of key columns.
///
/// The `.0` stripping decision is made per column over every table the
/// builder has observed, so one builder must be used for both sides of a
/// comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBuilder {
    columns: Vec<KeyColumn>,
}

impl KeyBuilder {
    pub fn new<S: AsRef<str>>(key_columns: &[S]) -> Result<Self> {
        if key_columns.is_empty() {
            return Err(Error::validation("at least one key column is required"));
        }

        let mut columns: Vec<KeyColumn> = Vec::with_capacity(key_columns.len());
        for column in key_columns {
            let name = column.as_ref().trim();
            if name.is_empty() {
                return Err(Error::validation("key column names must not be empty"));
            }
            if columns.iter().any(|existing| existing.name == name) {
                return Err(Error::validation(format!(
                    "key column '{name}' is listed more than once"
                )));
            }
            columns.push(KeyColumn {
                name: name.to_string(),
                profile: NumericProfile::default(),
            });
        }

        Ok(Self { columns })
    }

    /// Builder that has observed every table in `tables`.
    pub fn for_tables<S: AsRef<str>>(key_columns: &[S], tables: &[&Table]) -> Result<Self> {
        let mut builder = Self::new(key_columns)?;
        for table in tables {
            builder.observe(table)?;
        }
        Ok(builder)
    }

    /// Fold a table's key column values into the numeric decision.
    ///
    /// Fails with a schema error when a non-empty table lacks a key column.
    pub fn observe(&mut self, table: &Table) -> Result<()> {
        if table.is_empty() {
            return Ok(());
        }
        for column in &mut self.columns {
            if !table.has_field(&column.name) {
                return Err(Error::schema(format!(
                    "key column '{}' is not present in the table (fields: {})",
                    column.name,
                    table.fields().join(", ")
                )));
            }
            for value in table.column(&column.name) {
                column.profile.observe(&value);
            }
        }
        Ok(())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn build_key(&self, record: &Record) -> Result<String> {
        let mut parts = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let value = record.get(&column.name).ok_or_else(|| {
                Error::schema(format!(
                    "key column '{}' is missing from a record",
                    column.name
                ))
            })?;
            let canonical = value.canonical();
            if column.profile.strips_for_key() {
                parts.push(strip_integral_suffix(&canonical));
            } else {
                parts.push(canonical);
            }
        }
        Ok(parts.join(KEY_SEPARATOR))
    }

    /// Index a table by key.
    ///
    /// Duplicate keys here mean duplicate resolution was skipped; that is a
    /// reconciliation error, raised before anything touches the remote store.
    pub fn index(&self, table: Table) -> Result<KeyedTable> {
        let fields = table.fields().to_vec();
        let mut rows = BTreeMap::new();
        for record in table.into_records() {
            let key = self.build_key(&record)?;
            if rows.insert(key.clone(), record).is_some() {
                return Err(Error::reconciliation(format!(
                    "duplicate primary key '{key}' reached the indexing phase"
                )));
            }
        }
        Ok(KeyedTable::from_parts(fields, rows))
    }
}

/// Key of a single record, with `.0` stripping decided from that record alone.
pub fn build_key<S: AsRef<str>>(record: &Record, key_columns: &[S]) -> Result<String> {
    let table = Table::from_records(vec![record.clone()]);
    KeyBuilder::for_tables(key_columns, &[&table])?.build_key(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;

    fn person(first: &str, last: &str) -> Record {
        Record::new().with("nombre", first).with("apellido", last)
    }

    #[test]
    fn joins_columns_in_declared_order() {
        let record = person("Juan", "Perez");
        assert_eq!(
            build_key(&record, &["nombre", "apellido"]).unwrap(),
            "Juan-Perez"
        );
        assert_eq!(
            build_key(&record, &["apellido", "nombre"]).unwrap(),
            "Perez-Juan"
        );
    }

    #[test]
    fn rejects_empty_or_repeated_key_columns() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            KeyBuilder::new(&empty),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            KeyBuilder::new(&["a", " "]),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            KeyBuilder::new(&["a", "a"]),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn missing_key_column_is_schema_error() {
        let table = Table::from_records(vec![person("Ana", "Garcia")]);
        let err = KeyBuilder::for_tables(&["documento"], &[&table]).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));

        let builder = KeyBuilder::new(&["documento"]).unwrap();
        assert!(matches!(
            builder.build_key(&person("Ana", "Garcia")),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn integral_decimals_match_integers() {
        let remote = Table::from_records(vec![Record::new().with("doc", Value::Decimal(7.0))]);
        let desired = Table::from_records(vec![Record::new().with("doc", Value::Integer(7))]);
        let builder = KeyBuilder::for_tables(&["doc"], &[&remote, &desired]).unwrap();

        assert_eq!(builder.build_key(&remote.records()[0]).unwrap(), "7");
        assert_eq!(builder.build_key(&desired.records()[0]).unwrap(), "7");
    }

    #[test]
    fn strings_seven_and_seven_point_zero_share_a_key() {
        let table = Table::from_records(vec![
            Record::new().with("doc", "7"),
            Record::new().with("doc", "7.0"),
        ]);
        let builder = KeyBuilder::for_tables(&["doc"], &[&table]).unwrap();
        let keys: Vec<String> = table
            .records()
            .iter()
            .map(|record| builder.build_key(record).unwrap())
            .collect();
        assert_eq!(keys, ["7", "7"]);
    }

    #[test]
    fn genuine_fraction_disables_stripping_column_wide() {
        let table = Table::from_records(vec![
            Record::new().with("doc", Value::Decimal(7.0)),
            Record::new().with("doc", Value::Decimal(7.5)),
        ]);
        let builder = KeyBuilder::for_tables(&["doc"], &[&table]).unwrap();
        assert_eq!(builder.build_key(&table.records()[0]).unwrap(), "7.0");
        assert_eq!(builder.build_key(&table.records()[1]).unwrap(), "7.5");
    }

    #[test]
    fn index_rejects_duplicate_keys() {
        let table = Table::from_records(vec![person("Pedro", "Lopez"), person("Pedro", "Lopez")]);
        let builder = KeyBuilder::for_tables(&["nombre", "apellido"], &[&table]).unwrap();
        assert!(matches!(
            builder.index(table),
            Err(Error::Reconciliation(_))
        ));
    }

    #[test]
    fn empty_table_skips_field_check() {
        let empty = Table::default();
        assert!(KeyBuilder::for_tables(&["nombre"], &[&empty]).is_ok());
    }
}

//! Records and tables

use std::collections::BTreeMap;

use serde::Serialize;

use super::Value;

/// An ordered mapping from field name to value, plus the remote identifier
/// when the row originates from (or has been written to) the remote store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty record already bound to a remote identifier.
    #[must_use]
    pub fn with_remote_id(remote_id: impl Into<String>) -> Self {
        Self {
            remote_id: Some(remote_id.into()),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field assignment.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Canonical string of a field; absent fields read as `""`.
    #[must_use]
    pub fn canonical(&self, name: &str) -> String {
        self.get(name).map(Value::canonical).unwrap_or_default()
    }

    /// Build a record from a JSON object, converting every scalar.
    #[must_use]
    pub fn from_json_object(object: &serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            remote_id: None,
            fields: object
                .iter()
                .map(|(name, value)| (name.clone(), Value::from_json(value)))
                .collect(),
        }
    }

    /// Copy of this record restricted to `fields`.
    #[must_use]
    pub fn project(&self, fields: &[String]) -> Self {
        Self {
            remote_id: self.remote_id.clone(),
            fields: fields
                .iter()
                .filter_map(|name| {
                    self.fields
                        .get(name)
                        .map(|value| (name.clone(), value.clone()))
                })
                .collect(),
        }
    }
}

/// A sequence of records sharing a declared, ordered field set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    fields: Vec<String>,
    records: Vec<Record>,
}

impl Table {
    /// Create an empty table with a declared field set.
    #[must_use]
    pub fn new(fields: Vec<String>) -> Self {
        let mut table = Self::default();
        for field in fields {
            table.declare(field);
        }
        table
    }

    /// Create a table whose field set is the union of the records' fields,
    /// in first-seen order.
    #[must_use]
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut table = Self::default();
        for record in records {
            table.push(record);
        }
        table
    }

    /// Append a record, declaring any field the table has not seen yet.
    pub fn push(&mut self, record: Record) {
        for name in record.fields.keys() {
            if !self.has_field(name) {
                self.fields.push(name.clone());
            }
        }
        self.records.push(record);
    }

    fn declare(&mut self, field: String) {
        if !self.has_field(&field) {
            self.fields.push(field);
        }
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field == name)
    }

    /// Canonical strings of one column, in row order.
    pub fn column<'a>(&'a self, name: &'a str) -> impl Iterator<Item = String> + 'a {
        self.records.iter().map(move |record| record.canonical(name))
    }

    /// Column projection, keeping only the listed fields that the table declares.
    #[must_use]
    pub fn select(&self, fields: &[String]) -> Self {
        let kept: Vec<String> = fields
            .iter()
            .filter(|field| self.has_field(field))
            .cloned()
            .collect();
        Self {
            records: self
                .records
                .iter()
                .map(|record| record.project(&kept))
                .collect(),
            fields: kept,
        }
    }

    /// Fields declared by both tables, in this table's order.
    #[must_use]
    pub fn common_fields(&self, other: &Self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|field| other.has_field(field))
            .cloned()
            .collect()
    }
}

/// A table indexed by primary key: at most one record per key.
///
/// Built through [`crate::reconcile::KeyBuilder::index`], which rejects
/// duplicate keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyedTable {
    fields: Vec<String>,
    rows: BTreeMap<String, Record>,
}

impl KeyedTable {
    pub(crate) const fn from_parts(fields: Vec<String>, rows: BTreeMap<String, Record>) -> Self {
        Self { fields, rows }
    }

    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Record> {
        self.rows.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.rows.iter().map(|(key, record)| (key.as_str(), record))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn from_records_unions_fields_in_first_seen_order() {
        let table = Table::from_records(vec![
            Record::new().with("b", 1).with("a", 2),
            Record::new().with("c", 3),
        ]);
        assert_eq!(table.fields(), ["a", "b", "c"]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn select_drops_unknown_fields() {
        let table = Table::from_records(vec![Record::with_remote_id("9")
            .with("edad", 30)
            .with("nombre", "Juan")]);
        let selected = table.select(&["nombre".to_string(), "ciudad".to_string()]);
        assert_eq!(selected.fields(), ["nombre"]);
        assert_eq!(
            selected.records()[0],
            Record::with_remote_id("9").with("nombre", "Juan")
        );
    }

    #[test]
    fn common_fields_preserve_left_order() {
        let left = Table::new(vec!["x".into(), "y".into(), "z".into()]);
        let right = Table::new(vec!["z".into(), "x".into()]);
        assert_eq!(left.common_fields(&right), ["x", "z"]);
    }

    #[test]
    fn canonical_reads_missing_field_as_empty() {
        let record = Record::new().with("a", 1);
        assert_eq!(record.canonical("a"), "1");
        assert_eq!(record.canonical("missing"), "");
    }
}

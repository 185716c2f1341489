//! Field declarations for a remote collection.
//!
//! A [`Schema`] maps the display names used by local tables to the internal
//! names the remote store expects, and formats values for writes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::error::{Error, Result};
use crate::models::{Record, Table, Value};
use crate::remote::RemoteField;

/// Display names of system columns that are never written.
const SKIPPED_DISPLAY_NAMES: [&str; 4] = ["Título", "Title", "Index", "index"];
/// Internal names of system columns that are never written.
const SKIPPED_INTERNAL_NAMES: [&str; 2] = ["ContentType", "Attachments"];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclaredType {
    String,
    Integer,
    /// Decimal with the given number of fractional digits.
    Decimal(u8),
    Date,
    DateTime,
}

impl DeclaredType {
    /// Convert a value to this type for a remote write.
    ///
    /// Empty values become `Null`. The error is a human-readable reason.
    pub fn coerce(self, value: &Value) -> std::result::Result<Value, String> {
        if value.is_empty() {
            return Ok(Value::Null);
        }
        match self {
            Self::String => Ok(Value::Text(value.canonical())),
            Self::Integer => coerce_integer(value),
            Self::Decimal(places) => coerce_decimal(value, places),
            Self::Date => coerce_date(value).map(Value::Date),
            Self::DateTime => coerce_datetime(value).map(Value::DateTime),
        }
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Integer => f.write_str("integer"),
            Self::Decimal(places) => write!(f, "decimal({places})"),
            Self::Date => f.write_str("date"),
            Self::DateTime => f.write_str("datetime"),
        }
    }
}

impl FromStr for DeclaredType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "string" | "str" | "text" => return Ok(Self::String),
            "integer" | "int" => return Ok(Self::Integer),
            "date" => return Ok(Self::Date),
            "datetime" => return Ok(Self::DateTime),
            _ => {}
        }

        let places = normalized
            .strip_prefix("decimal(")
            .or_else(|| normalized.strip_prefix("num("))
            .and_then(|rest| rest.strip_suffix(')'))
            .and_then(|digits| digits.trim().parse::<u8>().ok());
        places
            .map(Self::Decimal)
            .ok_or_else(|| Error::validation(format!("unknown field type '{}'", value.trim())))
    }
}

/// One writable column of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDeclaration {
    /// Display name, used as the field name in local tables.
    pub local_name: String,
    /// Internal name the remote API reads and writes.
    pub remote_name: String,
    pub declared_type: DeclaredType,
}

impl FieldDeclaration {
    pub fn new(
        local_name: impl Into<String>,
        remote_name: impl Into<String>,
        declared_type: DeclaredType,
    ) -> Self {
        Self {
            local_name: local_name.into(),
            remote_name: remote_name.into(),
            declared_type,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldDeclaration>,
}

impl Schema {
    #[must_use]
    pub const fn new(fields: Vec<FieldDeclaration>) -> Self {
        Self { fields }
    }

    /// Keep the writable, user-defined columns of a collection.
    #[must_use]
    pub fn from_remote_fields(fields: &[RemoteField]) -> Self {
        let kept = fields
            .iter()
            .filter(|field| !field.read_only)
            .filter(|field| !SKIPPED_DISPLAY_NAMES.contains(&field.name.as_str()))
            .filter(|field| !SKIPPED_INTERNAL_NAMES.contains(&field.name_id.as_str()))
            .map(|field| FieldDeclaration::new(&field.name, &field.name_id, field.declared_type))
            .collect();
        Self::new(kept)
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDeclaration] {
        &self.fields
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn field(&self, local_name: &str) -> Option<&FieldDeclaration> {
        self.fields
            .iter()
            .find(|field| field.local_name == local_name)
    }

    #[must_use]
    pub fn local_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|field| field.local_name.clone())
            .collect()
    }

    #[must_use]
    pub fn remote_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|field| field.remote_name.clone())
            .collect()
    }

    /// Restrict a desired table to the schema's columns.
    ///
    /// Unknown columns are dropped with a warning, or rejected when `strict`.
    pub fn align(&self, table: &Table, strict: bool) -> Result<Table> {
        let unknown: Vec<&str> = table
            .fields()
            .iter()
            .filter(|name| self.field(name).is_none())
            .map(String::as_str)
            .collect();

        if !unknown.is_empty() {
            if strict {
                return Err(Error::schema(format!(
                    "columns not present in the collection: {}",
                    unknown.join(", ")
                )));
            }
            tracing::warn!(
                "Ignoring columns not present in the collection: {}",
                unknown.join(", ")
            );
        }

        Ok(table.select(&self.local_names()))
    }

    /// Coerce every cell through its declared type, the way it is written.
    ///
    /// Rows that omit a column of the table get `Null` for it. A value that
    /// does not coerce is kept as given, and its write fails for that row.
    #[must_use]
    pub fn normalize(&self, table: &Table) -> Table {
        let mut normalized = Table::new(table.fields().to_vec());
        for record in table.records() {
            let mut row = Record {
                remote_id: record.remote_id.clone(),
                fields: BTreeMap::new(),
            };
            for name in table.fields() {
                let value = record.get(name).cloned().unwrap_or_default();
                let value = match self.field(name).map(|field| field.declared_type.coerce(&value)) {
                    Some(Ok(coerced)) => coerced,
                    Some(Err(reason)) => {
                        tracing::warn!("Keeping uncoerced value of field '{}': {}", name, reason);
                        value
                    }
                    None => value,
                };
                row.insert(name.clone(), value);
            }
            normalized.push(row);
        }
        normalized
    }

    /// Rename a record read from the remote store to local names.
    ///
    /// Columns the remote row omits (Graph drops empty fields) read as `Null`.
    #[must_use]
    pub fn rename_from_remote(&self, mut record: Record) -> Record {
        let mut renamed = Record {
            remote_id: record.remote_id.take(),
            fields: BTreeMap::new(),
        };
        for field in &self.fields {
            let value = record.fields.remove(&field.remote_name).unwrap_or_default();
            renamed.insert(field.local_name.clone(), value);
        }
        renamed
    }

    /// Format locally named values for a remote write.
    ///
    /// Fields outside the schema are skipped.
    pub fn to_remote_record(
        &self,
        fields: &BTreeMap<String, Value>,
    ) -> std::result::Result<Record, String> {
        let mut record = Record::new();
        for (name, value) in fields {
            let Some(field) = self.field(name) else {
                continue;
            };
            let coerced = field
                .declared_type
                .coerce(value)
                .map_err(|reason| format!("field '{name}': {reason}"))?;
            record.insert(field.remote_name.clone(), coerced);
        }
        Ok(record)
    }
}

fn coerce_integer(value: &Value) -> std::result::Result<Value, String> {
    match value {
        Value::Integer(number) => Ok(Value::Integer(*number)),
        Value::Decimal(number) => truncate(*number)
            .map(Value::Integer)
            .ok_or_else(|| format!("{number} is not representable as an integer")),
        Value::Text(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(truncate))
                .map(Value::Integer)
                .ok_or_else(|| format!("'{text}' is not an integer"))
        }
        other => Err(format!("'{other}' is not an integer")),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn truncate(number: f64) -> Option<i64> {
    let truncated = number.trunc();
    (truncated.is_finite() && truncated.abs() < i64::MAX as f64).then_some(truncated as i64)
}

#[allow(clippy::cast_precision_loss)]
fn coerce_decimal(value: &Value, places: u8) -> std::result::Result<Value, String> {
    let number = match value {
        Value::Integer(number) => *number as f64,
        Value::Decimal(number) => *number,
        Value::Text(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("'{}' is not a number", text.trim()))?,
        other => return Err(format!("'{other}' is not a number")),
    };
    if !number.is_finite() {
        return Err(format!("{number} is not a finite number"));
    }
    let scale = 10_f64.powi(i32::from(places));
    Ok(Value::Decimal((number * scale).round() / scale))
}

fn coerce_date(value: &Value) -> std::result::Result<NaiveDate, String> {
    match value {
        Value::Date(date) => Ok(*date),
        Value::DateTime(timestamp) => Ok(timestamp.date_naive()),
        Value::Text(text) => parse_date(text.trim())
            .or_else(|| parse_datetime(text.trim()).map(|timestamp| timestamp.date_naive()))
            .ok_or_else(|| format!("'{}' is not a date", text.trim())),
        other => Err(format!("'{other}' is not a date")),
    }
}

fn coerce_datetime(value: &Value) -> std::result::Result<DateTime<Utc>, String> {
    match value {
        Value::DateTime(timestamp) => Ok(*timestamp),
        Value::Date(date) => Ok(date.and_time(NaiveTime::MIN).and_utc()),
        Value::Text(text) => parse_datetime(text.trim())
            .or_else(|| parse_date(text.trim()).map(|date| date.and_time(NaiveTime::MIN).and_utc()))
            .ok_or_else(|| format!("'{}' is not a date-time", text.trim())),
        other => Err(format!("'{other}' is not a date-time")),
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|timestamp| timestamp.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn remote_field(name_id: &str, name: &str, declared_type: DeclaredType) -> RemoteField {
        RemoteField {
            name_id: name_id.to_string(),
            name: name.to_string(),
            read_only: false,
            declared_type,
        }
    }

    fn people_schema() -> Schema {
        Schema::new(vec![
            FieldDeclaration::new("nombre", "field_1", DeclaredType::String),
            FieldDeclaration::new("edad", "field_2", DeclaredType::Integer),
            FieldDeclaration::new("saldo", "field_3", DeclaredType::Decimal(2)),
            FieldDeclaration::new("alta", "field_4", DeclaredType::Date),
        ])
    }

    #[test]
    fn declared_type_parses_and_displays() {
        for text in ["string", "integer", "decimal(2)", "date", "datetime"] {
            let parsed: DeclaredType = text.parse().unwrap();
            assert_eq!(parsed.to_string(), text);
        }
        assert_eq!("num(1)".parse::<DeclaredType>().unwrap(), DeclaredType::Decimal(1));
        assert_eq!(" STR ".parse::<DeclaredType>().unwrap(), DeclaredType::String);
        assert!("decimal(x)".parse::<DeclaredType>().is_err());
        assert!("blob".parse::<DeclaredType>().is_err());
    }

    #[test]
    fn remote_fields_skip_system_columns() {
        let schema = Schema::from_remote_fields(&[
            remote_field("Title", "Título", DeclaredType::String),
            remote_field("ContentType", "Tipo de contenido", DeclaredType::String),
            remote_field("Attachments", "Datos adjuntos", DeclaredType::String),
            remote_field("index", "Index", DeclaredType::Integer),
            RemoteField {
                read_only: true,
                ..remote_field("Modified", "Modificado", DeclaredType::DateTime)
            },
            remote_field("field_1", "nombre", DeclaredType::String),
            remote_field("field_2", "edad", DeclaredType::Integer),
        ]);

        assert_eq!(schema.local_names(), ["nombre", "edad"]);
        assert_eq!(schema.remote_names(), ["field_1", "field_2"]);
    }

    #[test]
    fn align_drops_unknown_columns_unless_strict() {
        let table = Table::from_records(vec![Record::new()
            .with("nombre", "Juan")
            .with("edad", 30)
            .with("extra", "x")]);
        let schema = people_schema();

        let aligned = schema.align(&table, false).unwrap();
        assert_eq!(aligned.fields(), ["nombre", "edad"]);
        assert!(!aligned.records()[0].contains("extra"));

        let error = schema.align(&table, true).unwrap_err();
        assert!(matches!(error, Error::Schema(message) if message.contains("extra")));
    }

    #[test]
    fn rename_from_remote_fills_missing_columns_with_null() {
        let remote = Record::with_remote_id("9")
            .with("field_1", "Juan")
            .with("field_2", 30)
            .with("Modified", "2024-01-01T00:00:00Z");
        let renamed = people_schema().rename_from_remote(remote);

        assert_eq!(renamed.remote_id.as_deref(), Some("9"));
        assert_eq!(renamed.get("nombre"), Some(&Value::from("Juan")));
        assert_eq!(renamed.get("edad"), Some(&Value::Integer(30)));
        assert_eq!(renamed.get("saldo"), Some(&Value::Null));
        assert!(!renamed.contains("Modified"));
    }

    #[test]
    fn to_remote_record_renames_and_coerces() {
        let desired = Record::new()
            .with("nombre", "Juan")
            .with("edad", Value::Decimal(30.0))
            .with("saldo", "10.456")
            .with("alta", "05/03/2024")
            .with("extra", "ignored");
        let record = people_schema().to_remote_record(&desired.fields).unwrap();

        assert_eq!(record.get("field_1"), Some(&Value::from("Juan")));
        assert_eq!(record.get("field_2"), Some(&Value::Integer(30)));
        assert_eq!(record.get("field_3"), Some(&Value::Decimal(10.46)));
        assert_eq!(
            record.get("field_4"),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()))
        );
        assert_eq!(record.fields.len(), 4);
    }

    #[test]
    fn uncoercible_value_reports_the_field() {
        let desired = Record::new().with("edad", "abc");
        let error = people_schema().to_remote_record(&desired.fields).unwrap_err();
        assert!(error.contains("edad"));
        assert!(error.contains("abc"));
    }

    #[test]
    fn normalize_coerces_cells_and_fills_omitted_columns() {
        let table = Table::from_records(vec![
            Record::with_remote_id("4")
                .with("nombre", "Juan")
                .with("edad", "abc")
                .with("saldo", "7.50")
                .with("alta", "09/03/2024"),
            Record::new().with("nombre", "Ana").with("saldo", 7.456),
        ]);
        let normalized = people_schema().normalize(&table);

        assert_eq!(normalized.fields(), table.fields());
        let juan = &normalized.records()[0];
        assert_eq!(juan.remote_id.as_deref(), Some("4"));
        assert_eq!(juan.get("edad"), Some(&Value::from("abc")));
        assert_eq!(juan.get("saldo"), Some(&Value::Decimal(7.5)));
        assert_eq!(juan.canonical("alta"), "2024-03-09");

        let ana = &normalized.records()[1];
        assert_eq!(ana.get("saldo"), Some(&Value::Decimal(7.46)));
        assert_eq!(ana.get("edad"), Some(&Value::Null));
        assert_eq!(ana.get("alta"), Some(&Value::Null));
    }

    #[test]
    fn empty_values_are_written_as_null() {
        assert_eq!(DeclaredType::Integer.coerce(&Value::from("  ")), Ok(Value::Null));
        assert_eq!(DeclaredType::Date.coerce(&Value::Null), Ok(Value::Null));
    }

    #[test]
    fn string_columns_take_canonical_text() {
        assert_eq!(
            DeclaredType::String.coerce(&Value::Integer(7)),
            Ok(Value::from("7"))
        );
    }

    #[test]
    fn dates_widen_to_midnight_utc() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let coerced = DeclaredType::DateTime.coerce(&Value::Date(date)).unwrap();
        assert_eq!(coerced.canonical(), "2024-03-05T00:00:00Z");
    }
}

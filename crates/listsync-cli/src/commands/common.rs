use std::io::{self, Read};
use std::path::Path;

use listsync_core::remote::{Collection, GraphListClient};
use listsync_core::{ChangeRecord, ChangeStatus, GraphConfig, Record, Schema, SyncService, Table};

use crate::error::CliError;

pub type GraphService = SyncService<GraphListClient>;

/// Rendered command output plus the per-row failure count that decides the
/// exit status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub failed: usize,
    pub total: usize,
}

impl CommandOutput {
    pub fn print(self) -> Result<(), CliError> {
        if !self.text.is_empty() {
            println!("{}", self.text);
        }
        if self.failed > 0 {
            return Err(CliError::ChangesFailed {
                failed: self.failed,
                total: self.total,
            });
        }
        Ok(())
    }
}

pub fn open_service() -> Result<GraphService, CliError> {
    let config = GraphConfig::from_env()?;
    tracing::debug!("Using Graph site {}", config.site_url());
    Ok(SyncService::new(GraphListClient::from_config(&config)?))
}

/// Read the desired table from a file, or stdin when the path is `-`.
pub fn load_desired_table(path: &Path) -> Result<Table, CliError> {
    let text = if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(path)?
    };
    parse_desired_table(&text)
}

/// Parse a JSON array of objects into a table.
pub fn parse_desired_table(text: &str) -> Result<Table, CliError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let serde_json::Value::Array(rows) = value else {
        return Err(CliError::InvalidInput(
            "expected a JSON array of objects".to_string(),
        ));
    };

    let mut table = Table::default();
    for (index, row) in rows.iter().enumerate() {
        let serde_json::Value::Object(object) = row else {
            return Err(CliError::InvalidInput(format!(
                "row {} is not a JSON object",
                index + 1
            )));
        };
        table.push(Record::from_json_object(object));
    }
    Ok(table)
}

pub fn format_collection_lines(collections: &[Collection]) -> Vec<String> {
    collections
        .iter()
        .map(|collection| format!("{}\t{}", collection.id, collection.name))
        .collect()
}

pub fn format_field_lines(schema: &Schema) -> Vec<String> {
    schema
        .fields()
        .iter()
        .map(|field| {
            format!(
                "{}\t{}\t{}",
                field.local_name, field.remote_name, field.declared_type
            )
        })
        .collect()
}

pub fn format_table_lines(table: &Table) -> Vec<String> {
    let mut lines = Vec::with_capacity(table.len() + 1);
    let mut header = vec!["id"];
    header.extend(table.fields().iter().map(String::as_str));
    lines.push(header.join("\t"));

    for record in table.records() {
        let mut cells = vec![record.remote_id.clone().unwrap_or_else(|| "-".to_string())];
        cells.extend(table.fields().iter().map(|field| record.canonical(field)));
        lines.push(cells.join("\t"));
    }
    lines
}

/// Flat JSON objects: `id` plus one member per field.
pub fn table_to_json(table: &Table) -> serde_json::Value {
    table
        .records()
        .iter()
        .map(|record| {
            let mut object = serde_json::Map::new();
            object.insert(
                "id".to_string(),
                record
                    .remote_id
                    .clone()
                    .map_or(serde_json::Value::Null, serde_json::Value::String),
            );
            for (name, value) in &record.fields {
                object.insert(name.clone(), value.to_json());
            }
            serde_json::Value::Object(object)
        })
        .collect()
}

pub fn format_change_lines(changes: &[ChangeRecord]) -> Vec<String> {
    changes
        .iter()
        .map(|change| {
            let remote_id = change
                .remote_id
                .as_deref()
                .map(|id| format!(" #{id}"))
                .unwrap_or_default();
            match &change.status {
                ChangeStatus::Failed { message } => format!(
                    "{} {}{} {}: {}",
                    change.action.code(),
                    change.key,
                    remote_id,
                    change.status.label(),
                    message
                ),
                status => format!(
                    "{} {}{} {}",
                    change.action.code(),
                    change.key,
                    remote_id,
                    status.label()
                ),
            }
        })
        .collect()
}

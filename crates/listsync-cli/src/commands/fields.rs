use listsync_core::{RemoteStore, SyncService};
use serde::Serialize;

use crate::commands::common::{format_field_lines, open_service};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct FieldItem {
    pub name: String,
    pub internal_name: String,
    pub declared_type: String,
}

pub async fn run_fields(collection: &str, as_json: bool) -> Result<(), CliError> {
    let service = open_service()?;
    println!("{}", fields_output(&service, collection, as_json).await?);
    Ok(())
}

pub async fn fields_output<S: RemoteStore>(
    service: &SyncService<S>,
    collection: &str,
    as_json: bool,
) -> Result<String, CliError> {
    let collection_id = service.collection_id(collection).await?;
    let schema = service.schema(&collection_id).await?;

    if as_json {
        let items = schema
            .fields()
            .iter()
            .map(|field| FieldItem {
                name: field.local_name.clone(),
                internal_name: field.remote_name.clone(),
                declared_type: field.declared_type.to_string(),
            })
            .collect::<Vec<FieldItem>>();
        Ok(serde_json::to_string_pretty(&items)?)
    } else {
        Ok(format_field_lines(&schema).join("\n"))
    }
}

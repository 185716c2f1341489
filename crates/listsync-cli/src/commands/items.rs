use listsync_core::{RemoteStore, SyncService};

use crate::commands::common::{format_table_lines, open_service, table_to_json};
use crate::error::CliError;

pub async fn run_items(collection: &str, as_json: bool) -> Result<(), CliError> {
    let service = open_service()?;
    println!("{}", items_output(&service, collection, as_json).await?);
    Ok(())
}

pub async fn items_output<S: RemoteStore>(
    service: &SyncService<S>,
    collection: &str,
    as_json: bool,
) -> Result<String, CliError> {
    let table = service.items(collection).await?;
    if as_json {
        Ok(serde_json::to_string_pretty(&table_to_json(&table))?)
    } else {
        Ok(format_table_lines(&table).join("\n"))
    }
}

use listsync_core::{RemoteStore, SyncService};

use crate::commands::common::{format_collection_lines, open_service};
use crate::error::CliError;

pub async fn run_collections(as_json: bool) -> Result<(), CliError> {
    let service = open_service()?;
    println!("{}", collections_output(&service, as_json).await?);
    Ok(())
}

pub async fn collections_output<S: RemoteStore>(
    service: &SyncService<S>,
    as_json: bool,
) -> Result<String, CliError> {
    let collections = service.collections().await?;
    if as_json {
        Ok(serde_json::to_string_pretty(&collections)?)
    } else {
        Ok(format_collection_lines(&collections).join("\n"))
    }
}

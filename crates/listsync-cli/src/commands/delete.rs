use listsync_core::{RemoteStore, SyncService};

use crate::commands::common::{format_change_lines, open_service, CommandOutput};
use crate::error::CliError;

pub async fn run_delete(
    collection: &str,
    ids: &[String],
    all: bool,
    concurrency: usize,
) -> Result<(), CliError> {
    let service = open_service()?;
    delete_output(&service, collection, ids, all, concurrency)
        .await?
        .print()
}

pub async fn delete_output<S: RemoteStore>(
    service: &SyncService<S>,
    collection: &str,
    ids: &[String],
    all: bool,
    concurrency: usize,
) -> Result<CommandOutput, CliError> {
    let deleted = if all {
        service.clear_collection(collection, concurrency).await?
    } else {
        if ids.is_empty() {
            return Err(CliError::InvalidInput(
                "pass at least one --id or --all".to_string(),
            ));
        }
        service.delete_items(collection, ids, concurrency).await?
    };

    Ok(CommandOutput {
        text: format_change_lines(&deleted).join("\n"),
        failed: deleted
            .iter()
            .filter(|change| change.status.is_failure())
            .count(),
        total: deleted.len(),
    })
}

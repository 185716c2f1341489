use std::path::Path;

use listsync_core::{RemoteStore, SyncOptions, SyncService, Table};

use crate::commands::common::{format_change_lines, load_desired_table, open_service, CommandOutput};
use crate::error::CliError;

/// Switches of `listsync sync` given on the command line.
#[derive(Debug, Default)]
pub struct SyncFlags {
    pub keys: Vec<String>,
    pub no_delete: bool,
    pub no_insert: bool,
    pub purge_duplicates: bool,
    pub strict_columns: bool,
    pub concurrency: Option<usize>,
}

/// Layer command-line switches over an optional options file.
pub fn resolve_sync_options(
    options_file: Option<&Path>,
    flags: SyncFlags,
) -> Result<SyncOptions, CliError> {
    let mut options = match options_file {
        Some(path) => SyncOptions::from_file(path)?,
        None => SyncOptions::new::<String>(&[]),
    };
    if !flags.keys.is_empty() {
        options.key_columns = flags.keys;
    }
    if flags.no_delete {
        options.allow_delete = false;
    }
    if flags.no_insert {
        options.allow_insert = false;
    }
    options.purge_duplicate_remote |= flags.purge_duplicates;
    options.strict_columns |= flags.strict_columns;
    if let Some(concurrency) = flags.concurrency {
        options.concurrency = concurrency;
    }
    Ok(options)
}

pub async fn run_sync(
    collection: &str,
    input: &Path,
    options: &SyncOptions,
    dry_run: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let desired = load_desired_table(input)?;
    let service = open_service()?;
    sync_output(&service, collection, &desired, options, dry_run, as_json)
        .await?
        .print()
}

pub async fn sync_output<S: RemoteStore>(
    service: &SyncService<S>,
    collection: &str,
    desired: &Table,
    options: &SyncOptions,
    dry_run: bool,
    as_json: bool,
) -> Result<CommandOutput, CliError> {
    if dry_run {
        let plan = service.plan(collection, desired, options).await?;
        let text = if as_json {
            serde_json::to_string_pretty(&serde_json::json!({
                "collection_id": plan.collection_id,
                "purge": plan.purge,
                "changes": plan.changes,
            }))?
        } else {
            let mut lines = vec![format!(
                "Plan for '{}': {} remote rows, {} desired rows, {} remote and {} desired rows with duplicated keys",
                collection,
                plan.remote_rows,
                plan.desired_rows,
                plan.remote_duplicates,
                plan.desired_duplicates
            )];
            lines.extend(format_change_lines(&plan.purge));
            lines.extend(format_change_lines(&plan.changes));
            lines.join("\n")
        };
        return Ok(CommandOutput {
            text,
            failed: 0,
            total: plan.purge.len() + plan.changes.len(),
        });
    }

    let report = service.synchronize(collection, desired, options).await?;
    let text = if as_json {
        serde_json::to_string_pretty(&report)?
    } else {
        let mut lines = format_change_lines(&report.purged);
        lines.extend(format_change_lines(&report.changes));
        lines.push(report.summary.to_string());
        lines.join("\n")
    };
    Ok(CommandOutput {
        text,
        failed: report.summary.failed,
        total: report.purged.len() + report.changes.len(),
    })
}

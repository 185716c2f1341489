//! listsync CLI - Reconcile a local table against a SharePoint list
//!
//! Credentials come from the environment (or a `.env` file): `CLIENT_ID`,
//! `CLIENT_SECRET`, `TENANT_ID` and `SITE_ID`.

mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::collections::run_collections;
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::fields::run_fields;
use crate::commands::items::run_items;
use crate::commands::sync::{resolve_sync_options, run_sync, SyncFlags};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("listsync=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Collections { json } => run_collections(json).await?,
        Commands::Fields { collection, json } => run_fields(&collection, json).await?,
        Commands::Items { collection, json } => run_items(&collection, json).await?,
        Commands::Sync {
            collection,
            input,
            keys,
            options,
            no_delete,
            no_insert,
            purge_duplicates,
            strict_columns,
            concurrency,
            dry_run,
            json,
        } => {
            let flags = SyncFlags {
                keys,
                no_delete,
                no_insert,
                purge_duplicates,
                strict_columns,
                concurrency,
            };
            let options = resolve_sync_options(options.as_deref(), flags)?;
            run_sync(&collection, &input, &options, dry_run, json).await?;
        }
        Commands::Delete {
            collection,
            ids,
            all,
            concurrency,
        } => run_delete(&collection, &ids, all, concurrency).await?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}

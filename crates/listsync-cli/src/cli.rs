use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "listsync")]
#[command(about = "Reconcile a local table against a SharePoint list")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the collections of the configured site
    Collections {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the writable columns of a collection
    Fields {
        /// Collection display name
        collection: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print every item of a collection
    Items {
        /// Collection display name
        collection: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Bring a collection to the state of a desired table
    Sync {
        /// Collection display name
        collection: String,
        /// JSON array of desired rows (`-` reads stdin)
        #[arg(short, long, value_name = "PATH")]
        input: PathBuf,
        /// Key column, repeat for composite keys (order matters)
        #[arg(short, long = "key", value_name = "COLUMN", required_unless_present = "options")]
        keys: Vec<String>,
        /// JSON file of sync options; flags given here take precedence
        #[arg(long, value_name = "PATH")]
        options: Option<PathBuf>,
        /// Keep remote rows that are missing from the input
        #[arg(long)]
        no_delete: bool,
        /// Do not create rows that only exist in the input
        #[arg(long)]
        no_insert: bool,
        /// Delete remote rows that share a key with another remote row
        #[arg(long)]
        purge_duplicates: bool,
        /// Fail when the input has columns the collection does not declare
        #[arg(long)]
        strict_columns: bool,
        /// Remote calls kept in flight while applying changes [default: 1]
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
        /// Print the planned changes without applying them
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete items of a collection
    Delete {
        /// Collection display name
        collection: String,
        /// Remote item id to delete (repeatable)
        #[arg(long = "id", value_name = "ID", required_unless_present = "all", conflicts_with = "all")]
        ids: Vec<String>,
        /// Delete every item of the collection
        #[arg(long)]
        all: bool,
        /// Remote calls kept in flight
        #[arg(long, default_value = "1", value_name = "N")]
        concurrency: usize,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

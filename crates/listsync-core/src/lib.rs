//! listsync-core - Core library for listsync
//!
//! This crate contains the table model, the reconciliation engine
//! (key building, duplicate resolution, diffing, change application), and
//! the remote list clients used by the `listsync` command-line interface.

pub mod config;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod remote;
pub mod schema;
pub mod services;
pub mod util;

pub use config::{ConfigError, GraphConfig, SyncOptions};
pub use error::{Error, Result};
pub use models::{ChangeAction, ChangeRecord, ChangeStatus, KeyedTable, Record, Table, Value};
pub use remote::{RemoteError, RemoteStore};
pub use schema::{DeclaredType, FieldDeclaration, Schema};
pub use services::{SyncReport, SyncService, SyncSummary};

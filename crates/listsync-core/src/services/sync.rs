//! Synchronization of a desired table into a remote collection.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};

use crate::config::SyncOptions;
use crate::error::{Error, Result};
use crate::models::{ChangeAction, ChangeRecord, Record, Table};
use crate::reconcile::{diff, resolve_duplicates, Applicator, KeyBuilder};
use crate::remote::{fetch_table, resolve_collection_id, Collection, RemoteStore};
use crate::schema::Schema;
use crate::util::format_elapsed;

/// Everything a run would do, computed without touching the remote store.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub collection_id: String,
    pub schema: Schema,
    /// Deletes of remote rows sharing a key, when purging is enabled.
    pub purge: Vec<ChangeRecord>,
    pub changes: Vec<ChangeRecord>,
    pub remote_rows: usize,
    pub desired_rows: usize,
    /// Remote rows dropped from the comparison because their key repeats.
    pub remote_duplicates: usize,
    /// Desired rows dropped from the comparison because their key repeats.
    pub desired_duplicates: usize,
}

/// Counts of one run, taken from the annotated change records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
    pub purged: usize,
    #[serde(serialize_with = "serialize_elapsed")]
    pub elapsed: Duration,
}

impl SyncSummary {
    pub fn from_changes(changes: &[ChangeRecord], purged: &[ChangeRecord], elapsed: Duration) -> Self {
        let succeeded = |action: ChangeAction| {
            changes
                .iter()
                .filter(|change| change.action == action && change.status.is_success())
                .count()
        };
        Self {
            inserted: succeeded(ChangeAction::Insert),
            updated: succeeded(ChangeAction::Update),
            deleted: succeeded(ChangeAction::Delete),
            failed: changes
                .iter()
                .chain(purged)
                .filter(|change| change.status.is_failure())
                .count(),
            purged: purged
                .iter()
                .filter(|change| change.status.is_success())
                .count(),
            elapsed,
        }
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inserted, {} updated, {} deleted, {} purged, {} failed in {}",
            self.inserted,
            self.updated,
            self.deleted,
            self.purged,
            self.failed,
            format_elapsed(self.elapsed)
        )
    }
}

fn serialize_elapsed<S: Serializer>(elapsed: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_elapsed(*elapsed))
}

/// Outcome of a synchronization run.
///
/// Partial failure is not an error: inspect each record's status, or
/// [`SyncSummary::failed`].
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub collection_id: String,
    pub changes: Vec<ChangeRecord>,
    pub purged: Vec<ChangeRecord>,
    pub summary: SyncSummary,
}

impl SyncReport {
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }
}

/// Runs listing, reconciliation and deletion against one remote store.
#[derive(Debug, Clone)]
pub struct SyncService<S: RemoteStore> {
    store: S,
}

impl<S: RemoteStore> SyncService<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub async fn collections(&self) -> Result<Vec<Collection>> {
        Ok(self.store.fetch_collections().await?)
    }

    pub async fn collection_id(&self, collection: &str) -> Result<String> {
        resolve_collection_id(&self.store, collection).await
    }

    /// Writable columns of a collection.
    pub async fn schema(&self, collection_id: &str) -> Result<Schema> {
        let fields = self.store.fetch_fields(collection_id).await?;
        let schema = Schema::from_remote_fields(&fields);
        tracing::debug!(
            "Collection {} has {} writable columns of {}",
            collection_id,
            schema.len(),
            fields.len()
        );
        Ok(schema)
    }

    /// Current items of a collection, named by display names.
    pub async fn items(&self, collection: &str) -> Result<Table> {
        let collection_id = self.collection_id(collection).await?;
        let schema = self.schema(&collection_id).await?;
        fetch_table(&self.store, &collection_id, &schema).await
    }

    /// Compute the changes that would bring `collection` to `desired`.
    ///
    /// Structural problems (unknown key columns, malformed options, surviving
    /// duplicate keys) fail here, before any remote mutation.
    pub async fn plan(&self, collection: &str, desired: &Table, options: &SyncOptions) -> Result<SyncPlan> {
        KeyBuilder::new(&options.key_columns)?;

        let collection_id = self.collection_id(collection).await?;
        let schema = self.schema(&collection_id).await?;
        if schema.is_empty() {
            return Err(Error::schema(format!(
                "collection '{collection}' has no writable columns"
            )));
        }
        if let Some(missing) = options
            .key_columns
            .iter()
            .find(|column| schema.field(column.trim()).is_none())
        {
            return Err(Error::schema(format!(
                "key column '{}' is not a column of collection '{collection}'",
                missing.trim()
            )));
        }

        let desired = schema.normalize(&schema.align(desired, options.strict_columns)?);
        let remote = schema.normalize(&fetch_table(&self.store, &collection_id, &schema).await?);
        let remote_rows = remote.len();
        let desired_rows = desired.len();

        let keys = KeyBuilder::for_tables(&options.key_columns, &[&remote, &desired])?;
        let remote = resolve_duplicates(remote, &keys)?;
        let desired = resolve_duplicates(desired, &keys)?;

        let purge = if options.purge_duplicate_remote {
            remote
                .duplicates
                .iter()
                .map(|(key, record)| ChangeRecord::delete(key.clone(), record))
                .collect()
        } else {
            Vec::new()
        };
        let remote_duplicates = remote.duplicates.len();
        let desired_duplicates = desired.duplicates.len();

        let remote_index = keys.index(remote.table)?;
        let desired_index = keys.index(desired.table)?;
        let changes = diff(&remote_index, &desired_index, options.diff_options());

        Ok(SyncPlan {
            collection_id,
            schema,
            purge,
            changes,
            remote_rows,
            desired_rows,
            remote_duplicates,
            desired_duplicates,
        })
    }

    /// Bring `collection` to the state described by `desired`.
    pub async fn synchronize(
        &self,
        collection: &str,
        desired: &Table,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        let started = Instant::now();
        tracing::info!(
            "Synchronizing {} desired rows into '{}' on key [{}]",
            desired.len(),
            collection,
            options.key_columns.join(", ")
        );

        let plan = self.plan(collection, desired, options).await?;
        let applicator = Applicator::new(&self.store, &plan.collection_id)
            .with_schema(&plan.schema)
            .with_concurrency(options.concurrency);

        let purged = if plan.purge.is_empty() {
            Vec::new()
        } else {
            tracing::info!("Purging {} duplicated remote rows", plan.purge.len());
            applicator.apply(plan.purge.clone()).await
        };
        let changes = applicator.apply(plan.changes.clone()).await;

        let summary = SyncSummary::from_changes(&changes, &purged, started.elapsed());
        tracing::info!("Synchronized '{}': {}", collection, summary);
        Ok(SyncReport {
            collection_id: plan.collection_id,
            changes,
            purged,
            summary,
        })
    }

    /// Delete items by remote id.
    pub async fn delete_items(
        &self,
        collection: &str,
        remote_ids: &[String],
        concurrency: usize,
    ) -> Result<Vec<ChangeRecord>> {
        if remote_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(Error::validation("item ids must not be empty"));
        }
        let collection_id = self.collection_id(collection).await?;
        let deletes = remote_ids
            .iter()
            .map(|id| {
                let id = id.trim();
                ChangeRecord::delete(id, &Record::with_remote_id(id))
            })
            .collect();
        Ok(Applicator::new(&self.store, &collection_id)
            .with_concurrency(concurrency)
            .apply(deletes)
            .await)
    }

    /// Delete every item of a collection.
    pub async fn clear_collection(
        &self,
        collection: &str,
        concurrency: usize,
    ) -> Result<Vec<ChangeRecord>> {
        let collection_id = self.collection_id(collection).await?;
        let schema = self.schema(&collection_id).await?;
        let items = fetch_table(&self.store, &collection_id, &schema).await?;
        tracing::info!(
            "Deleting all {} items of collection '{}'",
            items.len(),
            collection
        );

        let deletes = items
            .records()
            .iter()
            .filter_map(|record| {
                record
                    .remote_id
                    .as_deref()
                    .map(|id| ChangeRecord::delete(id, record))
            })
            .collect();
        Ok(Applicator::new(&self.store, &collection_id)
            .with_concurrency(concurrency)
            .apply(deletes)
            .await)
    }
}

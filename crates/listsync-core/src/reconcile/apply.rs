//! Change applicator

use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{self, StreamExt};

use crate::models::{ChangeAction, ChangeRecord, ChangeStatus, Record};
use crate::remote::{RemoteError, RemoteResult, RemoteStore};
use crate::schema::Schema;

const PROGRESS_EVERY: usize = 500;

/// Dispatches change records to a remote store and records per-row outcomes.
///
/// A failed call marks its own row as failed; the remaining rows still run.
pub struct Applicator<'a, S: RemoteStore> {
    store: &'a S,
    collection_id: &'a str,
    schema: Option<&'a Schema>,
    concurrency: usize,
}

impl<'a, S: RemoteStore> Applicator<'a, S> {
    pub const fn new(store: &'a S, collection_id: &'a str) -> Self {
        Self {
            store,
            collection_id,
            schema: None,
            concurrency: 1,
        }
    }

    /// Format insert and update payloads through `schema` before writing.
    #[must_use]
    pub const fn with_schema(mut self, schema: &'a Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Remote calls kept in flight at once. Zero is treated as one.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Dispatch every pending change once and return them with statuses set.
    ///
    /// Output order matches input order regardless of concurrency. Records
    /// that are not pending are returned untouched.
    pub async fn apply(&self, mut changes: Vec<ChangeRecord>) -> Vec<ChangeRecord> {
        let pending = changes
            .iter()
            .filter(|change| change.status.is_pending())
            .count();
        if pending == 0 {
            return changes;
        }

        tracing::info!(
            "Applying {} changes to collection {} ({} in flight)",
            pending,
            self.collection_id,
            self.concurrency
        );
        let completed = AtomicUsize::new(0);

        let outcomes: Vec<(usize, RemoteResult<Option<String>>)> = stream::iter(
            changes
                .iter()
                .enumerate()
                .filter(|(_, change)| change.status.is_pending()),
        )
        .map(|(index, change)| {
            let completed = &completed;
            async move {
                let outcome = self.dispatch(change).await;
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % PROGRESS_EVERY == 0 {
                    tracing::info!("Processed {} of {} changes", done, pending);
                }
                (index, outcome)
            }
        })
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        let mut failed = 0_usize;
        for (index, outcome) in outcomes {
            let change = &mut changes[index];
            match outcome {
                Ok(created_id) => {
                    if created_id.is_some() {
                        change.remote_id = created_id;
                    }
                    change.status = ChangeStatus::Succeeded;
                }
                Err(error) => {
                    failed += 1;
                    tracing::warn!("{} of {} failed: {}", change.action, change.key, error);
                    change.status = ChangeStatus::Failed {
                        message: error.to_string(),
                    };
                }
            }
        }

        tracing::info!(
            "Applied {} changes to collection {}: {} succeeded, {} failed",
            pending,
            self.collection_id,
            pending - failed,
            failed
        );
        changes
    }

    /// One remote call. Inserts yield the new remote id.
    async fn dispatch(&self, change: &ChangeRecord) -> RemoteResult<Option<String>> {
        tracing::debug!("{} {}", change.action, change.key);
        match change.action {
            ChangeAction::Insert => {
                let payload = self.payload(change)?;
                self.store
                    .create(self.collection_id, &payload)
                    .await
                    .map(Some)
            }
            ChangeAction::Update => {
                let remote_id = required_remote_id(change)?;
                let payload = self.payload(change)?;
                self.store
                    .update(self.collection_id, remote_id, &payload)
                    .await?;
                Ok(None)
            }
            ChangeAction::Delete => {
                let remote_id = required_remote_id(change)?;
                self.store.delete(self.collection_id, remote_id).await?;
                Ok(None)
            }
        }
    }

    fn payload(&self, change: &ChangeRecord) -> RemoteResult<Record> {
        match self.schema {
            Some(schema) => schema
                .to_remote_record(&change.fields)
                .map_err(RemoteError::InvalidRecord),
            None => Ok(change.record()),
        }
    }
}

fn required_remote_id(change: &ChangeRecord) -> RemoteResult<&str> {
    change
        .remote_id
        .as_deref()
        .filter(|remote_id| !remote_id.trim().is_empty())
        .ok_or_else(|| {
            RemoteError::InvalidRecord(format!(
                "{} of '{}' has no remote id",
                change.action, change.key
            ))
        })
}

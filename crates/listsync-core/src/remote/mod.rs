//! Remote store client abstraction and its implementations.

mod auth;
mod graph;
mod memory;

use std::future::Future;

use serde::Serialize;
use thiserror::Error;

use crate::error::{Error, Result};
use crate::models::{Record, Table};
use crate::schema::{DeclaredType, Schema};
use crate::util::compact_text;

pub use auth::{AccessToken, ClientCredentialsAuth, TokenProvider};
pub use graph::GraphListClient;
pub use memory::{MemoryStore, RemoteCall};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {message} ({status})")]
    Api { status: u16, message: String },
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Unexpected response payload: {0}")]
    InvalidPayload(String),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// A list on the remote site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
}

/// A column as reported by the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteField {
    /// Internal column name.
    pub name_id: String,
    /// Display name.
    pub name: String,
    pub read_only: bool,
    pub declared_type: DeclaredType,
}

/// One page of items, keyed by internal column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    pub next_cursor: Option<String>,
}

/// Operations a synchronization needs from the remote store.
///
/// Implementations own authentication and may re-authenticate between
/// calls; callers never see token lifetimes.
pub trait RemoteStore: Send + Sync {
    fn fetch_collections(&self) -> impl Future<Output = RemoteResult<Vec<Collection>>> + Send;

    fn fetch_fields(
        &self,
        collection_id: &str,
    ) -> impl Future<Output = RemoteResult<Vec<RemoteField>>> + Send;

    /// Fetch one page of items restricted to `fields` (internal names).
    ///
    /// `cursor` is `None` for the first page and otherwise the previous
    /// page's `next_cursor`.
    fn fetch_page(
        &self,
        collection_id: &str,
        fields: &[String],
        cursor: Option<&str>,
    ) -> impl Future<Output = RemoteResult<Page>> + Send;

    /// Create an item and return its new remote identifier.
    fn create(
        &self,
        collection_id: &str,
        record: &Record,
    ) -> impl Future<Output = RemoteResult<String>> + Send;

    fn update(
        &self,
        collection_id: &str,
        remote_id: &str,
        record: &Record,
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    fn delete(
        &self,
        collection_id: &str,
        remote_id: &str,
    ) -> impl Future<Output = RemoteResult<()>> + Send;
}

/// Build an API error from a failed response, preferring the structured
/// message of Graph (`error.message`) or OAuth (`error_description`) bodies.
fn api_error(status: reqwest::StatusCode, body: &str) -> RemoteError {
    let structured = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|payload| {
            payload
                .pointer("/error/message")
                .or_else(|| payload.get("error_description"))
                .or_else(|| payload.get("message"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        });
    let message = compact_text(structured.as_deref().unwrap_or(body));
    RemoteError::Api {
        status: status.as_u16(),
        message: if message.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            message
        },
    }
}

/// Read every item of a collection into a table named by the schema's
/// display names.
pub async fn fetch_table<S: RemoteStore>(
    store: &S,
    collection_id: &str,
    schema: &Schema,
) -> Result<Table> {
    let fields = schema.remote_names();
    let mut table = Table::new(schema.local_names());
    let mut cursor: Option<String> = None;
    let mut pages = 0_usize;

    loop {
        let page = store
            .fetch_page(collection_id, &fields, cursor.as_deref())
            .await?;
        pages += 1;
        for record in page.records {
            table.push(schema.rename_from_remote(record));
        }

        match page.next_cursor {
            Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                return Err(RemoteError::InvalidPayload(format!(
                    "page cursor did not advance after {pages} pages"
                ))
                .into());
            }
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    tracing::info!(
        "Fetched {} items from collection {} in {} pages",
        table.len(),
        collection_id,
        pages
    );
    Ok(table)
}

/// Find a collection id by display name, ignoring case and surrounding space.
pub async fn resolve_collection_id<S: RemoteStore>(store: &S, name: &str) -> Result<String> {
    let wanted = name.trim();
    if wanted.is_empty() {
        return Err(Error::validation("collection name must not be empty"));
    }

    store
        .fetch_collections()
        .await?
        .into_iter()
        .find(|collection| collection.name.trim().eq_ignore_ascii_case(wanted))
        .map(|collection| collection.id)
        .ok_or_else(|| Error::validation(format!("collection '{wanted}' was not found")))
}

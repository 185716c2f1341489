//! In-memory remote store, used to exercise the engine without a live site.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::{Collection, Page, RemoteError, RemoteField, RemoteResult, RemoteStore};
use crate::models::{ChangeAction, Record};

const DEFAULT_PAGE_SIZE: usize = 100;

/// A call received by a [`MemoryStore`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    FetchCollections,
    FetchFields {
        collection_id: String,
    },
    FetchPage {
        collection_id: String,
        cursor: Option<String>,
    },
    Create {
        collection_id: String,
    },
    Update {
        collection_id: String,
        remote_id: String,
    },
    Delete {
        collection_id: String,
        remote_id: String,
    },
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    action: ChangeAction,
    remote_id: Option<String>,
}

impl InjectedFailure {
    fn matches(&self, action: ChangeAction, remote_id: Option<&str>) -> bool {
        self.action == action
            && self
                .remote_id
                .as_deref()
                .map_or(true, |expected| Some(expected) == remote_id)
    }
}

#[derive(Debug, Default)]
struct StoredCollection {
    name: String,
    fields: Vec<RemoteField>,
    items: Vec<Record>,
}

#[derive(Debug, Default)]
struct Inner {
    collections: BTreeMap<String, StoredCollection>,
    next_id: u64,
    failures: Vec<InjectedFailure>,
    calls: Vec<RemoteCall>,
}

impl Inner {
    fn collection(&mut self, collection_id: &str) -> RemoteResult<&mut StoredCollection> {
        self.collections
            .get_mut(collection_id)
            .ok_or_else(|| RemoteError::NotFound(format!("collection {collection_id}")))
    }

    fn check_failure(&self, action: ChangeAction, remote_id: Option<&str>) -> RemoteResult<()> {
        if self
            .failures
            .iter()
            .any(|failure| failure.matches(action, remote_id))
        {
            return Err(RemoteError::Api {
                status: 500,
                message: format!("injected {action} failure"),
            });
        }
        Ok(())
    }
}

/// In-memory remote store with sequential item ids, paging, failure
/// injection and a call log.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    page_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub async fn add_collection(&self, collection_id: &str, name: &str) {
        let mut inner = self.inner.lock().await;
        inner.collections.insert(
            collection_id.to_string(),
            StoredCollection {
                name: name.to_string(),
                ..StoredCollection::default()
            },
        );
    }

    pub async fn set_fields(&self, collection_id: &str, fields: Vec<RemoteField>) {
        let mut inner = self.inner.lock().await;
        if let Ok(collection) = inner.collection(collection_id) {
            collection.fields = fields;
        }
    }

    /// Store an item directly, bypassing the call log. Returns its id.
    pub async fn seed(&self, collection_id: &str, record: Record) -> String {
        let mut inner = self.inner.lock().await;
        let remote_id = next_id(&mut inner);
        if let Ok(collection) = inner.collection(collection_id) {
            collection.items.push(Record {
                remote_id: Some(remote_id.clone()),
                ..record
            });
        }
        remote_id
    }

    /// Make calls of `action` fail, for one remote id or for all of them.
    pub async fn fail_on(&self, action: ChangeAction, remote_id: Option<&str>) {
        self.inner.lock().await.failures.push(InjectedFailure {
            action,
            remote_id: remote_id.map(str::to_string),
        });
    }

    pub async fn items(&self, collection_id: &str) -> Vec<Record> {
        self.inner
            .lock()
            .await
            .collections
            .get(collection_id)
            .map(|collection| collection.items.clone())
            .unwrap_or_default()
    }

    pub async fn calls(&self) -> Vec<RemoteCall> {
        self.inner.lock().await.calls.clone()
    }

    /// Calls that would change remote state.
    pub async fn mutations(&self) -> Vec<RemoteCall> {
        self.calls()
            .await
            .into_iter()
            .filter(|call| {
                matches!(
                    call,
                    RemoteCall::Create { .. } | RemoteCall::Update { .. } | RemoteCall::Delete { .. }
                )
            })
            .collect()
    }
}

fn next_id(inner: &mut Inner) -> String {
    inner.next_id += 1;
    inner.next_id.to_string()
}

impl RemoteStore for MemoryStore {
    async fn fetch_collections(&self) -> RemoteResult<Vec<Collection>> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(RemoteCall::FetchCollections);
        Ok(inner
            .collections
            .iter()
            .map(|(id, collection)| Collection {
                id: id.clone(),
                name: collection.name.clone(),
            })
            .collect())
    }

    async fn fetch_fields(&self, collection_id: &str) -> RemoteResult<Vec<RemoteField>> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(RemoteCall::FetchFields {
            collection_id: collection_id.to_string(),
        });
        Ok(inner.collection(collection_id)?.fields.clone())
    }

    async fn fetch_page(
        &self,
        collection_id: &str,
        fields: &[String],
        cursor: Option<&str>,
    ) -> RemoteResult<Page> {
        let page_size = self.page_size;
        let mut inner = self.inner.lock().await;
        inner.calls.push(RemoteCall::FetchPage {
            collection_id: collection_id.to_string(),
            cursor: cursor.map(str::to_string),
        });

        let offset = match cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| RemoteError::InvalidPayload(format!("bad cursor '{cursor}'")))?,
            None => 0,
        };
        let items = &inner.collection(collection_id)?.items;
        let records = items
            .iter()
            .skip(offset)
            .take(page_size)
            .map(|record| record.project(fields))
            .collect();
        let end = offset + page_size;
        Ok(Page {
            records,
            next_cursor: (end < items.len()).then(|| end.to_string()),
        })
    }

    async fn create(&self, collection_id: &str, record: &Record) -> RemoteResult<String> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(RemoteCall::Create {
            collection_id: collection_id.to_string(),
        });
        inner.check_failure(ChangeAction::Insert, None)?;
        inner.collection(collection_id)?;

        let remote_id = next_id(&mut inner);
        inner.collection(collection_id)?.items.push(Record {
            remote_id: Some(remote_id.clone()),
            fields: record.fields.clone(),
        });
        Ok(remote_id)
    }

    async fn update(&self, collection_id: &str, remote_id: &str, record: &Record) -> RemoteResult<()> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(RemoteCall::Update {
            collection_id: collection_id.to_string(),
            remote_id: remote_id.to_string(),
        });
        inner.check_failure(ChangeAction::Update, Some(remote_id))?;

        let item = inner
            .collection(collection_id)?
            .items
            .iter_mut()
            .find(|item| item.remote_id.as_deref() == Some(remote_id))
            .ok_or_else(|| RemoteError::NotFound(format!("item {remote_id}")))?;
        for (name, value) in &record.fields {
            item.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete(&self, collection_id: &str, remote_id: &str) -> RemoteResult<()> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(RemoteCall::Delete {
            collection_id: collection_id.to_string(),
            remote_id: remote_id.to_string(),
        });
        inner.check_failure(ChangeAction::Delete, Some(remote_id))?;

        let items = &mut inner.collection(collection_id)?.items;
        let position = items
            .iter()
            .position(|item| item.remote_id.as_deref() == Some(remote_id))
            .ok_or_else(|| RemoteError::NotFound(format!("item {remote_id}")))?;
        items.remove(position);
        Ok(())
    }
}

//! Change records produced by the differ and annotated by the applicator

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Record, Value};

/// Remote mutation a change record asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

impl ChangeAction {
    /// Single-letter code (`I`, `U`, `D`) used in compact reports.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Insert => 'I',
            Self::Update => 'U',
            Self::Delete => 'D',
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of dispatching one change record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChangeStatus {
    /// Not dispatched yet
    #[default]
    Pending,
    /// The remote call succeeded
    Succeeded,
    /// The remote call failed; the rest of the batch still ran
    Failed { message: String },
}

impl ChangeStatus {
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}

/// One classified pending mutation of a single synchronization run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    pub key: String,
    pub action: ChangeAction,
    /// Desired values for inserts and updates, remote values for deletes.
    pub fields: BTreeMap<String, Value>,
    pub remote_id: Option<String>,
    pub status: ChangeStatus,
}

impl ChangeRecord {
    #[must_use]
    pub fn insert(key: impl Into<String>, desired: &Record) -> Self {
        Self::pending(key.into(), ChangeAction::Insert, desired.fields.clone(), None)
    }

    /// Update carrying the desired values and the remote row's identifier.
    #[must_use]
    pub fn update(key: impl Into<String>, desired: &Record, remote: &Record) -> Self {
        Self::pending(
            key.into(),
            ChangeAction::Update,
            desired.fields.clone(),
            remote.remote_id.clone(),
        )
    }

    #[must_use]
    pub fn delete(key: impl Into<String>, remote: &Record) -> Self {
        Self::pending(
            key.into(),
            ChangeAction::Delete,
            remote.fields.clone(),
            remote.remote_id.clone(),
        )
    }

    const fn pending(
        key: String,
        action: ChangeAction,
        fields: BTreeMap<String, Value>,
        remote_id: Option<String>,
    ) -> Self {
        Self {
            key,
            action,
            fields,
            remote_id,
            status: ChangeStatus::Pending,
        }
    }

    /// The record this change writes, keyed by local field names.
    #[must_use]
    pub fn record(&self) -> Record {
        Record {
            remote_id: self.remote_id.clone(),
            fields: self.fields.clone(),
        }
    }
}

//! Data models for listsync

mod change;
mod record;
mod value;

pub use change::{ChangeAction, ChangeRecord, ChangeStatus};
pub use record::{KeyedTable, Record, Table};
pub use value::Value;

//! Reconciliation engine
//!
//! Data flow for one run: [`KeyBuilder`] (primary keys) →
//! [`resolve_duplicates`] → [`KeyBuilder::index`] → [`diff`] (using
//! [`rows_differ`]) → [`Applicator`].

mod apply;
mod detect;
mod diff;
mod duplicates;
mod key;
mod numeric;

pub use apply::Applicator;
pub use detect::{differing_fields, rows_differ};
pub use diff::{diff, partition_keys, DiffOptions, KeyPartition};
pub use duplicates::{resolve_duplicates, DuplicateResolution};
pub use key::{build_key, KeyBuilder, KEY_SEPARATOR};

//! Three-way differ

use std::collections::BTreeMap;

use super::detect::{differing_fields, rows_differ};
use super::numeric::{strip_integral_suffix, NumericProfile};
use crate::models::{ChangeRecord, KeyedTable, Record};

/// Which action classes the differ may emit. Updates are always emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    pub allow_delete: bool,
    pub allow_insert: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            allow_delete: true,
            allow_insert: true,
        }
    }
}

/// Disjoint split of the keys of two indexed tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPartition {
    pub remote_only: Vec<String>,
    pub desired_only: Vec<String>,
    pub common: Vec<String>,
}

pub fn partition_keys(remote: &KeyedTable, desired: &KeyedTable) -> KeyPartition {
    let mut partition = KeyPartition::default();
    for key in remote.keys() {
        if desired.contains_key(key) {
            partition.common.push(key.to_string());
        } else {
            partition.remote_only.push(key.to_string());
        }
    }
    partition.desired_only = desired
        .keys()
        .filter(|key| !remote.contains_key(key))
        .map(str::to_string)
        .collect();
    partition
}

/// Compare the remote state with the desired state and emit the change set.
///
/// Output order is inserts, then updates, then deletes; each group is in key
/// order. Keys whose common fields all agree produce no record.
pub fn diff(remote: &KeyedTable, desired: &KeyedTable, options: DiffOptions) -> Vec<ChangeRecord> {
    let partition = partition_keys(remote, desired);
    let common_fields: Vec<String> = remote
        .fields()
        .iter()
        .filter(|field| desired.fields().contains(field))
        .cloned()
        .collect();
    let coercion = Coercion::from_remote(remote, &common_fields);

    let mut changes = Vec::new();

    if options.allow_insert {
        for key in &partition.desired_only {
            if let Some(record) = desired.get(key) {
                changes.push(ChangeRecord::insert(key.clone(), record));
            }
        }
    }

    for key in &partition.common {
        let (Some(remote_record), Some(desired_record)) = (remote.get(key), desired.get(key))
        else {
            continue;
        };
        let remote_row = coercion.row(remote_record);
        let desired_row = coercion.row(desired_record);
        if rows_differ(&remote_row, &desired_row) {
            tracing::debug!(
                "Key {} changed in fields: {}",
                key,
                differing_fields(&remote_row, &desired_row).join(", ")
            );
            changes.push(ChangeRecord::update(
                key.clone(),
                desired_record,
                remote_record,
            ));
        }
    }

    if options.allow_delete {
        for key in &partition.remote_only {
            if let Some(record) = remote.get(key) {
                changes.push(ChangeRecord::delete(key.clone(), record));
            }
        }
    }

    tracing::info!(
        "Diff: {} remote keys, {} desired keys, {} common, {} changes",
        remote.len(),
        desired.len(),
        partition.common.len(),
        changes.len()
    );

    changes
}

/// Uniform string coercion over the common field set.
///
/// A column is `.0`-stripped on both sides when the remote side shows
/// float-formatted integers and no genuine fraction.
struct Coercion {
    columns: Vec<(String, bool)>,
}

impl Coercion {
    fn from_remote(remote: &KeyedTable, fields: &[String]) -> Self {
        let columns = fields
            .iter()
            .map(|field| {
                let profile = NumericProfile::of(
                    remote.iter().map(|(_, record)| record.canonical(field)),
                );
                (field.clone(), profile.strips_for_comparison())
            })
            .collect();
        Self { columns }
    }

    fn row(&self, record: &Record) -> BTreeMap<String, String> {
        self.columns
            .iter()
            .map(|(field, strip)| {
                let value = record.canonical(field);
                let value = if *strip {
                    strip_integral_suffix(&value)
                } else {
                    value
                };
                (field.clone(), value)
            })
            .collect()
    }
}

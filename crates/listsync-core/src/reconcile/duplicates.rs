//! Duplicate primary-key resolution

use std::collections::HashMap;

use super::KeyBuilder;
use crate::error::Result;
use crate::models::{Record, Table};

/// A table split into uniquely-keyed rows and every row of a repeated key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DuplicateResolution {
    pub table: Table,
    /// All occurrences of each repeated key, paired with that key.
    pub duplicates: Vec<(String, Record)>,
}

impl DuplicateResolution {
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        !self.duplicates.is_empty()
    }

    /// Remote identifiers of the dropped rows, for purging them remotely.
    #[must_use]
    pub fn duplicate_remote_ids(&self) -> Vec<String> {
        self.duplicates
            .iter()
            .filter_map(|(_, record)| record.remote_id.clone())
            .collect()
    }
}

/// Drop every row whose key occurs more than once.
///
/// All occurrences are dropped, not just the extras: keeping one arbitrary
/// copy could silently pick the wrong one. An empty table is returned as is.
pub fn resolve_duplicates(table: Table, keys: &KeyBuilder) -> Result<DuplicateResolution> {
    if table.is_empty() {
        return Ok(DuplicateResolution {
            table,
            duplicates: Vec::new(),
        });
    }

    let fields = table.fields().to_vec();
    let mut keyed = Vec::with_capacity(table.len());
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    for record in table.into_records() {
        let key = keys.build_key(&record)?;
        *occurrences.entry(key.clone()).or_default() += 1;
        keyed.push((key, record));
    }

    let mut kept = Table::new(fields);
    let mut duplicates = Vec::new();
    for (key, record) in keyed {
        if occurrences.get(&key).copied().unwrap_or_default() > 1 {
            duplicates.push((key, record));
        } else {
            kept.push(record);
        }
    }

    if !duplicates.is_empty() {
        tracing::warn!(
            "Dropping {} rows sharing {} duplicated keys",
            duplicates.len(),
            occurrences.values().filter(|count| **count > 1).count()
        );
    }

    Ok(DuplicateResolution {
        table: kept,
        duplicates,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn person(id: &str, first: &str, last: &str) -> Record {
        Record::with_remote_id(id)
            .with("nombre", first)
            .with("apellido", last)
    }

    fn builder(table: &Table) -> KeyBuilder {
        KeyBuilder::for_tables(&["nombre", "apellido"], &[table]).unwrap()
    }

    fn assert_unique(table: &Table, keys: &KeyBuilder) {
        let mut seen = HashSet::new();
        for record in table.records() {
            assert!(seen.insert(keys.build_key(record).unwrap()));
        }
    }

    #[test]
    fn drops_every_occurrence_of_a_repeated_key() {
        let table = Table::from_records(vec![
            person("1", "Pedro", "Lopez"),
            person("2", "Pedro", "Lopez"),
            person("3", "Ana", "Garcia"),
        ]);
        let keys = builder(&table);
        let resolved = resolve_duplicates(table, &keys).unwrap();

        assert_eq!(resolved.table.len(), 1);
        assert_eq!(resolved.table.records()[0].canonical("nombre"), "Ana");
        assert_eq!(resolved.duplicate_remote_ids(), ["1", "2"]);
        assert!(resolved
            .duplicates
            .iter()
            .all(|(key, _)| key == "Pedro-Lopez"));
    }

    #[test]
    fn fully_duplicated_table_resolves_to_empty() {
        let table = Table::from_records(vec![
            person("1", "Pedro", "Lopez"),
            person("2", "Pedro", "Lopez"),
        ]);
        let keys = builder(&table);
        let resolved = resolve_duplicates(table, &keys).unwrap();

        assert!(resolved.table.is_empty());
        assert_eq!(resolved.table.fields(), ["apellido", "nombre"]);
        assert_eq!(resolved.duplicates.len(), 2);
    }

    #[test]
    fn unique_table_is_unchanged() {
        let table = Table::from_records(vec![
            person("1", "Pedro", "Lopez"),
            person("2", "Luis", "Martinez"),
        ]);
        let keys = builder(&table);
        let resolved = resolve_duplicates(table.clone(), &keys).unwrap();

        assert!(!resolved.has_duplicates());
        assert_eq!(resolved.table, table);
        assert_unique(&resolved.table, &keys);
    }

    #[test]
    fn empty_table_is_a_no_op() {
        let keys = KeyBuilder::new(&["nombre"]).unwrap();
        let resolved = resolve_duplicates(Table::default(), &keys).unwrap();
        assert!(resolved.table.is_empty());
        assert!(!resolved.has_duplicates());
    }

    #[test]
    fn float_formatted_integers_count_as_duplicates() {
        let table = Table::from_records(vec![
            Record::with_remote_id("1").with("doc", "7"),
            Record::with_remote_id("2").with("doc", "7.0"),
            Record::with_remote_id("3").with("doc", "8"),
        ]);
        let keys = KeyBuilder::for_tables(&["doc"], &[&table]).unwrap();
        let resolved = resolve_duplicates(table, &keys).unwrap();

        assert_eq!(resolved.table.len(), 1);
        assert_eq!(resolved.duplicate_remote_ids(), ["1", "2"]);
        assert_unique(&resolved.table, &keys);
    }
}

//! Row-level change detection

use std::collections::BTreeMap;

/// Whether any same-named field differs between two coerced rows.
///
/// A field absent on one side compares as `""`, so a missing field only
/// counts as a change when the other side has a non-empty value.
pub fn rows_differ(remote: &BTreeMap<String, String>, desired: &BTreeMap<String, String>) -> bool {
    remote
        .keys()
        .chain(desired.keys())
        .any(|name| field(remote, name) != field(desired, name))
}

/// Names of the fields that differ, in name order.
pub fn differing_fields(
    remote: &BTreeMap<String, String>,
    desired: &BTreeMap<String, String>,
) -> Vec<String> {
    let mut names: Vec<&String> = remote.keys().chain(desired.keys()).collect();
    names.sort();
    names.dedup();
    names
        .into_iter()
        .filter(|name| field(remote, name) != field(desired, name))
        .cloned()
        .collect()
}

fn field<'a>(row: &'a BTreeMap<String, String>, name: &str) -> &'a str {
    row.get(name).map_or("", String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn identical_rows_do_not_differ() {
        let remote = row(&[("edad", "30"), ("ciudad", "Lima")]);
        assert!(!rows_differ(&remote, &remote.clone()));
    }

    #[test]
    fn single_mismatch_is_detected() {
        let remote = row(&[("edad", "30"), ("ciudad", "Lima")]);
        let desired = row(&[("edad", "31"), ("ciudad", "Lima")]);
        assert!(rows_differ(&remote, &desired));
        assert_eq!(differing_fields(&remote, &desired), ["edad"]);
    }

    #[test]
    fn missing_field_equals_empty_string() {
        let remote = row(&[("edad", "30"), ("nota", "")]);
        let desired = row(&[("edad", "30")]);
        assert!(!rows_differ(&remote, &desired));
        assert!(!rows_differ(&desired, &remote));
    }

    #[test]
    fn missing_field_against_value_differs() {
        let remote = row(&[("edad", "30")]);
        let desired = row(&[("edad", "30"), ("nota", "vip")]);
        assert!(rows_differ(&remote, &desired));
        assert_eq!(differing_fields(&remote, &desired), ["nota"]);
    }
}

//! Detection and removal of float-formatted integers (`7.0`).

use std::sync::LazyLock;

use regex::Regex;

static GENUINE_FRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\d*[1-9]").expect("Invalid regex"));

static INTEGRAL_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(-?\d+)\.0+$").expect("Invalid regex"));

/// What a column's canonical strings look like numerically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NumericProfile {
    /// Some value has a non-zero digit after the decimal point.
    pub genuine_fraction: bool,
    /// Some value is an integer written with a trailing `.0`.
    pub integral_suffix: bool,
}

impl NumericProfile {
    pub fn observe(&mut self, value: &str) {
        if GENUINE_FRACTION.is_match(value) {
            self.genuine_fraction = true;
        }
        if INTEGRAL_SUFFIX.is_match(value) {
            self.integral_suffix = true;
        }
    }

    pub fn of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut profile = Self::default();
        for value in values {
            profile.observe(value.as_ref());
        }
        profile
    }

    /// Key columns: strip unless the column holds a real fractional value.
    pub const fn strips_for_key(self) -> bool {
        !self.genuine_fraction
    }

    /// Compared columns: strip only when `.0` integers appear and no real fraction does.
    pub const fn strips_for_comparison(self) -> bool {
        !self.genuine_fraction && self.integral_suffix
    }
}

/// `"7.0"` → `"7"`; any other string is returned unchanged.
pub fn strip_integral_suffix(value: &str) -> String {
    INTEGRAL_SUFFIX.replace(value, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_flags_genuine_fractions() {
        assert!(NumericProfile::of(["7.5"]).genuine_fraction);
        assert!(NumericProfile::of(["7.05"]).genuine_fraction);
        assert!(!NumericProfile::of(["7.0", "8"]).genuine_fraction);
    }

    #[test]
    fn profile_flags_integral_suffix() {
        let profile = NumericProfile::of(["7.0", "abc"]);
        assert!(profile.integral_suffix);
        assert!(profile.strips_for_key());
        assert!(profile.strips_for_comparison());

        let mixed = NumericProfile::of(["7.0", "7.2"]);
        assert!(!mixed.strips_for_key());
        assert!(!mixed.strips_for_comparison());
    }

    #[test]
    fn strip_only_touches_numeric_strings() {
        assert_eq!(strip_integral_suffix("7.0"), "7");
        assert_eq!(strip_integral_suffix("-12.00"), "-12");
        assert_eq!(strip_integral_suffix("v7.0"), "v7.0");
        assert_eq!(strip_integral_suffix("100"), "100");
        assert_eq!(strip_integral_suffix("7.01"), "7.01");
    }
}

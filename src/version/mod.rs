//! Loose ordering for dotted version strings.
//!
//! Platform and package versions in a universe repository are free-form
//! dotted strings ("1.9", "1.10", "2.0.0"). They are not semver: components
//! compare as integers when both sides are numeric, so "1.9" < "1.10".

use std::cmp::Ordering;
use std::fmt;

/// A dotted version string split into comparable components.
///
/// Components that parse as integers compare numerically; everything else
/// compares as text. A numeric component orders before a textual one at the
/// same position. When one version is a prefix of the other, the shorter
/// version orders first ("1.8" < "1.8.1").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LooseVersion {
    raw: String,
    components: Vec<Component>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Component {
    Number(u64),
    Text(String),
}

impl Component {
    fn cmp(&self, other: &Component) -> Ordering {
        match (self, other) {
            (Component::Number(a), Component::Number(b)) => a.cmp(b),
            (Component::Text(a), Component::Text(b)) => a.cmp(b),
            (Component::Number(_), Component::Text(_)) => Ordering::Less,
            (Component::Text(_), Component::Number(_)) => Ordering::Greater,
        }
    }
}

impl LooseVersion {
    pub fn new(raw: &str) -> Self {
        let components = raw
            .split('.')
            .map(|part| match part.parse::<u64>() {
                Ok(n) => Component::Number(n),
                Err(_) => Component::Text(part.to_string()),
            })
            .collect();
        LooseVersion {
            raw: raw.to_string(),
            components,
        }
    }

    /// The version packages without a declared minimum are treated as.
    pub fn zero() -> Self {
        LooseVersion::new("0.0")
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl From<&str> for LooseVersion {
    fn from(raw: &str) -> Self {
        LooseVersion::new(raw)
    }
}

impl Ord for LooseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.components.iter().zip(other.components.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        self.components.len().cmp(&other.components.len())
    }
}

impl PartialOrd for LooseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LooseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_components_compare_as_integers() {
        assert!(LooseVersion::new("1.9") < LooseVersion::new("1.10"));
        assert!(LooseVersion::new("1.10") < LooseVersion::new("1.11"));
        assert!(LooseVersion::new("2.0") > LooseVersion::new("1.11"));
    }

    #[test]
    fn test_equal_versions() {
        assert_eq!(LooseVersion::new("1.9"), LooseVersion::new("1.9"));
        assert_eq!(
            LooseVersion::new("1.9").cmp(&LooseVersion::new("1.9")),
            Ordering::Equal
        );
    }

    #[test]
    fn test_prefix_orders_first() {
        assert!(LooseVersion::new("1.8") < LooseVersion::new("1.8.1"));
        assert!(LooseVersion::new("1.6.1") > LooseVersion::new("1.6"));
    }

    #[test]
    fn test_textual_component_falls_back_to_string_comparison() {
        assert!(LooseVersion::new("1.0.beta") < LooseVersion::new("1.0.rc"));
        // A numeric component orders before a textual one.
        assert!(LooseVersion::new("1.0.1") < LooseVersion::new("1.0.beta"));
    }

    #[test]
    fn test_zero_is_less_or_equal_to_everything() {
        assert!(LooseVersion::zero() <= LooseVersion::new("1.6.1"));
        assert!(LooseVersion::zero() <= LooseVersion::new("0.0"));
    }

    #[test]
    fn test_display_round_trips_raw_string() {
        assert_eq!(LooseVersion::new("1.10").to_string(), "1.10");
    }
}

//! Package data model.
//!
//! A package is an open mapping of JSON fields. Only a handful of fields
//! carry engine semantics (identity, compatibility, the packaging-version
//! tag); everything else passes through transformations untouched, so the
//! model wraps a raw JSON object instead of an exhaustive struct.

mod store;

pub use store::{enumerate_packages, load_package, load_repository, package_dir};

use serde_json::{Map, Value};
use std::fmt;

use crate::version::LooseVersion;

/// A schema generation of the repository document shape.
///
/// V2 is the legacy zip-directory layout; V3 through V5 are the JSON
/// layouts. Downgrades step strictly one generation at a time and are driven
/// by each package's own `packagingVersion` tag, never by content shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Generation {
    V2,
    V3,
    V4,
    V5,
}

impl Generation {
    pub const LATEST: Generation = Generation::V5;

    /// Tag used in content types and Accept headers, e.g. "v4".
    pub fn tag(self) -> &'static str {
        match self {
            Generation::V2 => "v2",
            Generation::V3 => "v3",
            Generation::V4 => "v4",
            Generation::V5 => "v5",
        }
    }

    /// Value of the `packagingVersion` field for packages of this generation.
    pub fn packaging_version(self) -> &'static str {
        match self {
            Generation::V2 => "2.0",
            Generation::V3 => "3.0",
            Generation::V4 => "4.0",
            Generation::V5 => "5.0",
        }
    }

    pub fn from_number(n: u32) -> Option<Generation> {
        match n {
            2 => Some(Generation::V2),
            3 => Some(Generation::V3),
            4 => Some(Generation::V4),
            5 => Some(Generation::V5),
            _ => None,
        }
    }

    pub fn from_tag(tag: &str) -> Option<Generation> {
        match tag {
            "v2" => Some(Generation::V2),
            "v3" => Some(Generation::V3),
            "v4" => Some(Generation::V4),
            "v5" => Some(Generation::V5),
            _ => None,
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One package release, as read from the package store.
///
/// Cloning a `Package` is a deep copy; every downgrade step works on a clone
/// so the source value stays intact for other target generations.
#[derive(Debug, Clone, PartialEq)]
pub struct Package(Map<String, Value>);

impl Package {
    pub fn new(fields: Map<String, Value>) -> Self {
        Package(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.0.get("version").and_then(Value::as_str)
    }

    pub fn release_version(&self) -> Option<u64> {
        self.0.get("releaseVersion").and_then(Value::as_u64)
    }

    pub fn packaging_version(&self) -> Option<&str> {
        self.0.get("packagingVersion").and_then(Value::as_str)
    }

    /// Declared minimum platform version; absent means always compatible.
    pub fn min_platform_version(&self) -> LooseVersion {
        self.0
            .get("minDcosReleaseVersion")
            .and_then(Value::as_str)
            .map(LooseVersion::new)
            .unwrap_or_else(LooseVersion::zero)
    }
}

impl From<Package> for Value {
    fn from(package: Package) -> Value {
        package.into_value()
    }
}

#[cfg(test)]
pub(crate) fn package_from_json(json: &str) -> Package {
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(fields)) => Package::new(fields),
        _ => panic!("test package must be a JSON object"),
    }
}

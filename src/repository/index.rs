//! Index construction for the legacy repository layout.
//!
//! The index lists one entry per distinct package name. Entries are built by
//! folding over that name's releases in input order: scalar fields take the
//! value of the release processed last (last write wins, not highest
//! version), while the `versions` map accumulates every release seen.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};

use super::group_by_name;
use crate::package::Package;

/// Version stamp of the legacy repository layout itself.
pub const INDEX_VERSION: &str = "2.0.0";

#[derive(Debug, Serialize)]
pub struct Index {
    pub version: String,
    pub packages: Vec<IndexEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub name: String,
    pub current_version: String,
    pub description: String,
    pub framework: bool,
    pub tags: Vec<String>,
    pub selected: bool,
    /// Maps each package version string to its release version.
    pub versions: Map<String, Value>,
}

/// Build the index for a name-sorted slice of packages.
pub fn create_index(packages: &[Package]) -> Result<Index> {
    let packages = group_by_name(packages)
        .into_iter()
        .map(|(_, group)| create_index_entry(&group))
        .collect::<Result<Vec<_>>>()?;

    Ok(Index {
        version: INDEX_VERSION.to_string(),
        packages,
    })
}

fn create_index_entry(group: &[&Package]) -> Result<IndexEntry> {
    let mut entry: Option<IndexEntry> = None;
    let mut versions = Map::new();

    for package in group {
        let name = required_str(package, "name")?;
        let version = required_str(package, "version")?;
        let release_version = package
            .release_version()
            .with_context(|| format!("package {name} has no releaseVersion"))?;

        versions.insert(version.clone(), release_version.to_string().into());

        entry = Some(IndexEntry {
            name,
            current_version: version,
            description: required_str(package, "description")?,
            framework: flag(package, "framework"),
            tags: tags(package)?,
            selected: flag(package, "selected"),
            versions: Map::new(),
        });
    }

    let mut entry = entry.context("cannot index an empty package group")?;
    entry.versions = versions;
    Ok(entry)
}

fn required_str(package: &Package, field: &str) -> Result<String> {
    package
        .fields()
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .with_context(|| {
            format!(
                "package {} is missing the {} field required by the index",
                package.name().unwrap_or("<unnamed>"),
                field
            )
        })
}

fn flag(package: &Package, field: &str) -> bool {
    package
        .fields()
        .get(field)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn tags(package: &Package) -> Result<Vec<String>> {
    let value = package
        .fields()
        .get("tags")
        .cloned()
        .with_context(|| {
            format!(
                "package {} is missing the tags field required by the index",
                package.name().unwrap_or("<unnamed>")
            )
        })?;
    serde_json::from_value(value).with_context(|| {
        format!(
            "package {} has malformed tags",
            package.name().unwrap_or("<unnamed>")
        )
    })
}

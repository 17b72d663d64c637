//! Generation downgrades for packages.
//!
//! Each step converts one generation to the next older one, keyed strictly
//! off the package's `packagingVersion` tag. Steps never mutate their input;
//! they return an independent copy, since the same source package may feed
//! several target generations in one run.

use log::warn;
use serde_json::Value;

use crate::package::{Generation, Package};

/// Convert a package to the v3 generation.
///
/// v2 and v3 packages come back as an unchanged copy. Anything newer loses
/// its `upgradesFrom`/`downgradesTo` edges and is retagged "3.0".
pub fn downgrade_to_v3(package: &Package) -> Package {
    match package.packaging_version() {
        Some("2.0") | Some("3.0") => package.clone(),
        _ => v4_to_v3(package),
    }
}

/// Convert a package to the v2 generation.
///
/// v2 packages come back as an unchanged copy; newer packages step down one
/// generation at a time.
pub fn downgrade_to_v2(package: &Package) -> Package {
    match package.packaging_version() {
        Some("2.0") => package.clone(),
        Some("3.0") => v3_to_v2(package),
        _ => v3_to_v2(&v4_to_v3(package)),
    }
}

fn v4_to_v3(package: &Package) -> Package {
    let mut package = package.clone();
    let fields = package.fields_mut();
    fields.shift_remove("upgradesFrom");
    fields.shift_remove("downgradesTo");
    fields.insert(
        "packagingVersion".into(),
        Generation::V3.packaging_version().into(),
    );
    package
}

fn v3_to_v2(package: &Package) -> Package {
    let mut copy = package.clone();
    let fields = copy.fields_mut();
    fields.shift_remove("minDcosReleaseVersion");
    fields.insert(
        "packagingVersion".into(),
        Generation::V2.packaging_version().into(),
    );

    // v2 has no representation for a binary CLI. The section is dropped; a
    // package that also lacks a pip command descriptor loses its CLI
    // entirely, which is lossy on purpose and only worth a warning.
    let has_command = fields.contains_key("command");
    if let Some(Value::Object(resource)) = fields.get_mut("resource")
        && resource.shift_remove("cli").is_some()
        && !has_command
    {
        warn!(
            "Removing binary CLI from ({}, {}) without a pip CLI",
            package.name().unwrap_or("<unnamed>"),
            package.version().unwrap_or("<unversioned>")
        );
    }

    copy
}

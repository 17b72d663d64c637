//! Repository assembly: filter, downgrade, serialize, validate.
//!
//! A repository document is built per requested platform version. Packages
//! incompatible with the platform are filtered out, the survivors are
//! downgraded to the generation that platform understands, and the resulting
//! document is validated against that generation's schema before anyone is
//! allowed to publish it.

mod content_type;
mod index;

pub use content_type::{format_content_type, highest_requested_generation};
pub use index::{Index, IndexEntry, create_index};

use anyhow::Result;
use log::debug;
use serde_json::Value;

use crate::downgrade::downgrade_to_v3;
use crate::escape::escape_config_properties;
use crate::package::{Generation, Package};
use crate::schema::{SchemaStore, ValidationError};
use crate::version::LooseVersion;

/// True when the package's declared minimum platform version does not exceed
/// the target platform version.
pub fn is_compatible(package: &Package, platform: &LooseVersion) -> bool {
    package.min_platform_version() <= *platform
}

/// The newest repository generation a platform version accepts.
pub fn target_generation(platform: &LooseVersion) -> Generation {
    if *platform <= LooseVersion::new("1.9") {
        Generation::V3
    } else if *platform <= LooseVersion::new("1.11") {
        Generation::V4
    } else {
        Generation::LATEST
    }
}

/// Select the packages compatible with `platform` and downgrade them to the
/// generation that platform accepts.
///
/// Platforms on the v3 generation predate the 1.10 rendering fix, so their
/// config schemas additionally get the double-escaping repair, applied once
/// before the downgrade.
pub fn filter_and_downgrade(packages: &[Package], platform: &LooseVersion) -> Vec<Package> {
    let compatible = packages
        .iter()
        .filter(|package| is_compatible(package, platform));

    if target_generation(platform) > Generation::V3 {
        return compatible.cloned().collect();
    }

    compatible
        .map(|package| {
            let mut package = package.clone();
            if let Some(Value::Object(config)) = package.fields_mut().get_mut("config")
                && let Some(Value::Object(properties)) = config.get_mut("properties")
                && !properties.is_empty()
            {
                escape_config_properties(properties);
            }
            downgrade_to_v3(&package)
        })
        .collect()
}

/// Wrap packages in the `{"packages": [...]}` document shape.
pub fn repository_document(packages: Vec<Package>) -> Value {
    let packages: Vec<Value> = packages.into_iter().map(Value::from).collect();
    let mut document = serde_json::Map::new();
    document.insert("packages".into(), Value::Array(packages));
    Value::Object(document)
}

/// Build the repository document for one platform version.
///
/// Returns the serialized document together with its schema violations. A
/// non-empty error list means the artifact must be withheld; producing it is
/// still not a hard failure here so sibling targets can proceed.
#[tracing::instrument(skip(packages, schemas))]
pub fn build_for_version(
    packages: &[Package],
    platform: &LooseVersion,
    schemas: &SchemaStore,
) -> Result<(Vec<u8>, Vec<ValidationError>)> {
    let generation = target_generation(platform);
    let selected = filter_and_downgrade(packages, platform);
    debug!(
        "Platform {}: {} of {} packages selected, generation {}",
        platform,
        selected.len(),
        packages.len(),
        generation
    );

    let document = repository_document(selected);
    let errors = schemas.validate(&document, generation);
    let bytes = serde_json::to_vec(&document)?;
    Ok((bytes, errors))
}

/// Group packages by name, preserving input order within and across groups.
///
/// Input is expected to be name-sorted (the store enumerates it that way);
/// grouping is over consecutive runs of equal names.
pub fn group_by_name(packages: &[Package]) -> Vec<(String, Vec<&Package>)> {
    let mut groups: Vec<(String, Vec<&Package>)> = Vec::new();
    for package in packages {
        let name = package.name().unwrap_or_default().to_string();
        match groups.last_mut() {
            Some((current, members)) if *current == name => members.push(package),
            _ => groups.push((name, vec![package])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::package_from_json;

    fn package(json: &str) -> Package {
        package_from_json(json)
    }

    fn v4_package_min_1_9() -> Package {
        package(
            r#"{"name": "foo", "version": "1.0", "releaseVersion": 0,
                "packagingVersion": "4.0", "minDcosReleaseVersion": "1.9",
                "upgradesFrom": ["0.9"]}"#,
        )
    }

    #[test]
    fn test_is_compatible_follows_loose_ordering() {
        let package = v4_package_min_1_9();
        assert!(is_compatible(&package, &LooseVersion::new("1.9")));
        assert!(is_compatible(&package, &LooseVersion::new("1.10")));
        assert!(!is_compatible(&package, &LooseVersion::new("1.8")));
    }

    #[test]
    fn test_package_without_minimum_is_always_compatible() {
        let package = package(r#"{"name": "bar"}"#);
        assert!(is_compatible(&package, &LooseVersion::new("1.6.1")));
    }

    #[test]
    fn test_target_generation_table() {
        assert_eq!(target_generation(&LooseVersion::new("1.8")), Generation::V3);
        assert_eq!(target_generation(&LooseVersion::new("1.9")), Generation::V3);
        assert_eq!(
            target_generation(&LooseVersion::new("1.10")),
            Generation::V4
        );
        assert_eq!(
            target_generation(&LooseVersion::new("1.11")),
            Generation::V4
        );
        assert_eq!(target_generation(&LooseVersion::new("2.0")), Generation::V5);
    }

    #[test]
    fn test_filter_and_downgrade_for_v3_platform() {
        let packages = vec![v4_package_min_1_9()];
        let selected = filter_and_downgrade(&packages, &LooseVersion::new("1.9"));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].packaging_version(), Some("3.0"));
        assert!(!selected[0].fields().contains_key("upgradesFrom"));
        // Source package is untouched.
        assert_eq!(packages[0].packaging_version(), Some("4.0"));
    }

    #[test]
    fn test_incompatible_package_is_excluded_entirely() {
        let packages = vec![v4_package_min_1_9()];
        let selected = filter_and_downgrade(&packages, &LooseVersion::new("1.8"));
        assert!(selected.is_empty());
    }

    #[test]
    fn test_newer_platforms_get_untouched_packages() {
        let packages = vec![v4_package_min_1_9()];
        let selected = filter_and_downgrade(&packages, &LooseVersion::new("1.11"));
        assert_eq!(selected[0], packages[0]);
    }

    #[test]
    fn test_escaping_applied_only_for_v3_targets() {
        let packages = vec![package(
            r#"{"name": "foo", "version": "1.0", "releaseVersion": 0,
                "packagingVersion": "4.0",
                "config": {"properties": {"node": {"description": "say \"hi\""}}}}"#,
        )];

        let v3 = filter_and_downgrade(&packages, &LooseVersion::new("1.9"));
        assert_eq!(
            v3[0].fields()["config"]["properties"]["node"]["description"],
            "say \\\"hi\\\""
        );

        let v4 = filter_and_downgrade(&packages, &LooseVersion::new("1.10"));
        assert_eq!(
            v4[0].fields()["config"]["properties"]["node"]["description"],
            "say \"hi\""
        );
    }

    #[test]
    fn test_build_for_version_validates_downgraded_document() {
        let schemas = SchemaStore::new().unwrap();
        let packages = vec![v4_package_min_1_9()];

        let (bytes, errors) =
            build_for_version(&packages, &LooseVersion::new("1.9"), &schemas).unwrap();
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");

        let document: Value = serde_json::from_slice(&bytes).unwrap();
        let rendered = &document["packages"][0];
        assert_eq!(rendered["packagingVersion"], "3.0");
        assert!(rendered.get("upgradesFrom").is_none());
    }

    #[test]
    fn test_build_for_version_reports_schema_violations() {
        let schemas = SchemaStore::new().unwrap();
        // An uppercase name violates every generation's name pattern.
        let packages = vec![package(
            r#"{"name": "NOPE", "version": "1.0", "releaseVersion": 0,
                "packagingVersion": "4.0"}"#,
        )];

        let (_, errors) =
            build_for_version(&packages, &LooseVersion::new("1.11"), &schemas).unwrap();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_group_by_name_groups_consecutive_runs() {
        let packages = vec![
            package(r#"{"name": "bar", "releaseVersion": 0}"#),
            package(r#"{"name": "foo", "releaseVersion": 0}"#),
            package(r#"{"name": "foo", "releaseVersion": 1}"#),
        ];
        let groups = group_by_name(&packages);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "bar");
        assert_eq!(groups[1].0, "foo");
        assert_eq!(groups[1].1.len(), 2);
    }
}

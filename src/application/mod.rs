//! Build and validate use cases.
//!
//! `build` turns a package store into the full set of repository artifacts:
//! the whole-universe document, one document per requested platform version
//! (zip below the JSON threshold), content-type stamps, and the exploded
//! per-package layout. `validate` checks an existing repository document
//! against one generation's schema.

use anyhow::{Context, Result, bail, ensure};
use log::{error, info};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::write_zip_universe;
use crate::package::{Generation, Package, load_repository};
use crate::repository::{
    build_for_version, format_content_type, is_compatible, repository_document,
    target_generation,
};
use crate::schema::{SchemaStore, ValidationError};
use crate::version::LooseVersion;

/// Platform versions rendered when the caller does not name any.
pub const DEFAULT_PLATFORM_VERSIONS: [&str; 7] =
    ["1.6.1", "1.7", "1.8", "1.9", "1.10", "1.11", "2.0"];

/// Platforms below this version consume the legacy zip shape.
const JSON_THRESHOLD: &str = "1.8";

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Top-level package store directory, e.g. `repo/packages`.
    pub repository: PathBuf,
    /// Directory receiving every generated artifact.
    pub outdir: PathBuf,
    /// Platform versions to render.
    pub platform_versions: Vec<String>,
}

/// Generate every repository artifact from the package store.
///
/// A malformed package store aborts the whole build. A schema violation in
/// one platform's document withholds that artifact and is reported, but the
/// remaining targets still render; the run fails afterwards so nothing
/// half-validated gets published unnoticed.
#[tracing::instrument(skip(options))]
pub fn build(options: &BuildOptions) -> Result<()> {
    ensure!(
        options.repository.is_dir(),
        "repository path {} is not a directory",
        options.repository.display()
    );
    ensure!(
        options.outdir.is_dir(),
        "out-dir {} is not a directory; create it first",
        options.outdir.display()
    );

    let schemas = SchemaStore::new()?;
    let packages = load_repository(&options.repository)?;
    info!(
        "Rendering {} package releases for {} platform versions",
        packages.len(),
        options.platform_versions.len()
    );

    // The whole universe, newest generation.
    write_json(
        &options.outdir.join("universe.json"),
        &repository_document(packages.clone()),
    )?;
    write_content_type(
        &options.outdir.join("universe.content_type"),
        Generation::LATEST,
    )?;

    // Empty v3 repository, kept for bootstrap clients.
    write_json(
        &options.outdir.join("repo-empty-v3.json"),
        &repository_document(Vec::new()),
    )?;
    write_content_type(
        &options.outdir.join("repo-empty-v3.content_type"),
        Generation::V3,
    )?;

    let mut rejected = Vec::new();
    for version in &options.platform_versions {
        let platform = LooseVersion::new(version);
        if platform < LooseVersion::new(JSON_THRESHOLD) {
            let selected: Vec<Package> = packages
                .iter()
                .filter(|package| is_compatible(package, &platform))
                .cloned()
                .collect();
            write_zip_universe(&options.outdir, &selected, &platform)?;
        } else {
            let errors = render_json_target(&packages, &platform, &schemas, &options.outdir)?;
            if !errors.is_empty() {
                error!(
                    "Repository for platform {} fails {} validation; artifact withheld",
                    platform,
                    target_generation(&platform)
                );
                for violation in &errors {
                    error!("  {violation}");
                }
                rejected.push(version.clone());
            }
        }
    }

    if !rejected.is_empty() {
        bail!(
            "schema validation rejected the repository for platform version(s): {}",
            rejected.join(", ")
        );
    }
    Ok(())
}

/// Render the JSON artifacts for one platform version.
///
/// Returns the document's schema violations; when non-empty, nothing has
/// been written for this target.
fn render_json_target(
    packages: &[Package],
    platform: &LooseVersion,
    schemas: &SchemaStore,
    outdir: &Path,
) -> Result<Vec<ValidationError>> {
    let (bytes, errors) = build_for_version(packages, platform, schemas)?;
    if !errors.is_empty() {
        return Ok(errors);
    }

    let path = outdir.join(format!("repo-up-to-{platform}.json"));
    fs::write(&path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    write_content_type(
        &outdir.join(format!("repo-up-to-{platform}.content_type")),
        target_generation(platform),
    )?;

    let document: Value = serde_json::from_slice(&bytes)?;
    render_universe_by_package(outdir, &document, platform)?;
    Ok(Vec::new())
}

/// Exploded layout: `<platform>/package/<name>.json`, one file per package
/// name holding all of that name's releases from the generation's document.
fn render_universe_by_package(
    outdir: &Path,
    document: &Value,
    platform: &LooseVersion,
) -> Result<()> {
    let package_dir = outdir.join(platform.to_string()).join("package");
    fs::create_dir_all(&package_dir)
        .with_context(|| format!("Failed to create {}", package_dir.display()))?;

    let mut by_name: Map<String, Value> = Map::new();
    for package in document["packages"].as_array().into_iter().flatten() {
        let Some(name) = package["name"].as_str() else {
            continue;
        };
        if let Some(releases) = by_name
            .entry(name.to_string())
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
        {
            releases.push(package.clone());
        }
    }

    for (name, releases) in by_name {
        let mut grouped = Map::new();
        grouped.insert("packages".into(), releases);
        write_json(
            &package_dir.join(format!("{name}.json")),
            &Value::Object(grouped),
        )?;
    }
    Ok(())
}

/// Validate an existing repository document against one generation.
#[tracing::instrument(skip(path))]
pub fn validate_file(path: &Path, generation: Generation) -> Result<Vec<ValidationError>> {
    let schemas = SchemaStore::new()?;
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let document: Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(schemas.validate(&document, generation))
}

fn write_json(path: &Path, document: &Value) -> Result<()> {
    let bytes = serde_json::to_vec(document)?;
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

fn write_content_type(path: &Path, generation: Generation) -> Result<()> {
    fs::write(path, format_content_type(generation))
        .with_context(|| format!("Failed to write {}", path.display()))
}

//! Legacy zip-archive rendering of a repository.
//!
//! Clients below the JSON-only threshold consume the repository as a zip of
//! per-package directories. Every package is downgraded to the v2 generation
//! and split back into its source documents:
//!
//! ```text
//! universe/repo/meta/{index.json,version.json}
//! universe/repo/packages/<Letter>/<name>/<releaseVersion>/package.json
//!                                                        /resource.json
//!                                                        /config.json
//!                                                        /command.json
//!                                                        /marathon.json.mustache
//! ```

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::info;
use serde_json::Value;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::FileOptions;

use crate::downgrade::downgrade_to_v2;
use crate::package::Package;
use crate::repository::create_index;
use crate::version::LooseVersion;

/// Render the legacy archive for `platform` next to the other artifacts.
///
/// The zip is assembled in a temporary file and persisted under its final
/// name in one move; the output path is written exactly once.
#[tracing::instrument(skip(outdir, packages))]
pub fn write_zip_universe(
    outdir: &Path,
    packages: &[Package],
    platform: &LooseVersion,
) -> Result<PathBuf> {
    let mut temp = NamedTempFile::new_in(outdir)
        .with_context(|| format!("Failed to create a temporary file in {}", outdir.display()))?;

    let mut zip = ZipWriter::new(temp.as_file_mut());
    render_universe_zip(&mut zip, packages)?;
    zip.finish().context("Failed to finalize zip archive")?;

    let path = outdir.join(format!("repo-up-to-{platform}.zip"));
    temp.persist(&path)
        .with_context(|| format!("Failed to persist archive at {}", path.display()))?;
    info!("Wrote legacy archive {:?}", path);
    Ok(path)
}

/// Populate a zip with the legacy directory tree for `packages`.
pub fn render_universe_zip<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    packages: &[Package],
) -> Result<()> {
    let mut packages: Vec<Package> = packages.to_vec();
    packages.sort_by(|a, b| {
        let key = |p: &Package| {
            (
                p.name().unwrap_or_default().to_string(),
                p.release_version().unwrap_or_default(),
            )
        };
        key(a).cmp(&key(b))
    });

    let options: FileOptions<()> =
        FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.add_directory("universe/", options)?;
    zip.add_directory("universe/repo/", options)?;

    zip.add_directory("universe/repo/meta/", options)?;
    let index = create_index(&packages)?;
    zip.start_file("universe/repo/meta/index.json", options)?;
    zip.write_all(&serde_json::to_vec(&index)?)?;
    zip.start_file("universe/repo/meta/version.json", options)?;
    zip.write_all(br#"{"version":"2.0.0"}"#)?;

    zip.add_directory("universe/repo/packages/", options)?;

    let mut current_letter = String::new();
    let mut current_name = String::new();
    for package in &packages {
        let name = package
            .name()
            .context("cannot archive a package without a name")?
            .to_string();
        let release_version = package.release_version().with_context(|| {
            format!("cannot archive package {name} without a releaseVersion")
        })?;

        let letter = name
            .chars()
            .next()
            .map(|c| c.to_uppercase().to_string())
            .unwrap_or_default();
        if letter != current_letter {
            zip.add_directory(format!("universe/repo/packages/{letter}/"), options)?;
            current_letter = letter.clone();
        }
        if name != current_name {
            zip.add_directory(
                format!("universe/repo/packages/{letter}/{name}/"),
                options,
            )?;
            current_name = name.clone();
        }

        let package_dir = format!("universe/repo/packages/{letter}/{name}/{release_version}");
        zip.add_directory(format!("{package_dir}/"), options)?;
        write_package_in_zip(zip, &package_dir, package, options)?;
    }

    Ok(())
}

/// Split one package back into its per-document files.
fn write_package_in_zip<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    package_dir: &str,
    package: &Package,
    options: FileOptions<'_, ()>,
) -> Result<()> {
    let mut package = downgrade_to_v2(package);
    let fields = package.fields_mut();

    // The release version is encoded in the directory name.
    fields.shift_remove("releaseVersion");

    if let Some(resource) = fields.shift_remove("resource") {
        zip.start_file(format!("{package_dir}/resource.json"), options)?;
        zip.write_all(&serde_json::to_vec(&resource)?)?;
    }

    if let Some(marathon) = fields.shift_remove("marathon")
        && let Some(template) = marathon.get("v2AppMustacheTemplate").and_then(Value::as_str)
    {
        let decoded = BASE64
            .decode(template)
            .context("marathon template is not valid base64")?;
        zip.start_file(format!("{package_dir}/marathon.json.mustache"), options)?;
        zip.write_all(&decoded)?;
    }

    if let Some(config) = fields.shift_remove("config") {
        zip.start_file(format!("{package_dir}/config.json"), options)?;
        zip.write_all(&serde_json::to_vec(&config)?)?;
    }

    if let Some(command) = fields.shift_remove("command") {
        zip.start_file(format!("{package_dir}/command.json"), options)?;
        zip.write_all(&serde_json::to_vec(&command)?)?;
    }

    zip.start_file(format!("{package_dir}/package.json"), options)?;
    zip.write_all(&serde_json::to_vec(package.fields())?)?;
    Ok(())
}

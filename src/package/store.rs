//! Read-only access to the on-disk package store.
//!
//! Store layout: `<root>/<Letter>/<name>/<releaseVersion>/` with up to five
//! documents per release: `package.json` (required), `resource.json`,
//! `config.json`, `command.json` and `marathon.json.mustache`. The whole
//! store is loaded up front; a missing or unparsable required document fails
//! the entire build, since package sets must be complete.

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::debug;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use super::Package;

/// Directory for one package release.
///
/// Returns: `<root>/<Letter>/<name>/<releaseVersion>`
pub fn package_dir(root: &Path, name: &str, release_version: u64) -> PathBuf {
    let letter = name
        .chars()
        .next()
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_default();
    root.join(letter)
        .join(name)
        .join(release_version.to_string())
}

/// Enumerate every `(name, releaseVersion)` pair in the store.
///
/// The result is sorted by name and release version so that repository
/// documents come out in a deterministic order.
pub fn enumerate_packages(root: &Path) -> Result<Vec<(String, u64)>> {
    let mut entries = Vec::new();

    for letter_dir in list_dirs(root)? {
        for name_dir in list_dirs(&letter_dir)? {
            let name = dir_name(&name_dir)?;
            for release_dir in list_dirs(&name_dir)? {
                let release = dir_name(&release_dir)?;
                let release_version: u64 = release.parse().with_context(|| {
                    format!(
                        "release directory {} of package {} is not a number",
                        release_dir.display(),
                        name
                    )
                })?;
                entries.push((name.clone(), release_version));
            }
        }
    }

    entries.sort();
    Ok(entries)
}

/// Load every package release in the store.
#[tracing::instrument(skip(root))]
pub fn load_repository(root: &Path) -> Result<Vec<Package>> {
    let entries = enumerate_packages(root)?;
    debug!("Loading {} package releases from {:?}", entries.len(), root);
    entries
        .iter()
        .map(|(name, release_version)| load_package(root, name, *release_version))
        .collect()
}

/// Load one package release and fold its sibling documents into it.
pub fn load_package(root: &Path, name: &str, release_version: u64) -> Result<Package> {
    let dir = package_dir(root, name, release_version);

    let mut fields = read_required_json(&dir.join("package.json"))?;
    fields.insert("releaseVersion".into(), release_version.into());

    if let Some(resource) = read_optional_json(&dir.join("resource.json"))? {
        fields.insert("resource".into(), Value::Object(resource));
    }
    if let Some(template) = read_marathon_template(&dir.join("marathon.json.mustache"))? {
        let mut marathon = Map::new();
        marathon.insert("v2AppMustacheTemplate".into(), template.into());
        fields.insert("marathon".into(), Value::Object(marathon));
    }
    if let Some(config) = read_optional_json(&dir.join("config.json"))? {
        fields.insert("config".into(), Value::Object(config));
    }
    if let Some(command) = read_optional_json(&dir.join("command.json"))? {
        fields.insert("command".into(), Value::Object(command));
    }

    Ok(Package::new(fields))
}

fn read_required_json(path: &Path) -> Result<Map<String, Value>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_object(&content, path)
}

fn read_optional_json(path: &Path) -> Result<Option<Map<String, Value>>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Some(parse_object(&content, path)?))
}

fn parse_object(content: &str, path: &Path) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_str(content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    match value {
        Value::Object(fields) => Ok(fields),
        _ => bail!("{} is not a JSON object", path.display()),
    }
}

/// Marathon templates travel through repository documents base64-encoded.
fn read_marathon_template(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Some(BASE64.encode(bytes)))
}

fn list_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to read directory {}", dir.display()))?
            .path();
        // Skip dotfiles such as .DS_Store droppings.
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if path.is_dir() && !hidden {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> Result<String> {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => Ok(name.to_string()),
        None => bail!("directory {} has no UTF-8 name", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_release(root: &Path, name: &str, release: u64, docs: &[(&str, &str)]) {
        let dir = package_dir(root, name, release);
        fs::create_dir_all(&dir).unwrap();
        for (file, content) in docs {
            fs::write(dir.join(file), content).unwrap();
        }
    }

    #[test]
    fn test_package_dir_uses_uppercase_letter_prefix() {
        let dir = package_dir(Path::new("/repo/packages"), "marathon", 0);
        assert_eq!(dir, PathBuf::from("/repo/packages/M/marathon/0"));
    }

    #[test]
    fn test_enumerate_packages_sorted() {
        let root = tempdir().unwrap();
        write_release(root.path(), "kafka", 1, &[("package.json", "{}")]);
        write_release(root.path(), "kafka", 0, &[("package.json", "{}")]);
        write_release(root.path(), "arangodb", 2, &[("package.json", "{}")]);

        let entries = enumerate_packages(root.path()).unwrap();
        assert_eq!(
            entries,
            vec![
                ("arangodb".to_string(), 2),
                ("kafka".to_string(), 0),
                ("kafka".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_enumerate_rejects_non_numeric_release_dir() {
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join("K/kafka/not-a-number")).unwrap();

        let result = enumerate_packages(root.path());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not a number"));
    }

    #[test]
    fn test_load_package_with_all_documents() {
        let root = tempdir().unwrap();
        write_release(
            root.path(),
            "kafka",
            4,
            &[
                ("package.json", r#"{"name": "kafka", "version": "1.0"}"#),
                ("resource.json", r#"{"assets": {}}"#),
                ("config.json", r#"{"type": "object"}"#),
                ("command.json", r#"{"pip": ["kafka-cli"]}"#),
                ("marathon.json.mustache", r#"{"id": "{{name}}"}"#),
            ],
        );

        let package = load_package(root.path(), "kafka", 4).unwrap();
        assert_eq!(package.name(), Some("kafka"));
        assert_eq!(package.release_version(), Some(4));
        assert!(package.fields().contains_key("resource"));
        assert!(package.fields().contains_key("config"));
        assert!(package.fields().contains_key("command"));

        let template = package.fields()["marathon"]["v2AppMustacheTemplate"]
            .as_str()
            .unwrap();
        let decoded = BASE64.decode(template).unwrap();
        assert_eq!(decoded, br#"{"id": "{{name}}"}"#);
    }

    #[test]
    fn test_load_package_omits_absent_sections() {
        let root = tempdir().unwrap();
        write_release(
            root.path(),
            "kafka",
            0,
            &[("package.json", r#"{"name": "kafka"}"#)],
        );

        let package = load_package(root.path(), "kafka", 0).unwrap();
        assert!(!package.fields().contains_key("resource"));
        assert!(!package.fields().contains_key("config"));
        assert!(!package.fields().contains_key("command"));
        assert!(!package.fields().contains_key("marathon"));
    }

    #[test]
    fn test_load_package_missing_package_json_is_fatal() {
        let root = tempdir().unwrap();
        fs::create_dir_all(package_dir(root.path(), "kafka", 0)).unwrap();

        let result = load_package(root.path(), "kafka", 0);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("package.json")
        );
    }

    #[test]
    fn test_load_package_invalid_json_is_fatal() {
        let root = tempdir().unwrap();
        write_release(root.path(), "kafka", 0, &[("package.json", "{not json")]);

        let result = load_package(root.path(), "kafka", 0);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_config_key_order_is_preserved() {
        let root = tempdir().unwrap();
        write_release(
            root.path(),
            "kafka",
            0,
            &[
                ("package.json", r#"{"name": "kafka"}"#),
                (
                    "config.json",
                    r#"{"zebra": 1, "alpha": 2, "properties": {"b": {}, "a": {}}}"#,
                ),
            ],
        );

        let package = load_package(root.path(), "kafka", 0).unwrap();
        let config = package.fields()["config"].as_object().unwrap();
        let keys: Vec<&str> = config.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zebra", "alpha", "properties"]);
    }
}

//! JSON Schema validation of repository documents.
//!
//! One schema document per generation, embedded at compile time and compiled
//! once into a [`SchemaStore`]. The generation schemas share a definitions
//! document for their cross-references; it is merged into each schema before
//! compilation. A schema that fails to parse or compile is a tooling defect
//! and aborts the process, unlike a document that merely fails validation.

use anyhow::{Context, Result, bail};
use jsonschema::{Draft, Validator};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::package::Generation;

const SHARED_DEFINITIONS: &str = include_str!("../../schemas/definitions.json");

const GENERATION_SCHEMAS: [(Generation, &str); 4] = [
    (
        Generation::V2,
        include_str!("../../schemas/v2-repo-schema.json"),
    ),
    (
        Generation::V3,
        include_str!("../../schemas/v3-repo-schema.json"),
    ),
    (
        Generation::V4,
        include_str!("../../schemas/v4-repo-schema.json"),
    ),
    (
        Generation::V5,
        include_str!("../../schemas/v5-repo-schema.json"),
    ),
];

/// One flattened schema violation: where in the schema, and what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ValidationError {
    pub schema_path: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.schema_path, self.message)
    }
}

/// Compiled validators for every repository generation.
///
/// Built once at startup and passed around as a read-only dependency.
pub struct SchemaStore {
    validators: HashMap<Generation, Validator>,
}

impl SchemaStore {
    pub fn new() -> Result<Self> {
        let definitions: Value = serde_json::from_str(SHARED_DEFINITIONS)
            .context("shared schema definitions are not valid JSON")?;

        let mut validators = HashMap::new();
        for (generation, source) in GENERATION_SCHEMAS {
            let mut schema: Value = serde_json::from_str(source)
                .with_context(|| format!("{generation} repo schema is not valid JSON"))?;

            let Some(root) = schema.as_object_mut() else {
                bail!("{generation} repo schema is not a JSON object");
            };
            root.insert("definitions".into(), definitions.clone());

            let validator = jsonschema::options()
                .with_draft(Draft::Draft4)
                .build(&schema)
                .with_context(|| format!("failed to compile the {generation} repo schema"))?;
            validators.insert(generation, validator);
        }

        Ok(SchemaStore { validators })
    }

    /// Validate a repository document against one generation's schema.
    ///
    /// Returns every violation as a `(schema path, message)` pair, sorted by
    /// schema path so output is deterministic. An empty list means the
    /// document is valid. Structural invalidity is reported, never raised.
    pub fn validate(&self, document: &Value, generation: Generation) -> Vec<ValidationError> {
        let validator = &self.validators[&generation];
        let mut errors: Vec<ValidationError> = validator
            .iter_errors(document)
            .map(|error| ValidationError {
                schema_path: error.schema_path.to_string(),
                message: error.to_string(),
            })
            .collect();
        errors.sort();
        errors
    }
}

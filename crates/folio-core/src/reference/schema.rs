//! JSON Schema validation for reference data.
//!
//! `settings.json` and `watchlist.json` are checked against the schemas in
//! `schema/` before they are deserialized, so a malformed file fails at load
//! time with every offending path listed.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded settings schema (loaded at compile time).
const SETTINGS_SCHEMA_JSON: &str = include_str!("../../../../schema/settings.schema.json");

/// Embedded watchlist schema (loaded at compile time).
const WATCHLIST_SCHEMA_JSON: &str = include_str!("../../../../schema/watchlist.schema.json");

static SETTINGS_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();
static WATCHLIST_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Which reference document a schema applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Settings,
    Watchlist,
}

/// Errors from schema loading.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

fn compile(raw: &str) -> Result<jsonschema::Validator, String> {
    let schema_value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
    };

    match jsonschema::options().build(&schema_value) {
        Ok(v) => Ok(v),
        Err(e) => Err(format!("Failed to compile schema: {}", e)),
    }
}

/// Get or initialize the compiled validator for `kind`.
fn get_validator(kind: SchemaKind) -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = match kind {
        SchemaKind::Settings => SETTINGS_SCHEMA.get_or_init(|| compile(SETTINGS_SCHEMA_JSON)),
        SchemaKind::Watchlist => WATCHLIST_SCHEMA.get_or_init(|| compile(WATCHLIST_SCHEMA_JSON)),
    };

    match result {
        Ok(v) => Ok(v),
        Err(e) => Err(SchemaError::LoadError(e.clone())),
    }
}

/// Validate a reference document against its schema.
///
/// # Returns
///
/// * `Ok(())` - Document is valid
/// * `Err(Vec<String>)` - One message per violation, with its JSON pointer
pub fn validate_schema(kind: SchemaKind, document: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator(kind).map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

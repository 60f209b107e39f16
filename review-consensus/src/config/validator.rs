use crate::config::error::{ConfigError, Result};
use crate::config::loader::ReviewConfig;
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

const REVIEW_SCHEMA: &str = include_str!("schemas/review_config.schema.json");

/// Checks a merged [`ReviewConfig`] against the embedded Draft 7 schema.
pub struct SchemaValidator {
    schema: JSONSchema,
}

impl SchemaValidator {
    pub fn new() -> Result<Self> {
        let schema: Value = serde_json::from_str(REVIEW_SCHEMA).map_err(|e| {
            ConfigError::SchemaValidationError(format!("embedded review schema is not JSON: {e}"))
        })?;
        let schema = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema)
            .map_err(|e| {
                ConfigError::SchemaValidationError(format!("embedded review schema is invalid: {e}"))
            })?;
        Ok(Self { schema })
    }

    /// Report every violation, each keyed by the dotted config key that an
    /// env override would use (`scoring.reviewer_count`).
    pub fn validate(&self, config: &ReviewConfig) -> Result<()> {
        let instance = serde_json::to_value(config).map_err(|e| {
            ConfigError::SchemaValidationError(format!("review config did not serialize: {e}"))
        })?;

        let Err(errors) = self.schema.validate(&instance) else {
            return Ok(());
        };
        let violations: Vec<String> = errors
            .map(|e| format!("{}: {e}", dotted_key(&e.instance_path.to_string())))
            .collect();
        let plural = if violations.len() == 1 { "" } else { "s" };
        Err(ConfigError::SchemaValidationError(format!(
            "{} error{plural}\n  - {}",
            violations.len(),
            violations.join("\n  - ")
        )))
    }
}

/// `/scoring/protected_domains/1` becomes `scoring.protected_domains.1`.
fn dotted_key(pointer: &str) -> String {
    let key = pointer.trim_start_matches('/').replace('/', ".");
    if key.is_empty() { "(root)".to_string() } else { key }
}

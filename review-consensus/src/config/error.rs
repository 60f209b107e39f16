use std::path::PathBuf;
use thiserror::Error;

/// Why a review configuration could not be produced
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer could not be merged or deserialized into `ReviewConfig`
    #[error("review config could not be loaded: {0}")]
    LoadError(String),

    /// An explicitly requested config file is missing
    #[error("review config file {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    /// The config file is not valid TOML
    #[error("review config file is malformed: {0}")]
    ParseError(String),

    /// The merged config violates `review_config.schema.json`
    #[error("review config is out of range: {0}")]
    SchemaValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::FileParse { uri, cause } => ConfigError::ParseError(match uri {
                Some(uri) => format!("{uri}: {cause}"),
                None => cause.to_string(),
            }),
            other => ConfigError::LoadError(other.to_string()),
        }
    }
}

/// Only the defaults layer is serialized through serde_json during a load.
impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::LoadError(format!("default review config did not serialize: {err}"))
    }
}

use crate::config::error::{ConfigError, Result};
use crate::config::validator::SchemaValidator;
use crate::findings::DedupConfig;
use crate::scoring::ScoringConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix (`REVIEW_SCORING__REVIEWER_COUNT=7`)
pub const ENV_PREFIX: &str = "REVIEW";

/// Root configuration for the review pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Consensus scoring settings
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Finding deduplication settings
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Bypass ledger location
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Bypass ledger location and write discipline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Directory holding the ledger file
    #[serde(default = "default_ledger_dir")]
    pub dir: PathBuf,

    /// Ledger file name within `dir`
    #[serde(default = "default_ledger_file_name")]
    pub file_name: String,

    /// Take an exclusive lock around each append
    #[serde(default)]
    pub advisory_lock: bool,
}

impl LedgerConfig {
    /// Full path of the ledger file
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

fn default_ledger_dir() -> PathBuf {
    PathBuf::from(".review")
}
fn default_ledger_file_name() -> String {
    "bypass_ledger.json".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            dir: default_ledger_dir(),
            file_name: default_ledger_file_name(),
            advisory_lock: false,
        }
    }
}

/// Key whose environment value is split on commas into a list
const LIST_KEYS: &[&str] = &["scoring.protected_domains"];

/// File names searched by [`ConfigLoader::find_config_file`], in order
const PROJECT_FILE: &str = "review.toml";
const USER_DIR: &str = "codex-review";
const HOME_FILE: &str = ".codex-review.toml";

/// Builds a [`ReviewConfig`] from defaults, an optional TOML file and
/// `REVIEW_*` environment variables, later layers winning.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `path` between the defaults and the environment. The file must
    /// exist when [`load`](Self::load) runs.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Merge every layer, deserialize, and check the result against the
    /// embedded schema. A value out of range in any layer fails the whole
    /// load; nothing is silently clamped.
    pub fn load(&self) -> Result<ReviewConfig> {
        let defaults = serde_json::to_string(&ReviewConfig::default())?;
        let mut builder = Config::builder()
            .add_source(File::from_str(&defaults, config::FileFormat::Json));

        if let Some(path) = &self.config_path {
            if !path.is_file() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            builder = builder.add_source(File::from(path.as_path()));
        }

        let review_config: ReviewConfig = builder
            .add_source(env_layer())
            .build()?
            .try_deserialize()?;
        SchemaValidator::new()?.validate(&review_config)?;

        tracing::debug!(
            file = ?self.config_path,
            reviewer_count = review_config.scoring.reviewer_count,
            line_tolerance = review_config.dedup.line_tolerance,
            ledger = %review_config.ledger.path().display(),
            "review configuration loaded"
        );
        Ok(review_config)
    }

    /// First existing file among `./review.toml`,
    /// `<config dir>/codex-review/config.toml` and `~/.codex-review.toml`.
    pub fn find_config_file() -> Option<PathBuf> {
        let user = dirs::config_dir().map(|dir| dir.join(USER_DIR).join("config.toml"));
        let home = dirs::home_dir().map(|dir| dir.join(HOME_FILE));

        std::iter::once(Some(PathBuf::from(PROJECT_FILE)))
            .chain([user, home])
            .flatten()
            .find(|candidate| candidate.is_file())
    }

    /// [`load`](Self::load) with whatever [`find_config_file`](Self::find_config_file) turns up.
    pub fn load_default() -> Result<ReviewConfig> {
        match Self::find_config_file() {
            Some(path) => Self::new().with_file(path).load(),
            None => Self::new().load(),
        }
    }
}

/// `REVIEW_SCORING__REVIEWER_COUNT=7` sets `scoring.reviewer_count`.
fn env_layer() -> Environment {
    LIST_KEYS.iter().fold(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(","),
        |env, key| env.with_list_parse_key(key),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Domain;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = ReviewConfig::default();
        assert_eq!(config.scoring.reviewer_count, 5);
        assert_eq!(config.scoring.protection_threshold, 8.5);
        assert_eq!(
            config.scoring.protected_domains,
            vec![Domain::Reliability, Domain::Security]
        );
        assert_eq!(config.dedup.line_tolerance, 3);
        assert_eq!(config.ledger.path(), PathBuf::from(".review/bypass_ledger.json"));
        assert!(!config.ledger.advisory_lock);
    }

    #[test]
    #[serial]
    fn test_load_with_defaults_only() {
        let config = ConfigLoader::new().load().expect("Failed to load default config");
        assert_eq!(config, ReviewConfig::default());
    }

    #[test]
    #[serial]
    fn test_load_with_toml_file() {
        let toml_content = r#"
[scoring]
reviewer_count = 3
protected_domains = ["security"]

[dedup]
line_tolerance = 0

[ledger]
dir = "/var/lib/review"
advisory_lock = true
"#;
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("review.toml");
        std::fs::write(&config_path, toml_content).expect("Failed to write temp file");

        let config = ConfigLoader::new()
            .with_file(&config_path)
            .load()
            .expect("Failed to load config");

        assert_eq!(config.scoring.reviewer_count, 3);
        assert_eq!(config.scoring.protection_threshold, 8.5);
        assert_eq!(config.scoring.protected_domains, vec![Domain::Security]);
        assert_eq!(config.dedup.line_tolerance, 0);
        assert_eq!(
            config.ledger.path(),
            PathBuf::from("/var/lib/review/bypass_ledger.json")
        );
        assert!(config.ledger.advisory_lock);
    }

    #[test]
    fn test_missing_file_error() {
        let result = ConfigLoader::new().with_file("/nonexistent/review.toml").load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    #[serial]
    fn test_schema_rejects_zero_reviewers() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("review.toml");
        std::fs::write(&config_path, "[scoring]\nreviewer_count = 0\n")
            .expect("Failed to write temp file");

        let result = ConfigLoader::new().with_file(&config_path).load();
        assert!(matches!(result, Err(ConfigError::SchemaValidationError(_))));
    }

    #[test]
    #[serial]
    fn test_malformed_toml_is_a_parse_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("review.toml");
        std::fs::write(&config_path, "[scoring\nreviewer_count = ")
            .expect("Failed to write temp file");

        let result = ConfigLoader::new().with_file(&config_path).load();
        assert!(matches!(result, Err(ConfigError::ParseError(_))), "got: {result:?}");
    }

    #[test]
    #[serial]
    fn test_unknown_domain_is_rejected() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("review.toml");
        std::fs::write(&config_path, "[scoring]\nprotected_domains = [\"vibes\"]\n")
            .expect("Failed to write temp file");

        let result = ConfigLoader::new().with_file(&config_path).load();
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}

//! Effective configuration with provenance
//!
//! The merged configuration plus the list of sources that contributed to it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use super::defaults::VerifyConfig;
use super::merge::merge_layers;

/// Project config location, relative to the working directory
pub const PROJECT_CONFIG_PATH: &str = ".toto/verify.toml";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Default host config location
pub fn host_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/toto/verify.toml"))
}

/// Origin of a configuration layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Host,
    Project,
    Cli,
}

/// A contributing layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// SHA-256 of the raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Merged configuration
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    /// Typed view of the merged layers
    pub config: VerifyConfig,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Merge built-in defaults, host and project files, and CLI overrides.
    ///
    /// Missing files are skipped.
    pub fn build(
        host_config_path: Option<&Path>,
        project_config_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![VerifyConfig::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        let files = [
            (ConfigOrigin::Host, host_config_path),
            (ConfigOrigin::Project, project_config_path),
        ];
        for (origin, path) in files {
            let Some(path) = path.filter(|p| p.exists()) else {
                continue;
            };
            let (value, digest) = load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin,
                path: Some(path.to_path_buf()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let config: VerifyConfig = serde_json::from_value(merge_layers(layers))?;
        validate(&config)?;

        tracing::debug!(layers = sources.len(), "configuration loaded");
        Ok(Self { config, sources })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Parse a TOML file, returning its value and the digest of its bytes
fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let digest = hex::encode(Sha256::digest(&bytes));

    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };
    let contents = String::from_utf8(bytes).map_err(|e| parse_error(e.to_string()))?;
    let value: Value = toml::from_str(&contents).map_err(|e| parse_error(e.to_string()))?;

    Ok((value, digest))
}

fn validate(config: &VerifyConfig) -> Result<(), ConfigError> {
    if config.layout_threshold == Some(0) {
        return Err(ConfigError::Validation(
            "layout_threshold must be at least 1".to_string(),
        ));
    }

    if config.inspection.timeout_seconds == Some(0) {
        return Err(ConfigError::Validation(
            "inspection.timeout_seconds must be greater than 0".to_string(),
        ));
    }

    if !LOG_LEVELS.contains(&config.log.level.to_lowercase().as_str()) {
        return Err(ConfigError::Validation(format!(
            "log.level must be one of {}",
            LOG_LEVELS.join(", ")
        )));
    }

    Ok(())
}

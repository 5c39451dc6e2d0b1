//! Layered verifier configuration
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. Host config (~/.config/toto/verify.toml)
//! 3. Project config (.toto/verify.toml)
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::{InspectionConfig, LogConfig, VerifyConfig};
pub use effective::{
    host_config_path, ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig,
    PROJECT_CONFIG_PATH,
};
pub use merge::{deep_merge, merge_layers};

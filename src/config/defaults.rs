//! Typed configuration and its built-in defaults (layer 1)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::verify::VerifyOptions;

/// Inspection execution settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectionConfig {
    /// Directory inspections run in (default: current directory)
    pub work_dir: PathBuf,

    /// Per-inspection timeout; unset means no limit
    pub timeout_seconds: Option<u64>,

    /// Wait between SIGTERM and SIGKILL after a timeout (default: 5)
    pub termination_grace_seconds: u64,

    /// Paths skipped when recording inspection artifacts
    pub exclude_patterns: Vec<String>,
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            timeout_seconds: None,
            termination_grace_seconds: 5,
            exclude_patterns: Vec::new(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level filter used when RUST_LOG is unset (default: "warn")
    pub level: String,

    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

/// Verifier configuration after merging all layers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Signed layout file
    pub layout: Option<PathBuf>,

    /// Public keys the layout must be signed with
    pub layout_keys: Vec<PathBuf>,

    /// Required layout signatures; all layout keys when unset
    pub layout_threshold: Option<usize>,

    /// Directory holding link files (default: current directory)
    pub link_dir: Option<PathBuf>,

    /// Layout parameter values
    pub parameters: BTreeMap<String, String>,

    pub inspection: InspectionConfig,

    pub log: LogConfig,
}

impl VerifyConfig {
    /// Convert to a JSON value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn link_dir(&self) -> PathBuf {
        self.link_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn termination_grace(&self) -> Duration {
        Duration::from_secs(self.inspection.termination_grace_seconds)
    }

    /// Options for a verification run
    pub fn verify_options(&self) -> VerifyOptions {
        VerifyOptions {
            reference_time: None,
            layout_threshold: self.layout_threshold,
            parameters: self.parameters.clone(),
            inspection_dir: self.inspection.work_dir.clone(),
            inspection_timeout: self.inspection.timeout_seconds.map(Duration::from_secs),
            exclude_patterns: self.inspection.exclude_patterns.clone(),
        }
    }
}

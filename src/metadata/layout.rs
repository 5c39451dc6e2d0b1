//! Layout metadata: the authorized shape of a supply chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use toto_rules::ArtifactRule;

use super::{substitute_parameters, MetadataError};
use crate::envelope::Envelope;
use crate::keys::Key;

/// `_type` value of layouts.
pub const LAYOUT_TYPE: &str = "layout";

fn default_threshold() -> usize {
    1
}

/// A step performed by one or more functionaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,

    #[serde(default)]
    pub expected_materials: Vec<ArtifactRule>,

    #[serde(default)]
    pub expected_products: Vec<ArtifactRule>,

    /// Keyids authorized to sign this step's link
    pub pubkeys: BTreeSet<String>,

    #[serde(default)]
    pub expected_command: Vec<String>,

    #[serde(default = "default_threshold")]
    pub threshold: usize,
}

/// A command the verifier runs itself after all steps passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspection {
    pub name: String,

    #[serde(default)]
    pub expected_materials: Vec<ArtifactRule>,

    #[serde(default)]
    pub expected_products: Vec<ArtifactRule>,

    pub run: Vec<String>,
}

/// Layout payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(rename = "_type")]
    pub type_: String,

    pub expires: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub readme: String,

    #[serde(default)]
    pub keys: BTreeMap<String, Key>,

    #[serde(default)]
    pub steps: Vec<Step>,

    #[serde(default)]
    pub inspect: Vec<Inspection>,
}

impl Layout {
    /// Decode, substitute parameters into, and validate a layout payload.
    ///
    /// Substitution only runs when `parameters` is non-empty. Signatures
    /// are not checked here.
    pub fn from_envelope(
        envelope: &Envelope,
        parameters: &BTreeMap<String, String>,
    ) -> Result<Self, MetadataError> {
        let mut value: serde_json::Value = envelope.decode()?;

        let actual = value.get("_type").and_then(|t| t.as_str()).unwrap_or_default();
        if actual != LAYOUT_TYPE {
            return Err(MetadataError::WrongType {
                expected: LAYOUT_TYPE.to_string(),
                actual: actual.to_string(),
            });
        }

        if !parameters.is_empty() {
            substitute_parameters(&mut value, parameters)?;
        }

        let layout: Layout = serde_json::from_value(value)?;
        layout.validate()?;
        Ok(layout)
    }

    /// Check structural invariants that do not depend on links.
    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.type_ != LAYOUT_TYPE {
            return Err(MetadataError::WrongType {
                expected: LAYOUT_TYPE.to_string(),
                actual: self.type_.clone(),
            });
        }

        for (listed, key) in &self.keys {
            if listed != &key.keyid {
                return Err(MetadataError::KeyIdLabel {
                    listed: listed.clone(),
                    declared: key.keyid.clone(),
                });
            }
        }

        let mut names = BTreeSet::new();
        let all_names = self
            .steps
            .iter()
            .map(|s| &s.name)
            .chain(self.inspect.iter().map(|i| &i.name));
        for name in all_names {
            if !names.insert(name) {
                return Err(MetadataError::DuplicateName(name.clone()));
            }
        }

        for step in &self.steps {
            if step.threshold == 0 || step.threshold > step.pubkeys.len() {
                return Err(MetadataError::InvalidThreshold {
                    step: step.name.clone(),
                    threshold: step.threshold,
                    keys: step.pubkeys.len(),
                });
            }
            if let Some(keyid) = step.pubkeys.iter().find(|k| !self.keys.contains_key(*k)) {
                return Err(MetadataError::UnknownStepKey {
                    step: step.name.clone(),
                    keyid: keyid.clone(),
                });
            }
        }

        if let Some(inspection) = self.inspect.iter().find(|i| i.run.is_empty()) {
            return Err(MetadataError::EmptyRun(inspection.name.clone()));
        }

        Ok(())
    }

    /// Look up a step by name.
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }
}

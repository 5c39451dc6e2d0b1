//! Link metadata: the recorded execution of one step.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use toto_rules::{ArtifactMap, ItemArtifacts};

use super::MetadataError;
use crate::envelope::Envelope;

/// `_type` value of links.
pub const LINK_TYPE: &str = "link";

/// Captured streams and exit status of a step command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Byproducts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,

    #[serde(
        rename = "return-value",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub return_value: Option<i64>,
}

/// Link payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "_type")]
    pub type_: String,

    pub name: String,

    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default)]
    pub materials: ArtifactMap,

    #[serde(default)]
    pub products: ArtifactMap,

    #[serde(default)]
    pub byproducts: Byproducts,

    #[serde(default)]
    pub environment: BTreeMap<String, serde_json::Value>,
}

impl Link {
    /// An empty link for `name`.
    pub fn new(name: &str) -> Self {
        Self {
            type_: LINK_TYPE.to_string(),
            name: name.to_string(),
            command: Vec::new(),
            materials: ArtifactMap::new(),
            products: ArtifactMap::new(),
            byproducts: Byproducts::default(),
            environment: BTreeMap::new(),
        }
    }

    /// Decode and type-check the payload of a link envelope.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, MetadataError> {
        let link: Link = envelope.decode()?;
        if link.type_ != LINK_TYPE {
            return Err(MetadataError::WrongType {
                expected: LINK_TYPE.to_string(),
                actual: link.type_,
            });
        }
        Ok(link)
    }

    pub fn return_value(&self) -> Option<i64> {
        self.byproducts.return_value
    }

    /// Materials and products for rule evaluation.
    pub fn artifacts(&self) -> ItemArtifacts {
        ItemArtifacts::new(self.materials.clone(), self.products.clone())
    }
}

//! Layout and link metadata.

mod layout;
mod link;
mod params;

pub use layout::{Inspection, Layout, Step, LAYOUT_TYPE};
pub use link::{Byproducts, Link, LINK_TYPE};
pub use params::substitute_parameters;

/// Errors for decoding and validating metadata
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("envelope error: {0}")]
    Envelope(#[from] crate::envelope::EnvelopeError),

    #[error("expected metadata of type '{expected}', got '{actual}'")]
    WrongType { expected: String, actual: String },

    #[error("duplicate step or inspection name '{0}'")]
    DuplicateName(String),

    #[error("step '{step}' has threshold {threshold} but {keys} authorized key(s)")]
    InvalidThreshold {
        step: String,
        threshold: usize,
        keys: usize,
    },

    #[error("step '{step}' authorizes keyid {keyid}, which is not in the layout keys")]
    UnknownStepKey { step: String, keyid: String },

    #[error("layout key listed under '{listed}' declares keyid '{declared}'")]
    KeyIdLabel { listed: String, declared: String },

    #[error("inspection '{0}' has an empty run command")]
    EmptyRun(String),

    #[error("placeholder pattern error: {0}")]
    Placeholder(#[from] regex_lite::Error),

    #[error("layout references parameter '{0}' which was not supplied")]
    MissingParameter(String),
}

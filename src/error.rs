//! Verification errors and soft warnings.
//!
//! Every [`VerifyError`] is fatal and ends the verification run. Soft
//! findings are collected as [`Warning`]s on the report instead.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use toto_rules::{ArtifactKind, RuleError, RuleViolation};

use crate::envelope::EnvelopeError;
use crate::keys::KeyError;
use crate::metadata::MetadataError;
use crate::runner::RecordError;

/// Fatal verification errors
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("no layout verification key was supplied")]
    NoLayoutKeys,

    #[error("failed to load link '{}': {source}", path.display())]
    LinkLoad {
        path: PathBuf,
        #[source]
        source: Box<VerifyError>,
    },

    #[error("no link found for step '{step}'")]
    LinkNotFound { step: String },

    #[error("link file '{file}' is named for step '{expected}' but records step '{actual}'")]
    LinkNameMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("link keyid prefix '{prefix}' for step '{step}' matches more than one authorized key")]
    AmbiguousLink { step: String, prefix: String },

    #[error("'{item}' requires {required} valid signature(s) from authorized keys, found {valid}")]
    Threshold {
        item: String,
        required: usize,
        valid: usize,
    },

    #[error("layout expired on {expires}")]
    ExpiredLayout { expires: DateTime<Utc> },

    #[error("{0}")]
    RuleViolation(Box<RuleViolation>),

    #[error("invalid rule '{rule}' in 'expected_{kind}' of item '{item}': {reason}")]
    InvalidRule {
        item: String,
        kind: ArtifactKind,
        rule: String,
        reason: String,
    },

    #[error("failed to record artifacts: {0}")]
    Record(#[from] RecordError),
}

impl From<RuleError> for VerifyError {
    fn from(err: RuleError) -> Self {
        match err {
            RuleError::Violation(violation) => VerifyError::RuleViolation(violation),
            RuleError::InvalidRule {
                item,
                kind,
                rule,
                reason,
            } => VerifyError::InvalidRule {
                item,
                kind,
                rule,
                reason,
            },
        }
    }
}

impl VerifyError {
    /// Error class name reported to users.
    pub fn class(&self) -> &'static str {
        match self {
            VerifyError::Key(KeyError::AmbiguousKey { .. }) => "AmbiguousKeyError",
            VerifyError::Key(KeyError::NotFound { .. }) => "NotFoundError",
            VerifyError::Key(_) => "KeyError",
            VerifyError::Envelope(_) => "EnvelopeError",
            VerifyError::Metadata(MetadataError::UnknownStepKey { .. }) => "NotFoundError",
            VerifyError::Metadata(_) => "LayoutFormatError",
            VerifyError::NoLayoutKeys => "NotFoundError",
            VerifyError::LinkLoad { source, .. } => source.class(),
            VerifyError::LinkNotFound { .. } => "NotFoundError",
            VerifyError::LinkNameMismatch { .. } => "LinkNameError",
            VerifyError::AmbiguousLink { .. } => "AmbiguousLinkError",
            VerifyError::Threshold { .. } => "ThresholdError",
            VerifyError::ExpiredLayout { .. } => "ExpiredLayoutError",
            VerifyError::RuleViolation(_) => "RuleViolation",
            VerifyError::InvalidRule { .. } => "InvalidRuleError",
            VerifyError::Record(_) => "RecordError",
        }
    }

    /// The rule violation, if this error is one.
    pub fn violation(&self) -> Option<&RuleViolation> {
        match self {
            VerifyError::RuleViolation(violation) => Some(violation.as_ref()),
            _ => None,
        }
    }
}

/// Non-fatal findings reported alongside the verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Warning {
    /// A link recorded a different command than the step expects.
    CommandMismatch {
        step: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// An inspection command failed to run, timed out, or exited non-zero.
    InspectionExecution { inspection: String, reason: String },
}

impl Warning {
    pub fn class(&self) -> &'static str {
        match self {
            Warning::CommandMismatch { .. } => "CommandMismatchWarning",
            Warning::InspectionExecution { .. } => "InspectionExecutionError",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::CommandMismatch {
                step,
                expected,
                actual,
            } => write!(
                f,
                "run command {:?} of step '{}' differs from expected command {:?}",
                actual, step, expected
            ),
            Warning::InspectionExecution { inspection, reason } => {
                write!(f, "inspection '{}': {}", inspection, reason)
            }
        }
    }
}

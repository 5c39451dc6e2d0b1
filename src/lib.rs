//! Supply chain verification.
//!
//! A signed layout declares the steps of a supply chain, who may perform
//! them and which artifacts each may consume and produce. Every executed
//! step is recorded in a signed link. [`LayoutVerifier`] checks the layout
//! signatures and expiry, resolves and verifies one link per step, runs the
//! layout's inspections locally and applies the artifact rules of
//! [`toto_rules`] to all of them.

pub mod config;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod links;
pub mod logging;
pub mod metadata;
pub mod runner;
pub mod verify;

pub use envelope::{Envelope, EnvelopeError, Signature};
pub use error::{VerifyError, Warning};
pub use keys::{Key, KeyError, KeyRegistry};
pub use links::{LinkStore, LoadedLink};
pub use metadata::{Inspection, Layout, Link, MetadataError, Step};
pub use runner::{ArtifactRecorder, CommandOutput, CommandRunner, ProcessRunner, RunnerError};
pub use verify::{LayoutVerifier, VerificationReport, VerifyOptions};

pub use toto_rules::{
    ArtifactKind, ArtifactMap, ArtifactRule, Digests, MatchContext, RuleError, RuleViolation,
};

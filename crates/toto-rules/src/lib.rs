//! Artifact rule language for supply chain layouts.
//!
//! A layout constrains each step's materials and products with ordered rule
//! lists. This crate parses those lists into typed [`ArtifactRule`]s and
//! evaluates them with [`verify_rules`], producing either an outcome with a
//! queue trace or a [`RuleViolation`] carrying the same trace.

mod engine;
mod pattern;
mod rule;
mod trace;

pub use engine::{
    verify_rules, ArtifactMap, Digests, ItemArtifacts, MatchContext, RuleError, RuleOutcome,
    RuleViolation, ViolationReason,
};
pub use pattern::Pattern;
pub use rule::{ArtifactKind, ArtifactRule, MatchRule, RuleParseError};
pub use trace::{format_paths, Trace, TraceEntry};

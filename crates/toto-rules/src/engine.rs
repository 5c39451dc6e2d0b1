//! Queue-based rule evaluation.
//!
//! A rule list is evaluated against one artifact map of one item (a step
//! or inspection). The queue starts as every path of that map; consuming
//! rules (MATCH, ALLOW, CREATE, DELETE, MODIFY) remove paths from it, and
//! DISALLOW fails on anything still queued. Paths no rule consumed are
//! returned as unclassified, they are not an error by themselves.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::rule::{ArtifactKind, ArtifactRule, MatchRule};
use crate::trace::{format_paths, Trace};

/// Digest set of one artifact: hash algorithm -> lowercase hex digest.
pub type Digests = BTreeMap<String, String>;

/// Relative artifact path -> digests.
pub type ArtifactMap = BTreeMap<String, Digests>;

/// Materials and products recorded for one item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemArtifacts {
    pub materials: ArtifactMap,
    pub products: ArtifactMap,
}

impl ItemArtifacts {
    pub fn new(materials: ArtifactMap, products: ArtifactMap) -> Self {
        Self {
            materials,
            products,
        }
    }

    /// The map of the given kind.
    pub fn get(&self, kind: ArtifactKind) -> &ArtifactMap {
        match kind {
            ArtifactKind::Materials => &self.materials,
            ArtifactKind::Products => &self.products,
        }
    }
}

/// Artifacts of the items verified so far, used to resolve MATCH rules.
///
/// The context only grows: an item is recorded once it has passed
/// verification, so MATCH can never observe a later item.
#[derive(Debug, Clone, Default)]
pub struct MatchContext {
    items: BTreeMap<String, ItemArtifacts>,
}

impl MatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a verified item.
    pub fn record(&mut self, name: impl Into<String>, artifacts: ItemArtifacts) {
        self.items.insert(name.into(), artifacts);
    }

    pub fn get(&self, name: &str) -> Option<&ItemArtifacts> {
        self.items.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Why a rule failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViolationReason {
    /// A DISALLOW pattern matched queued artifacts.
    Disallowed { matched: Vec<String> },

    /// A REQUIRE path is absent from the constrained map.
    MissingRequired { path: String, available: Vec<String> },
}

/// A failed rule together with the queue trace leading up to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleViolation {
    pub item: String,
    pub kind: ArtifactKind,
    pub rule: String,
    pub reason: ViolationReason,
    pub trace: Trace,
}

impl RuleViolation {
    /// Artifacts named by the violation.
    pub fn matched(&self) -> &[String] {
        match &self.reason {
            ViolationReason::Disallowed { matched } => matched,
            ViolationReason::MissingRequired { .. } => &[],
        }
    }
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            ViolationReason::Disallowed { matched } => writeln!(
                f,
                "'{}' matched the following artifacts: {}",
                self.rule,
                format_paths(matched)
            )?,
            ViolationReason::MissingRequired { path, available } => writeln!(
                f,
                "'{}' did not find '{}' in the following artifacts: {}",
                self.rule,
                path,
                format_paths(available)
            )?,
        }
        write!(f, "{}", self.trace)
    }
}

/// Errors from evaluating a rule list.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("{0}")]
    Violation(Box<RuleViolation>),

    #[error("invalid rule '{rule}' in 'expected_{kind}' of item '{item}': {reason}")]
    InvalidRule {
        item: String,
        kind: ArtifactKind,
        rule: String,
        reason: String,
    },
}

/// Result of a rule list that passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    /// Paths left in the queue after the last rule
    pub unclassified: BTreeSet<String>,

    /// Queue trace for every rule
    pub trace: Trace,
}

/// Evaluate `rules` against the `kind` map of `item`.
///
/// MATCH rules may reference `item` itself or any item recorded in
/// `context`; any other name is reported as [`RuleError::InvalidRule`].
pub fn verify_rules(
    item: &str,
    kind: ArtifactKind,
    rules: &[ArtifactRule],
    artifacts: &ItemArtifacts,
    context: &MatchContext,
) -> Result<RuleOutcome, RuleError> {
    let this_map = artifacts.get(kind);
    let mut queue: BTreeSet<String> = this_map.keys().cloned().collect();
    let mut trace = Trace::new(
        item,
        kind,
        artifacts.materials.keys(),
        artifacts.products.keys(),
    );

    for rule in rules {
        let consumed: BTreeSet<String> = match rule {
            ArtifactRule::Match(match_rule) => {
                let other = if match_rule.from_step == item {
                    artifacts
                } else {
                    context.get(&match_rule.from_step).ok_or_else(|| RuleError::InvalidRule {
                        item: item.to_string(),
                        kind,
                        rule: rule.to_string(),
                        reason: format!(
                            "'{}' is not a step or inspection verified before '{}'",
                            match_rule.from_step, item
                        ),
                    })?
                };
                match_consumed(match_rule, &queue, this_map, other.get(match_rule.kind))
            }
            ArtifactRule::Allow(pattern) => pattern.filter(&queue),
            ArtifactRule::Disallow(pattern) => {
                let matched = pattern.filter(&queue);
                if !matched.is_empty() {
                    return Err(violation(
                        rule,
                        ViolationReason::Disallowed {
                            matched: matched.into_iter().collect(),
                        },
                        trace,
                    ));
                }
                BTreeSet::new()
            }
            ArtifactRule::Require(path) => {
                if !this_map.contains_key(path) {
                    return Err(violation(
                        rule,
                        ViolationReason::MissingRequired {
                            path: path.clone(),
                            available: this_map.keys().cloned().collect(),
                        },
                        trace,
                    ));
                }
                BTreeSet::new()
            }
            ArtifactRule::Create(pattern) => pattern
                .filter(&queue)
                .into_iter()
                .filter(|path| {
                    artifacts.products.contains_key(path) && !artifacts.materials.contains_key(path)
                })
                .collect(),
            ArtifactRule::Delete(pattern) => pattern
                .filter(&queue)
                .into_iter()
                .filter(|path| {
                    artifacts.materials.contains_key(path) && !artifacts.products.contains_key(path)
                })
                .collect(),
            ArtifactRule::Modify(pattern) => pattern
                .filter(&queue)
                .into_iter()
                .filter(|path| {
                    match (artifacts.materials.get(path), artifacts.products.get(path)) {
                        (Some(before), Some(after)) => before != after,
                        _ => false,
                    }
                })
                .collect(),
        };

        queue.retain(|path| !consumed.contains(path));
        trace.record(rule.to_string(), &queue);
    }

    Ok(RuleOutcome {
        unclassified: queue,
        trace,
    })
}

fn violation(rule: &ArtifactRule, reason: ViolationReason, trace: Trace) -> RuleError {
    RuleError::Violation(Box::new(RuleViolation {
        item: trace.item.clone(),
        kind: trace.kind,
        rule: rule.to_string(),
        reason,
        trace,
    }))
}

/// `"a/b/"` and `"a/b"` both become `"a/b/"`; an empty prefix stays empty.
fn directory_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// Queue paths with a hash-equal counterpart in `other_map`.
fn match_consumed(
    rule: &MatchRule,
    queue: &BTreeSet<String>,
    this_map: &ArtifactMap,
    other_map: &ArtifactMap,
) -> BTreeSet<String> {
    let source_prefix = rule.source_prefix.as_deref().map(directory_prefix);
    let destination_prefix = rule.destination_prefix.as_deref().map(directory_prefix);

    queue
        .iter()
        .filter(|path| {
            let stripped = match &source_prefix {
                Some(prefix) => match path.strip_prefix(prefix.as_str()) {
                    Some(rest) => rest,
                    None => return false,
                },
                None => path.as_str(),
            };
            if !rule.pattern.matches(stripped) {
                return false;
            }

            let counterpart = match &destination_prefix {
                Some(prefix) => format!("{}{}", prefix, stripped),
                None => stripped.to_string(),
            };
            match (this_map.get(path.as_str()), other_map.get(&counterpart)) {
                (Some(ours), Some(theirs)) => ours == theirs,
                _ => false,
            }
        })
        .cloned()
        .collect()
}

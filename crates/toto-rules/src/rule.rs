//! Typed artifact rules and their keyword-list encoding.
//!
//! In layouts a rule is a list of strings whose first element is the rule
//! keyword, e.g. `["MATCH", "src/*", "WITH", "PRODUCTS", "FROM", "clone"]`.
//! Rules are parsed into [`ArtifactRule`] once, when the layout is loaded.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::pattern::Pattern;

/// Which artifact map of an item a rule list or MATCH refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Materials,
    Products,
}

impl ArtifactKind {
    /// Keyword used inside MATCH rules.
    pub fn keyword(&self) -> &'static str {
        match self {
            ArtifactKind::Materials => "MATERIALS",
            ArtifactKind::Products => "PRODUCTS",
        }
    }

    /// Lowercase name, as used in `expected_materials`/`expected_products`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Materials => "materials",
            ArtifactKind::Products => "products",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from parsing a keyword list into a rule.
#[derive(Debug, thiserror::Error)]
pub enum RuleParseError {
    #[error("rule is empty")]
    Empty,

    #[error("unknown rule keyword '{0}'")]
    UnknownKeyword(String),

    #[error("wrong rule format for '{rule}', expected {expected}")]
    WrongFormat { rule: String, expected: &'static str },

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// MATCH rule arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRule {
    /// Pattern applied to queue paths (after the source prefix is stripped)
    pub pattern: Pattern,

    /// Only queue paths under this directory are candidates
    pub source_prefix: Option<String>,

    /// Which map of the referenced item to compare against
    pub kind: ArtifactKind,

    /// Directory prepended to the stripped path in the referenced map
    pub destination_prefix: Option<String>,

    /// Name of the referenced step or inspection
    pub from_step: String,
}

/// One rule of an `expected_materials` or `expected_products` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactRule {
    Match(MatchRule),
    Allow(Pattern),
    Disallow(Pattern),
    Require(String),
    Create(Pattern),
    Delete(Pattern),
    Modify(Pattern),
}

const GENERIC_FORMAT: &str = "'<KEYWORD> <pattern>'";
const MATCH_FORMAT: &str =
    "'MATCH <pattern> [IN <source-prefix>] WITH (MATERIALS|PRODUCTS) [IN <destination-prefix>] FROM <step>'";

impl ArtifactRule {
    /// Parse a keyword list. Keywords are case-insensitive.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<Self, RuleParseError> {
        let tokens: Vec<&str> = tokens.iter().map(|t| t.as_ref()).collect();
        let keyword = tokens.first().ok_or(RuleParseError::Empty)?.to_ascii_uppercase();

        if keyword == "MATCH" {
            return parse_match(&tokens).map(ArtifactRule::Match);
        }

        let build: fn(Pattern) -> ArtifactRule = match keyword.as_str() {
            "ALLOW" => ArtifactRule::Allow,
            "DISALLOW" => ArtifactRule::Disallow,
            "CREATE" => ArtifactRule::Create,
            "DELETE" => ArtifactRule::Delete,
            "MODIFY" => ArtifactRule::Modify,
            "REQUIRE" => {
                if tokens.len() != 2 {
                    return Err(wrong_format(&tokens, GENERIC_FORMAT));
                }
                return Ok(ArtifactRule::Require(tokens[1].to_string()));
            }
            _ => return Err(RuleParseError::UnknownKeyword(tokens[0].to_string())),
        };

        if tokens.len() != 2 {
            return Err(wrong_format(&tokens, GENERIC_FORMAT));
        }
        Ok(build(compile(tokens[1])?))
    }

    /// Upper-case keyword of this rule.
    pub fn keyword(&self) -> &'static str {
        match self {
            ArtifactRule::Match(_) => "MATCH",
            ArtifactRule::Allow(_) => "ALLOW",
            ArtifactRule::Disallow(_) => "DISALLOW",
            ArtifactRule::Require(_) => "REQUIRE",
            ArtifactRule::Create(_) => "CREATE",
            ArtifactRule::Delete(_) => "DELETE",
            ArtifactRule::Modify(_) => "MODIFY",
        }
    }

    /// Canonical keyword-list form.
    pub fn to_tokens(&self) -> Vec<String> {
        let mut tokens = vec![self.keyword().to_string()];
        match self {
            ArtifactRule::Match(rule) => {
                tokens.push(rule.pattern.as_str().to_string());
                if let Some(prefix) = &rule.source_prefix {
                    tokens.push("IN".to_string());
                    tokens.push(prefix.clone());
                }
                tokens.push("WITH".to_string());
                tokens.push(rule.kind.keyword().to_string());
                if let Some(prefix) = &rule.destination_prefix {
                    tokens.push("IN".to_string());
                    tokens.push(prefix.clone());
                }
                tokens.push("FROM".to_string());
                tokens.push(rule.from_step.clone());
            }
            ArtifactRule::Require(path) => tokens.push(path.clone()),
            ArtifactRule::Allow(p)
            | ArtifactRule::Disallow(p)
            | ArtifactRule::Create(p)
            | ArtifactRule::Delete(p)
            | ArtifactRule::Modify(p) => tokens.push(p.as_str().to_string()),
        }
        tokens
    }
}

fn compile(raw: &str) -> Result<Pattern, RuleParseError> {
    Pattern::new(raw).map_err(|source| RuleParseError::InvalidPattern {
        pattern: raw.to_string(),
        source,
    })
}

fn wrong_format(tokens: &[&str], expected: &'static str) -> RuleParseError {
    RuleParseError::WrongFormat {
        rule: tokens.join(" "),
        expected,
    }
}

fn parse_match(tokens: &[&str]) -> Result<MatchRule, RuleParseError> {
    let fail = || wrong_format(tokens, MATCH_FORMAT);
    let is_keyword = |idx: usize, keyword: &str| {
        tokens
            .get(idx)
            .map_or(false, |t| t.eq_ignore_ascii_case(keyword))
    };

    let pattern = compile(tokens.get(1).ok_or_else(fail)?)?;
    let mut idx = 2;

    let mut source_prefix = None;
    if is_keyword(idx, "IN") {
        source_prefix = Some(tokens.get(idx + 1).ok_or_else(fail)?.to_string());
        idx += 2;
    }

    if !is_keyword(idx, "WITH") {
        return Err(fail());
    }
    idx += 1;

    let kind = match tokens.get(idx).map(|t| t.to_ascii_uppercase()).as_deref() {
        Some("MATERIALS") => ArtifactKind::Materials,
        Some("PRODUCTS") => ArtifactKind::Products,
        _ => return Err(fail()),
    };
    idx += 1;

    let mut destination_prefix = None;
    if is_keyword(idx, "IN") {
        destination_prefix = Some(tokens.get(idx + 1).ok_or_else(fail)?.to_string());
        idx += 2;
    }

    if !is_keyword(idx, "FROM") {
        return Err(fail());
    }
    let from_step = tokens.get(idx + 1).ok_or_else(fail)?.to_string();

    if tokens.len() != idx + 2 {
        return Err(fail());
    }

    Ok(MatchRule {
        pattern,
        source_prefix,
        kind,
        destination_prefix,
        from_step,
    })
}

impl fmt::Display for ArtifactRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_tokens().join(" "))
    }
}

/// Parses the space-separated form, e.g. `"DISALLOW *"`.
impl FromStr for ArtifactRule {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        Self::parse(&tokens)
    }
}

impl Serialize for ArtifactRule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_tokens().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ArtifactRule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tokens = Vec::<String>::deserialize(deserializer)?;
        ArtifactRule::parse(&tokens).map_err(de::Error::custom)
    }
}

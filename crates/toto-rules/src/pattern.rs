//! Shell-style path patterns.
//!
//! Patterns use `fnmatch` semantics rather than path-aware globbing: `*`
//! crosses `/`, and a backslash is an ordinary character. Braces are
//! literal and `**` is the same as `*`; neither has globset's meaning.

use globset::{GlobBuilder, GlobMatcher};
use std::collections::BTreeSet;
use std::fmt;

/// A compiled artifact path pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    matcher: GlobMatcher,
}

impl Pattern {
    /// Compile a pattern.
    pub fn new(raw: &str) -> Result<Self, globset::Error> {
        let glob = GlobBuilder::new(&to_glob(raw))
            .literal_separator(false)
            .backslash_escape(false)
            .build()?;

        Ok(Self {
            raw: raw.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    /// The pattern as written in the layout.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Check a single relative artifact path.
    pub fn matches(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }

    /// Paths from `paths` matching this pattern.
    pub fn filter<'a, I>(&self, paths: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        paths
            .into_iter()
            .filter(|path| self.matches(path))
            .cloned()
            .collect()
    }
}

/// Rewrite an fnmatch pattern into globset syntax.
///
/// Bracket expressions are copied through untouched. A `]` right after `[`
/// or `[!` is part of the class.
fn to_glob(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('!');
                }
                let mut first = true;
                for c in chars.by_ref() {
                    out.push(c);
                    if c == ']' && !first {
                        break;
                    }
                    first = false;
                }
            }
            '{' | '}' => {
                out.push('[');
                out.push(c);
                out.push(']');
            }
            '*' => {
                out.push('*');
                while chars.peek() == Some(&'*') {
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }
    out
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Pattern {}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

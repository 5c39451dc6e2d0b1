//! Queue trace recorded while a rule list is evaluated.
//!
//! The rendered trace is the primary diagnostic shown to users when a rule
//! fails, so its text form is stable:
//!
//! ```text
//! Full trace for 'expected_materials' of item 'package':
//! Available materials (used for queue):
//! ['demo-project/foo.py']
//! Available products:
//! ['demo-project.tar.gz']
//! Queue after 'MATCH demo-project/* WITH PRODUCTS FROM update-version':
//! ['demo-project/foo.py']
//! ```

use serde::Serialize;
use std::fmt;

use crate::rule::ArtifactKind;

/// Queue contents after one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub rule: String,
    pub queue: Vec<String>,
}

/// Full evaluation trace for one rule list of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trace {
    pub item: String,
    pub kind: ArtifactKind,
    pub materials: Vec<String>,
    pub products: Vec<String>,
    pub entries: Vec<TraceEntry>,
}

impl Trace {
    pub(crate) fn new<'a, M, P>(item: &str, kind: ArtifactKind, materials: M, products: P) -> Self
    where
        M: IntoIterator<Item = &'a String>,
        P: IntoIterator<Item = &'a String>,
    {
        Self {
            item: item.to_string(),
            kind,
            materials: sorted(materials),
            products: sorted(products),
            entries: Vec::new(),
        }
    }

    pub(crate) fn record<'a, I>(&mut self, rule: String, queue: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        self.entries.push(TraceEntry {
            rule,
            queue: sorted(queue),
        });
    }
}

fn sorted<'a, I: IntoIterator<Item = &'a String>>(paths: I) -> Vec<String> {
    let mut paths: Vec<String> = paths.into_iter().cloned().collect();
    paths.sort();
    paths
}

/// Render paths as `['a', 'b']`.
pub fn format_paths<I, S>(paths: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let quoted: Vec<String> = paths
        .into_iter()
        .map(|p| format!("'{}'", p.as_ref()))
        .collect();
    format!("[{}]", quoted.join(", "))
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = |kind: ArtifactKind| {
            if kind == self.kind {
                " (used for queue)"
            } else {
                ""
            }
        };

        writeln!(
            f,
            "Full trace for 'expected_{}' of item '{}':",
            self.kind, self.item
        )?;
        writeln!(f, "Available materials{}:", marker(ArtifactKind::Materials))?;
        writeln!(f, "{}", format_paths(&self.materials))?;
        writeln!(f, "Available products{}:", marker(ArtifactKind::Products))?;
        writeln!(f, "{}", format_paths(&self.products))?;
        for entry in &self.entries {
            writeln!(f, "Queue after '{}':", entry.rule)?;
            writeln!(f, "{}", format_paths(&entry.queue))?;
        }
        Ok(())
    }
}

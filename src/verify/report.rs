//! Verification report

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::error::Warning;

/// Outcome of one verified step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// Step name
    pub name: String,

    /// The link that satisfied the step
    pub link: String,

    /// Authorized keyids with a valid signature on that link
    pub signers: BTreeSet<String>,

    /// Materials no rule consumed
    pub unclassified_materials: BTreeSet<String>,

    /// Products no rule consumed
    pub unclassified_products: BTreeSet<String>,
}

/// Outcome of one inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectionReport {
    pub name: String,

    /// Exit code of the inspection command, if it ran to completion
    pub return_value: Option<i32>,

    pub timed_out: bool,

    pub unclassified_materials: BTreeSet<String>,

    pub unclassified_products: BTreeSet<String>,
}

/// Result of a successful verification run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// Expiry of the verified layout
    pub layout_expires: DateTime<Utc>,

    /// Layout keys with a valid signature on the layout
    pub layout_signers: BTreeSet<String>,

    /// Steps in layout order
    pub steps: Vec<StepReport>,

    /// Inspections in layout order
    pub inspections: Vec<InspectionReport>,

    /// Soft findings, in the order they were raised
    pub warnings: Vec<Warning>,
}

impl VerificationReport {
    /// One-line human summary
    pub fn human_summary(&self) -> String {
        let mut summary = format!(
            "verified {} step(s) and {} inspection(s)",
            self.steps.len(),
            self.inspections.len()
        );
        if !self.warnings.is_empty() {
            summary.push_str(&format!(" with {} warning(s)", self.warnings.len()));
        }
        summary
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(warnings: Vec<Warning>) -> VerificationReport {
        VerificationReport {
            layout_expires: "2030-01-01T00:00:00Z".parse().unwrap(),
            layout_signers: BTreeSet::new(),
            steps: vec![StepReport {
                name: "clone".to_string(),
                link: "clone.776a00e2.link".to_string(),
                signers: BTreeSet::new(),
                unclassified_materials: BTreeSet::new(),
                unclassified_products: BTreeSet::new(),
            }],
            inspections: Vec::new(),
            warnings,
        }
    }

    #[test]
    fn test_human_summary() {
        assert_eq!(
            report(Vec::new()).human_summary(),
            "verified 1 step(s) and 0 inspection(s)"
        );

        let warned = report(vec![Warning::InspectionExecution {
            inspection: "untar".to_string(),
            reason: "exited with status 2".to_string(),
        }]);
        assert_eq!(
            warned.human_summary(),
            "verified 1 step(s) and 0 inspection(s) with 1 warning(s)"
        );
    }

    #[test]
    fn test_report_json_tags_warnings() {
        let json = report(vec![Warning::CommandMismatch {
            step: "clone".to_string(),
            expected: vec!["git".to_string()],
            actual: vec!["hg".to_string()],
        }])
        .to_json()
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["warnings"][0]["type"], "command_mismatch");
        assert_eq!(value["steps"][0]["name"], "clone");
    }
}

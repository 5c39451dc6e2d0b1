//! Layout verification.
//!
//! [`LayoutVerifier::verify`] runs the stages strictly in order: layout
//! signature threshold, layout decoding, expiry, every step in layout
//! order, then every inspection in layout order. The first fatal error ends
//! the run; warnings accumulate on the [`VerificationReport`].

mod inspection;
mod report;
mod step;

pub use inspection::{run_inspection, VerifiedInspection};
pub use report::{InspectionReport, StepReport, VerificationReport};
pub use step::{verify_step, VerifiedStep};

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;
use toto_rules::MatchContext;

use crate::envelope::{verify_threshold, Envelope};
use crate::error::VerifyError;
use crate::keys::{Key, KeyRegistry};
use crate::links::LinkStore;
use crate::metadata::Layout;
use crate::runner::{ArtifactRecorder, CommandRunner, ProcessRunner};

/// Item name used for the layout in threshold errors.
pub const LAYOUT_ITEM: &str = "layout";

/// Inputs of a verification run besides layout, keys and links.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Time the layout expiry is compared against; now when unset
    pub reference_time: Option<DateTime<Utc>>,

    /// Layout signatures required; all supplied layout keys when unset
    pub layout_threshold: Option<usize>,

    /// Values substituted for `{NAME}` placeholders in the layout
    pub parameters: BTreeMap<String, String>,

    /// Directory inspections run and record artifacts in
    pub inspection_dir: PathBuf,

    pub inspection_timeout: Option<Duration>,

    /// Paths skipped when recording inspection artifacts
    pub exclude_patterns: Vec<String>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            reference_time: None,
            layout_threshold: None,
            parameters: BTreeMap::new(),
            inspection_dir: PathBuf::from("."),
            inspection_timeout: None,
            exclude_patterns: Vec::new(),
        }
    }
}

/// Verifies a signed layout against its links.
#[derive(Debug, Clone)]
pub struct LayoutVerifier<R = ProcessRunner> {
    options: VerifyOptions,
    runner: R,
}

impl LayoutVerifier<ProcessRunner> {
    /// A verifier running inspections as real processes.
    pub fn new(options: VerifyOptions) -> Self {
        Self::with_runner(options, ProcessRunner::default())
    }
}

impl<R: CommandRunner> LayoutVerifier<R> {
    pub fn with_runner(options: VerifyOptions, runner: R) -> Self {
        Self { options, runner }
    }

    pub fn options(&self) -> &VerifyOptions {
        &self.options
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Verify `layout` signed by `layout_keys` against `links`.
    ///
    /// Holds no state between calls; repeated runs over the same inputs
    /// give the same result.
    pub fn verify(
        &self,
        layout: &Envelope,
        layout_keys: &[Key],
        links: &LinkStore,
    ) -> Result<VerificationReport, VerifyError> {
        if layout_keys.is_empty() {
            return Err(VerifyError::NoLayoutKeys);
        }

        let root = KeyRegistry::from_keys(layout_keys.iter().cloned())?;
        let authorized: BTreeSet<String> = root.keyids().cloned().collect();
        let threshold = self.options.layout_threshold.unwrap_or(root.len());
        let payload = layout.signed_bytes()?;
        let layout_signers = verify_threshold(
            LAYOUT_ITEM,
            &payload,
            &layout.signatures,
            &authorized,
            threshold,
            &root,
        )?;
        tracing::info!(signers = layout_signers.len(), "layout signature verified");

        let decoded = Layout::from_envelope(layout, &self.options.parameters)?;

        let now = self.options.reference_time.unwrap_or_else(Utc::now);
        if decoded.expires < now {
            return Err(VerifyError::ExpiredLayout {
                expires: decoded.expires,
            });
        }
        tracing::debug!(expires = %decoded.expires, "layout not expired");

        let registry = KeyRegistry::from_keys(
            layout_keys
                .iter()
                .cloned()
                .chain(decoded.keys.values().cloned()),
        )?;

        let mut context = MatchContext::new();
        let mut warnings = Vec::new();

        let mut steps = Vec::with_capacity(decoded.steps.len());
        for step in &decoded.steps {
            let verified = verify_step(step, links, &registry, &context)?;
            context.record(step.name.clone(), verified.artifacts);
            warnings.extend(verified.warnings);
            steps.push(verified.report);
        }

        let recorder = ArtifactRecorder::new(&self.options.exclude_patterns)?;
        let mut inspections = Vec::with_capacity(decoded.inspect.len());
        for inspection in &decoded.inspect {
            let verified = run_inspection(
                inspection,
                &self.runner,
                &recorder,
                &self.options.inspection_dir,
                self.options.inspection_timeout,
                &context,
            )?;
            context.record(inspection.name.clone(), verified.link.artifacts());
            warnings.extend(verified.warnings);
            inspections.push(verified.report);
        }

        tracing::info!(
            steps = steps.len(),
            inspections = inspections.len(),
            warnings = warnings.len(),
            "verification passed"
        );

        Ok(VerificationReport {
            layout_expires: decoded.expires,
            layout_signers,
            steps,
            inspections,
            warnings,
        })
    }
}

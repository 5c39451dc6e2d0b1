//! Verification of a single step against its links.

use toto_rules::{verify_rules, ArtifactKind, ItemArtifacts, MatchContext};

use super::report::StepReport;
use crate::envelope::verify_threshold;
use crate::error::{VerifyError, Warning};
use crate::keys::KeyRegistry;
use crate::links::{LinkStore, LoadedLink};
use crate::metadata::Step;

/// A step that passed, with the artifacts later rules may MATCH against.
#[derive(Debug, Clone)]
pub struct VerifiedStep {
    pub report: StepReport,
    pub artifacts: ItemArtifacts,
    pub warnings: Vec<Warning>,
}

/// Verify `step` using the first candidate link that passes.
///
/// Each candidate goes through threshold, command and rule checks. If none
/// passes, the error of the last candidate is returned.
pub fn verify_step(
    step: &Step,
    links: &LinkStore,
    registry: &KeyRegistry,
    context: &MatchContext,
) -> Result<VerifiedStep, VerifyError> {
    let span = tracing::info_span!("step", name = %step.name);
    let _guard = span.enter();

    let candidates = links.candidates(step)?;
    let mut last_error = None;

    for candidate in candidates {
        match verify_candidate(step, candidate, registry, context) {
            Ok(verified) => {
                tracing::info!(link = %verified.report.link, "step verified");
                return Ok(verified);
            }
            Err(err) => {
                tracing::debug!(link = %candidate.label(), error = %err, "link rejected");
                last_error = Some(err);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| VerifyError::LinkNotFound {
        step: step.name.clone(),
    }))
}

fn verify_candidate(
    step: &Step,
    candidate: &LoadedLink,
    registry: &KeyRegistry,
    context: &MatchContext,
) -> Result<VerifiedStep, VerifyError> {
    let payload = candidate.envelope.signed_bytes()?;
    let signers = verify_threshold(
        &step.name,
        &payload,
        &candidate.envelope.signatures,
        &step.pubkeys,
        step.threshold,
        registry,
    )?;

    let link = &candidate.link;
    let mut warnings = Vec::new();
    if link.command != step.expected_command {
        let warning = Warning::CommandMismatch {
            step: step.name.clone(),
            expected: step.expected_command.clone(),
            actual: link.command.clone(),
        };
        tracing::warn!("{}", warning);
        warnings.push(warning);
    }

    let artifacts = link.artifacts();
    let materials = verify_rules(
        &step.name,
        ArtifactKind::Materials,
        &step.expected_materials,
        &artifacts,
        context,
    )?;
    let products = verify_rules(
        &step.name,
        ArtifactKind::Products,
        &step.expected_products,
        &artifacts,
        context,
    )?;

    Ok(VerifiedStep {
        report: StepReport {
            name: step.name.clone(),
            link: candidate.label(),
            signers,
            unclassified_materials: materials.unclassified,
            unclassified_products: products.unclassified,
        },
        artifacts,
        warnings,
    })
}

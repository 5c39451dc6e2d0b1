//! Local inspections.
//!
//! The verifier runs an inspection's command itself, recording the working
//! directory before and after. The result is shaped like a link and checked
//! with the same rules engine as a step, but carries no signatures.

use std::path::Path;
use std::time::Duration;
use toto_rules::{verify_rules, ArtifactKind, MatchContext};

use super::report::InspectionReport;
use crate::error::{VerifyError, Warning};
use crate::metadata::{Inspection, Link};
use crate::runner::{ArtifactRecorder, CommandOutput, CommandRunner};

/// An inspection that passed, with its synthesized link.
#[derive(Debug, Clone)]
pub struct VerifiedInspection {
    pub report: InspectionReport,
    pub link: Link,
    pub warnings: Vec<Warning>,
}

/// Run `inspection` in `work_dir` and verify its rules.
///
/// A command that cannot start, times out, or exits non-zero only produces a
/// warning. Rule violations are fatal.
pub fn run_inspection<R>(
    inspection: &Inspection,
    runner: &R,
    recorder: &ArtifactRecorder,
    work_dir: &Path,
    timeout: Option<Duration>,
    context: &MatchContext,
) -> Result<VerifiedInspection, VerifyError>
where
    R: CommandRunner + ?Sized,
{
    let span = tracing::info_span!("inspection", name = %inspection.name);
    let _guard = span.enter();

    let materials = recorder.record(work_dir)?;

    tracing::debug!(command = ?inspection.run, "running inspection command");
    let mut warnings = Vec::new();
    let output = match runner.run(&inspection.run, work_dir, timeout) {
        Ok(output) => output,
        Err(err) => {
            warnings.push(execution_warning(inspection, err.to_string()));
            CommandOutput::default()
        }
    };
    if output.timed_out {
        let limit = timeout.map(|t| t.as_secs_f64()).unwrap_or_default();
        warnings.push(execution_warning(
            inspection,
            format!("command timed out after {}s", limit),
        ));
    } else if warnings.is_empty() && output.return_value != Some(0) {
        let reason = match output.return_value {
            Some(code) => format!("command exited with status {}", code),
            None => "command was terminated by a signal".to_string(),
        };
        warnings.push(execution_warning(inspection, reason));
    }

    let products = recorder.record(work_dir)?;

    let mut link = Link::new(&inspection.name);
    link.command = inspection.run.clone();
    link.materials = materials;
    link.products = products;
    link.byproducts.stdout = Some(output.stdout.clone());
    link.byproducts.stderr = Some(output.stderr.clone());
    link.byproducts.return_value = output.return_value.map(i64::from);

    let artifacts = link.artifacts();
    let materials = verify_rules(
        &inspection.name,
        ArtifactKind::Materials,
        &inspection.expected_materials,
        &artifacts,
        context,
    )?;
    let products = verify_rules(
        &inspection.name,
        ArtifactKind::Products,
        &inspection.expected_products,
        &artifacts,
        context,
    )?;

    tracing::info!("inspection verified");
    Ok(VerifiedInspection {
        report: InspectionReport {
            name: inspection.name.clone(),
            return_value: output.return_value,
            timed_out: output.timed_out,
            unclassified_materials: materials.unclassified,
            unclassified_products: products.unclassified,
        },
        link,
        warnings,
    })
}

fn execution_warning(inspection: &Inspection, reason: String) -> Warning {
    let warning = Warning::InspectionExecution {
        inspection: inspection.name.clone(),
        reason,
    };
    tracing::warn!("{}", warning);
    warning
}

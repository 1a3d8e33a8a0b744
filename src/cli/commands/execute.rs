//! Run and resume command implementations
//!
//! Handles `contractflow run` and `contractflow resume`, in text and `--json` form.

use anyhow::{Context, Result};

use super::common::{build_coordinator, read_request};
use super::json_emit::emit_outcome_json;

use crate::{Config, Coordinator, ExitCode, FlowError, RunOutcome};

/// Execute the run command
pub async fn execute_run_command(
    run_id: &str,
    request: Option<String>,
    iterate: bool,
    force: bool,
    json: bool,
    config: &Config,
) -> Result<ExitCode> {
    let coordinator = build_coordinator(config, force)?;
    let request = read_request(request)?;

    let existing = if iterate {
        let document = coordinator
            .load(run_id)?
            .ok_or_else(|| FlowError::ResumeRejected {
                reason: format!("no persisted run '{run_id}' to iterate on"),
            })?;
        Some(document)
    } else {
        None
    };

    if !json {
        println!("Starting run: {run_id}");
    }

    let outcome = with_interrupt(&coordinator, coordinator.run(run_id, &request, existing))
        .await
        .with_context(|| format!("Failed to run '{run_id}'"))?;
    report_outcome(&outcome, json)
}

/// Execute the resume command
pub async fn execute_resume_command(
    run_id: &str,
    force: bool,
    json: bool,
    config: &Config,
) -> Result<ExitCode> {
    let coordinator = build_coordinator(config, force)?;

    if !json {
        println!("Resuming run: {run_id}");
    }

    let outcome = with_interrupt(&coordinator, coordinator.resume_run(run_id))
        .await
        .with_context(|| format!("Failed to resume '{run_id}'"))?;
    report_outcome(&outcome, json)
}

/// Drive `run` to completion, cancelling it on Ctrl-C.
async fn with_interrupt<F>(coordinator: &Coordinator, run: F) -> Result<RunOutcome, FlowError>
where
    F: std::future::Future<Output = Result<RunOutcome, FlowError>>,
{
    let cancel = coordinator.cancel_handle();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });
    let result = run.await;
    watcher.abort();
    result
}

fn report_outcome(outcome: &RunOutcome, json: bool) -> Result<ExitCode> {
    if json {
        println!("{}", emit_outcome_json(outcome)?);
        return Ok(outcome.exit_code());
    }

    if let Some(error) = outcome.failure() {
        println!("✗ Run '{}' failed in {}", outcome.run_id, error.phase);
        println!("  Error kind: {}", error.error_kind);
        println!("  Message: {}", error.message);
        if let Some(report) = &outcome.state.validation {
            for issue in report.errors() {
                println!("  - [{}] {}: {}", issue.rule, issue.location, issue.message);
            }
        }
        println!("\n  Next: contractflow status {} --json", outcome.run_id);
        println!("        contractflow resume {}", outcome.run_id);
    } else {
        println!("✓ Run '{}' completed", outcome.run_id);
        if let Some(revision) = outcome.contract.as_ref().and_then(|c| c.revision.as_deref()) {
            println!("  Contract revision: {revision}");
        }
        println!("  Regenerations: {}", outcome.state.regeneration_count);
        println!("  Artifacts: {}", outcome.state.artifacts.total_files());
        if let Some(report) = &outcome.state.validation {
            let warnings = report.warnings().count();
            if warnings > 0 {
                println!("  Warnings: {warnings}");
            }
        }
    }
    Ok(outcome.exit_code())
}

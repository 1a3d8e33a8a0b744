//! Status command implementation
//!
//! Handles `contractflow status` and `contractflow status --json` commands.

use anyhow::{Context, Result};

use contractflow_status::StatusSummary;
use contractflow_store::{DocumentBackend, FileBackend};

use crate::{Config, ExitCode};

/// Execute the status command
///
/// Status reads the persisted document without taking the run lock.
pub fn execute_status_command(run_id: &str, json: bool, config: &Config) -> Result<ExitCode> {
    crate::paths::validate_run_id(run_id).map_err(crate::FlowError::from)?;
    let backend = FileBackend::new();
    let document = backend
        .load(run_id)
        .map_err(crate::FlowError::from)
        .with_context(|| format!("Failed to load run: {run_id}"))?;

    let Some(document) = document else {
        if json {
            // Return empty JSON for a run that was never persisted
            println!("{{}}");
        } else {
            let path = backend.path_for(run_id).map_err(crate::FlowError::from)?;
            println!("Status for run: {run_id}");
            println!("  Status: No run found");
            println!("  Document: {path} (does not exist)");
        }
        return Ok(ExitCode::SUCCESS);
    };

    let summary = StatusSummary::from_document(&document).with_effective_config(config.effective_config());
    if json {
        println!("{}", summary.to_json()?);
    } else {
        print!("{}", summary.render_text());
    }
    Ok(ExitCode::SUCCESS)
}

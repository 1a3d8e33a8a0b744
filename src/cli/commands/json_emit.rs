//! JSON emit functions for CLI output
//!
//! This module contains functions to emit various CLI outputs as canonical
//! JSON using JCS (RFC 8785) for stable, deterministic output.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::contract::ValidationReport;
use crate::{ErrorRecord, Phase, RunOutcome, emit_jcs};

/// Compact summary of a finished `run` or `resume`.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeJson {
    pub run_id: String,
    pub phase: Phase,
    pub succeeded: bool,
    pub exit_code: i32,
    pub attempt: u32,
    pub regeneration_count: u32,
    pub revision: Option<String>,
    pub last_error: Option<ErrorRecord>,
    pub validation: Option<ValidationReport>,
}

impl From<&RunOutcome> for OutcomeJson {
    fn from(outcome: &RunOutcome) -> Self {
        Self {
            run_id: outcome.run_id.clone(),
            phase: outcome.state.current_phase,
            succeeded: outcome.succeeded(),
            exit_code: outcome.exit_code().as_i32(),
            attempt: outcome.state.attempt,
            regeneration_count: outcome.state.regeneration_count,
            revision: outcome.contract.as_ref().and_then(|c| c.revision.clone()),
            last_error: outcome.failure().cloned(),
            validation: outcome.state.validation.clone(),
        }
    }
}

/// Emit a run outcome as canonical JSON using JCS (RFC 8785)
pub fn emit_outcome_json(outcome: &RunOutcome) -> Result<String> {
    emit_jcs(&OutcomeJson::from(outcome)).context("Failed to emit run outcome JSON")
}

/// Emit a validation report as canonical JSON using JCS (RFC 8785)
pub fn emit_validation_json(report: &ValidationReport) -> Result<String> {
    emit_jcs(report).context("Failed to emit validation JSON")
}

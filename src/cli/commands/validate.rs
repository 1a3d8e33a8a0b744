//! Validate command implementation
//!
//! Handles `contractflow validate`, a one-off compliance check of an
//! implementation report against a contract file.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

use super::json_emit::emit_validation_json;

use crate::cli::args::ReportKind;
use crate::contract::{BackendReport, Contract, FrontendReport, ValidationReport};
use crate::{Config, ContractValidator, ExitCode};

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what} file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {what} file: {}", path.display()))
}

/// Execute the validate command
///
/// Returns `RUN_FAILED` when the report has blocking issues.
pub fn execute_validate_command(
    contract_path: &Path,
    report_path: &Path,
    kind: ReportKind,
    json: bool,
    config: &Config,
) -> Result<ExitCode> {
    let contract: Contract = read_json(contract_path, "contract")?;
    let validator = ContractValidator::new()
        .with_undeclared_level(config.extra_coverage_level())
        .with_schema_diff(config.schema_diff());

    let report = match kind {
        ReportKind::Backend => {
            let report: BackendReport = read_json(report_path, "backend report")?;
            validator.validate(&report, &contract)
        }
        ReportKind::Frontend => {
            let report: FrontendReport = read_json(report_path, "frontend report")?;
            validator.validate(&report, &contract)
        }
    };

    if json {
        println!("{}", emit_validation_json(&report)?);
    } else {
        print_report(&report);
    }

    if report.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::RUN_FAILED)
    }
}

fn print_report(report: &ValidationReport) {
    if report.passed() {
        println!("✓ Report complies with the contract");
    } else {
        println!("✗ Report drifts from the contract ({} error(s))", report.error_count());
    }
    for issue in report.issues() {
        println!("  {} [{}] {}: {}", issue.level, issue.rule, issue.location, issue.message);
    }
}

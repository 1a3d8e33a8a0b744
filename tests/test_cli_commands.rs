//! CLI surface tests for commands that do not run stages.
//!
//! These drive the real binary through `assert_cmd` and check output and
//! exit codes.

mod test_support;

use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use test_support::{Workspace, backend, contract};

#[test]
fn test_help_lists_commands() {
    let ws = Workspace::new();
    ws.write_config("", &[]);
    ws.cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("resume"))
        .stdout(predicate::str::contains("validate"));
}

#[test]
fn test_revision_bumps() {
    let ws = Workspace::new();
    ws.write_config("", &[]);
    ws.cmd()
        .args(["revision", "1.2.3", "bug_fix"])
        .assert()
        .success()
        .stdout("1.2.4\n");
    ws.cmd()
        .args(["revision", "1.2.3", "spec_regen"])
        .assert()
        .success()
        .stdout("1.3.0\n");
    ws.cmd()
        .args(["revision", "1.2.3", "planner_regen"])
        .assert()
        .success()
        .stdout("2.0.0\n");
}

#[test]
fn test_revision_rejects_malformed_input() {
    let ws = Workspace::new();
    ws.write_config("", &[]);
    ws.cmd()
        .args(["revision", "v1.2", "bug_fix"])
        .assert()
        .code(13)
        .stderr(predicate::str::contains("revision"));
}

#[test]
fn test_unknown_change_kind_is_a_usage_error() {
    let ws = Workspace::new();
    ws.write_config("", &[]);
    ws.cmd().args(["revision", "1.0.0", "rewrite"]).assert().code(2);
}

#[test]
fn test_validate_reports_drift_as_json() {
    let ws = Workspace::new();
    ws.write_config("", &[]);
    let contract_path = ws.path().join("api_spec.json");
    let report_path = ws.path().join("backend.json");
    fs::write(&contract_path, contract()["api_spec"].to_string()).unwrap();
    fs::write(&report_path, backend(&[])["backend_report"].to_string()).unwrap();

    let output = ws
        .cmd()
        .arg("validate")
        .arg("--contract")
        .arg(&contract_path)
        .arg("--report")
        .arg(&report_path)
        .args(["--kind", "backend", "--json"])
        .assert()
        .code(11)
        .get_output()
        .stdout
        .clone();

    let report: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["status"], "fail");
    let issues = report["issues"].as_array().unwrap();
    assert!(issues.iter().any(|i| i["level"] == "error"));
}

#[test]
fn test_validate_compliant_report_passes() {
    let ws = Workspace::new();
    ws.write_config("", &[]);
    let contract_path = ws.path().join("api_spec.json");
    let report_path = ws.path().join("backend.json");
    fs::write(&contract_path, contract()["api_spec"].to_string()).unwrap();
    fs::write(&report_path, backend(&[("/users", "GET")])["backend_report"].to_string()).unwrap();

    ws.cmd()
        .arg("validate")
        .arg("--contract")
        .arg(&contract_path)
        .arg("--report")
        .arg(&report_path)
        .args(["--kind", "backend"])
        .assert()
        .success()
        .stdout(predicate::str::contains("complies"));
}

#[test]
fn test_status_of_unknown_run_is_empty_json() {
    let ws = Workspace::new();
    ws.write_config("", &[]);
    ws.cmd()
        .args(["status", "nothing-here", "--json"])
        .assert()
        .success()
        .stdout("{}\n");
}

#[test]
fn test_invalid_config_value_is_a_config_error() {
    let ws = Workspace::new();
    ws.write_config("max_regenerations = 99", &[]);
    ws.cmd()
        .args(["status", "todo"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("max_regenerations"));
}

#[test]
fn test_run_without_stages_is_a_config_error() {
    let ws = Workspace::new();
    ws.write_config("", &[]);
    ws.cmd()
        .args(["run", "todo", "--request", "A todo app"])
        .assert()
        .code(2);
}

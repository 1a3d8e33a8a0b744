//! End-to-end runs of the binary over shell-script stages.
//!
//! Each stage is `sh <script>`; scripts print a fixed JSON envelope.

#![cfg(unix)]

mod test_support;

use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use test_support::{Workspace, backend, contract, frontend, plan};

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_run_completes_and_persists() {
    let ws = Workspace::new();
    ws.passing_stages();

    let output = ws
        .cmd()
        .args(["run", "todo", "--request", "A todo app", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));
    let outcome = stdout_json(&output);
    assert_eq!(outcome["phase"], "COMPLETED");
    assert_eq!(outcome["revision"], "1.0.0");
    assert_eq!(outcome["regeneration_count"], 0);

    assert!(ws.home().join("runs/todo/run.json").exists());

    let status = ws.cmd().args(["status", "todo", "--json"]).output().unwrap();
    assert!(status.status.success());
    let status = stdout_json(&status);
    assert_eq!(status["current_phase"], "COMPLETED");
    assert_eq!(status["contract_revision"], "1.0.0");
}

#[test]
fn test_request_is_read_from_stdin() {
    let ws = Workspace::new();
    ws.passing_stages();

    ws.cmd()
        .args(["run", "todo"])
        .write_stdin("A todo app with users\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("completed"));
}

#[test]
fn test_stage_only_sees_declared_documents() {
    let ws = Workspace::new();
    let capture = ws.path().join("backend-input.json");
    let planner = ws.script("planner", &plan());
    let spec = ws.script("spec", &contract());
    let backend_script = ws.raw_script(
        "backend",
        &format!(
            "cat > '{}'\ncat <<'JSON'\n{}\nJSON\n",
            capture.display(),
            backend(&[("/users", "GET")])
        ),
    );
    let frontend_script = ws.script("frontend", &frontend());
    ws.write_config(
        "",
        &[
            ("planner", &planner),
            ("spec", &spec),
            ("backend", &backend_script),
            ("frontend", &frontend_script),
        ],
    );

    ws.cmd()
        .args(["run", "todo", "--request", "secret request text"])
        .assert()
        .success();

    let inputs: Value = serde_json::from_str(&fs::read_to_string(&capture).unwrap()).unwrap();
    assert_eq!(inputs["phase"], "BACKEND_GENERATION");
    let documents = inputs["documents"].as_object().unwrap();
    let mut keys: Vec<&str> = documents.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, ["api_spec", "project_plan"]);
    assert_eq!(documents["api_spec"]["revision"], "1.0.0");
    assert!(!inputs.to_string().contains("secret request text"));
}

#[test]
fn test_unresolved_drift_fails_with_run_failed() {
    let ws = Workspace::new();
    let planner = ws.script("planner", &plan());
    let spec = ws.script("spec", &contract());
    let backend_script = ws.script("backend", &backend(&[]));
    let frontend_script = ws.script("frontend", &frontend());
    ws.write_config(
        "max_regenerations = 1",
        &[
            ("planner", &planner),
            ("spec", &spec),
            ("backend", &backend_script),
            ("frontend", &frontend_script),
        ],
    );

    let output = ws
        .cmd()
        .args(["run", "drift", "--request", "A todo app", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(11));
    let outcome = stdout_json(&output);
    assert_eq!(outcome["phase"], "FAILED");
    assert_eq!(outcome["last_error"]["error_kind"], "regeneration_limit_exceeded");
    assert_eq!(outcome["regeneration_count"], 2);
    // One regeneration went back to SPEC_GENERATION and bumped the minor
    assert_eq!(outcome["revision"], "1.1.0");
}

#[test]
fn test_invalid_output_exhausts_retries() {
    let ws = Workspace::new();
    let planner = ws.raw_script("planner", "cat > /dev/null\necho 'this is not json'\n");
    let spec = ws.script("spec", &contract());
    let backend_script = ws.script("backend", &backend(&[("/users", "GET")]));
    let frontend_script = ws.script("frontend", &frontend());
    ws.write_config(
        "output_retries = 1",
        &[
            ("planner", &planner),
            ("spec", &spec),
            ("backend", &backend_script),
            ("frontend", &frontend_script),
        ],
    );

    ws.cmd()
        .args(["run", "bad-output", "--request", "A todo app"])
        .assert()
        .code(12)
        .stdout(predicate::str::contains("PLANNING"));
}

#[test]
fn test_timeout_then_resume_completes() {
    let ws = Workspace::new();
    let planner = ws.script("planner", &plan());
    let spec = ws.script("spec", &contract());
    let slow = ws.raw_script("backend", "cat > /dev/null\nexec sleep 30\n");
    let frontend_script = ws.script("frontend", &frontend());
    ws.write_config(
        "phase_timeout_secs = 1",
        &[
            ("planner", &planner),
            ("spec", &spec),
            ("backend", &slow),
            ("frontend", &frontend_script),
        ],
    );

    let output = ws
        .cmd()
        .args(["run", "slow", "--request", "A todo app", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(10));
    assert_eq!(stdout_json(&output)["last_error"]["phase"], "BACKEND_GENERATION");

    // Same path, now a fast backend
    ws.script("backend", &backend(&[("/users", "GET")]));

    let output = ws.cmd().args(["resume", "slow", "--json"]).output().unwrap();
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));
    let outcome = stdout_json(&output);
    assert_eq!(outcome["phase"], "COMPLETED");
    assert_eq!(outcome["attempt"], 2);
    assert_eq!(outcome["revision"], "1.0.0");
}

#[test]
fn test_resume_of_completed_run_is_rejected() {
    let ws = Workspace::new();
    ws.passing_stages();
    ws.cmd().args(["run", "done", "--request", "A todo app"]).assert().success();

    ws.cmd()
        .args(["resume", "done"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("resume"));
}

#[test]
fn test_fresh_run_rejects_existing_id_but_iterate_bumps_revision() {
    let ws = Workspace::new();
    ws.passing_stages();
    ws.cmd().args(["run", "todo", "--request", "A todo app"]).assert().success();

    ws.cmd()
        .args(["run", "todo", "--request", "A todo app"])
        .assert()
        .failure();

    let output = ws
        .cmd()
        .args(["run", "todo", "--iterate", "--request", "Add tags", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout_json(&output)["revision"], "1.1.0");
}

//! Tests for the status command

use super::support::setup_test_environment;
use crate::cli::commands;
use crate::store::{DocumentBackend, FileBackend, RunDocument};
use crate::{Config, DocKey, ExitCode};
use serde_json::json;

#[test]
fn test_status_of_unknown_run_succeeds() {
    let _env = setup_test_environment();

    let code = commands::execute_status_command("missing", true, &Config::default()).unwrap();
    assert_eq!(code, ExitCode::SUCCESS);
}

#[test]
fn test_status_rejects_invalid_run_id() {
    let _env = setup_test_environment();

    let err = commands::execute_status_command("../escape", false, &Config::default()).unwrap_err();
    assert!(err.downcast_ref::<crate::FlowError>().is_some());
}

#[test]
fn test_status_reads_persisted_run() {
    let _env = setup_test_environment();

    let mut document = RunDocument::new("todo");
    document
        .documents
        .insert(DocKey::UserRequest, json!("A todo app"));
    FileBackend::new().save(&document).unwrap();

    let code = commands::execute_status_command("todo", false, &Config::default()).unwrap();
    assert_eq!(code, ExitCode::SUCCESS);
    let code = commands::execute_status_command("todo", true, &Config::default()).unwrap();
    assert_eq!(code, ExitCode::SUCCESS);
}

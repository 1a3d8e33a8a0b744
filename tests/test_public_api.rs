//! Public API boundary tests.
//!
//! Uses only items re-exported from the crate root, plus `async_trait` for
//! implementing a stage the way an embedding host would.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

use contractflow::{
    ArtifactSink, ChangeKind, Coordinator, DocKey, ErrorKind, ExitCode, Phase, RunSettings, StageAdapter,
    StageFailure, StageInputs, StageOutput, StageTable, Storage, emit_jcs, increment,
};

/// A stage that answers with a fixed envelope and records its inputs.
struct Fixed {
    name: &'static str,
    phase: Phase,
    output: Value,
    seen: Arc<Mutex<Vec<StageInputs>>>,
}

impl Fixed {
    fn new(name: &'static str, phase: Phase, output: Value) -> Self {
        Self {
            name,
            phase,
            output,
            seen: Arc::default(),
        }
    }
}

#[async_trait]
impl StageAdapter for Fixed {
    fn name(&self) -> &str {
        self.name
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    async fn invoke(&self, inputs: StageInputs) -> Result<StageOutput, StageFailure> {
        self.seen.lock().unwrap().push(inputs);
        Ok(StageOutput::json(&self.output))
    }
}

struct Collecting(Mutex<Vec<String>>);

impl ArtifactSink for Collecting {
    fn persist(&self, _phase: Phase, artifacts: &[contractflow::contract::ArtifactRef]) -> anyhow::Result<Vec<String>> {
        let names: Vec<String> = artifacts.iter().map(|a| format!("out/{}", a.filename)).collect();
        self.0.lock().unwrap().extend(names.clone());
        Ok(names)
    }
}

fn stages() -> (StageTable, Arc<Mutex<Vec<StageInputs>>>) {
    let planner = Fixed::new(
        "planner",
        Phase::Planning,
        json!({"project_plan": {"project_name": "todo", "features": [{"name": "users"}], "entities": []}}),
    );
    let spec = Fixed::new(
        "spec",
        Phase::SpecGeneration,
        json!({"api_spec": {
            "openapi_spec": {"paths": {"/users": {"get": {"x-requirement": "users"}}}},
            "validation_report": {"status": "pass", "issues": []}
        }}),
    );
    let backend = Fixed::new(
        "backend",
        Phase::BackendGeneration,
        json!({"backend_report": {
            "implemented_endpoints": [{"path": "/users", "method": "GET"}],
            "artifacts": [{"type": "route", "filename": "users.py"}]
        }}),
    );
    let frontend = Fixed::new(
        "frontend",
        Phase::FrontendGeneration,
        json!({"frontend_report": {
            "implemented_components": [{"name": "UserList"}],
            "api_integrations": [{"path": "/users", "method": "GET"}]
        }}),
    );
    let seen = Arc::clone(&spec.seen);
    let table = StageTable::new()
        .with(Arc::new(planner))
        .and_then(|t| t.with(Arc::new(spec)))
        .and_then(|t| t.with(Arc::new(backend)))
        .and_then(|t| t.with(Arc::new(frontend)))
        .unwrap();
    (table, seen)
}

#[tokio::test]
async fn test_embedded_run_with_custom_stages_and_sink() {
    let (table, spec_inputs) = stages();
    let sink = Arc::new(Collecting(Mutex::new(Vec::new())));
    let coordinator = Coordinator::new(table, RunSettings::default())
        .unwrap()
        .with_sink(sink.clone());

    let outcome = coordinator.run("embedded", "A todo app", None).await.unwrap();

    assert!(outcome.succeeded());
    assert_eq!(outcome.exit_code(), ExitCode::SUCCESS);
    assert_eq!(sink.0.lock().unwrap().as_slice(), ["out/users.py"]);

    let seen = spec_inputs.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].documents.keys().copied().collect::<Vec<_>>(), [DocKey::ProjectPlan]);
}

#[tokio::test]
async fn test_amend_contract_on_persisted_run() {
    let (table, _) = stages();
    let storage = Storage::default();
    let coordinator = Coordinator::new(table, RunSettings::default())
        .unwrap()
        .with_storage(storage);

    let outcome = coordinator.run("amend", "A todo app", None).await.unwrap();
    let mut contract = outcome.contract.clone().unwrap();
    contract.metadata = Some(json!({"note": "typo in description"}));

    let document = coordinator
        .amend_contract(outcome.document, contract, ChangeKind::BugFix)
        .unwrap();
    assert_eq!(document.get(DocKey::ApiSpec).unwrap()["revision"], "1.0.1");

    let reloaded = coordinator.load("amend").unwrap().unwrap();
    let history = reloaded.get(DocKey::ApiSpecHistory).unwrap().as_array().unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_cancelled_run_reports_cancelled() {
    struct Stuck;

    #[async_trait]
    impl StageAdapter for Stuck {
        fn name(&self) -> &str {
            "planner"
        }
        fn phase(&self) -> Phase {
            Phase::Planning
        }
        async fn invoke(&self, _inputs: StageInputs) -> Result<StageOutput, StageFailure> {
            std::future::pending().await
        }
    }

    let (mut table, _) = stages();
    table.insert(Arc::new(Stuck)).unwrap();
    let coordinator = Coordinator::new(table, RunSettings::default()).unwrap();
    let cancel = coordinator.cancel_handle();

    let run = coordinator.run("stuck", "A todo app", None);
    let trigger = async {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();
    };
    let (outcome, ()) = tokio::join!(run, trigger);
    let outcome = outcome.unwrap();

    assert_eq!(outcome.failure().unwrap().error_kind, ErrorKind::Cancelled);
    assert_eq!(outcome.exit_code(), ExitCode::CANCELLED);
}

#[test]
fn test_revision_and_jcs_helpers_are_public() {
    assert_eq!(increment("0.9.9", ChangeKind::PlannerRegen).unwrap(), "1.0.0");
    assert_eq!(emit_jcs(&json!({"b": 1, "a": 2})).unwrap(), r#"{"a":2,"b":1}"#);
}

#[test]
fn test_incomplete_table_is_rejected() {
    let err = Coordinator::new(StageTable::new(), RunSettings::default()).unwrap_err();
    assert_eq!(err.to_exit_code(), ExitCode::CLI_ARGS);
}

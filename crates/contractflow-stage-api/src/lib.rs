//! Stage adapter contract for contractflow workflows
//!
//! This crate defines the interface between the coordinator and the
//! generation stages it drives (planner, spec generator, backend, frontend,
//! validator). A stage declares the document keys it reads and writes and
//! exposes one async entry point. The coordinator owns everything else:
//! permission checks, output gating, commits and phase transitions.
//!
//! # Purpose
//!
//! Keeping the trait and its types here lets stage implementations depend on
//! a small crate instead of the orchestrator.

use async_trait::async_trait;
use contractflow_contract::{ArtifactRef, Issue};
use contractflow_store::StageCapabilities;
use contractflow_utils::error::ConfigError;
use contractflow_utils::types::{DocKey, Phase};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Input and output keys of the built-in stage roles.
///
/// | Phase | Inputs | Outputs |
/// |-------|--------|---------|
/// | `PLANNING` | `user_request` | `project_plan` |
/// | `SPEC_GENERATION` | `project_plan` | `api_spec` |
/// | `BACKEND_GENERATION` | `project_plan`, `api_spec` | `backend_report` |
/// | `FRONTEND_GENERATION` | `project_plan`, `api_spec` | `frontend_report` |
/// | `VALIDATION` | plan, contract, both reports | `validation_findings` |
#[must_use]
pub fn default_keys(phase: Phase) -> (Vec<DocKey>, Vec<DocKey>) {
    use DocKey::*;
    match phase {
        Phase::Planning => (vec![UserRequest], vec![ProjectPlan]),
        Phase::SpecGeneration => (vec![ProjectPlan], vec![ApiSpec]),
        Phase::BackendGeneration => (vec![ProjectPlan, ApiSpec], vec![BackendReport]),
        Phase::FrontendGeneration => (vec![ProjectPlan, ApiSpec], vec![FrontendReport]),
        Phase::Validation => (
            vec![ProjectPlan, ApiSpec, BackendReport, FrontendReport],
            vec![ValidationFindings],
        ),
        Phase::Init | Phase::Completed | Phase::Failed => (Vec::new(), Vec::new()),
    }
}

/// What a stage receives for one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageInputs {
    pub run_id: String,
    pub phase: Phase,
    /// 1 on the first call, incremented on every output-format retry
    pub attempt: u32,
    /// Exactly the stage's declared inputs
    pub documents: BTreeMap<DocKey, Value>,
    /// Blocking issues from the validation pass that triggered this
    /// regeneration, if any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feedback: Vec<Issue>,
    /// Why the previous attempt's output was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_reason: Option<String>,
}

/// Raw stage output. Gated by the coordinator before any commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutput {
    pub raw: String,
}

impl StageOutput {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Serialize a JSON envelope as stage output.
    #[must_use]
    pub fn json(value: &Value) -> Self {
        Self {
            raw: value.to_string(),
        }
    }
}

/// Structured stage failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    /// Short machine-readable label (`spawn_failed`, `exit_status`, ...)
    pub kind: String,
    pub message: String,
}

impl StageFailure {
    /// Kind for output that was produced but cannot be a JSON document.
    ///
    /// The coordinator treats it like gate-rejected output, so it is retried.
    pub const INVALID_OUTPUT: &'static str = "invalid_output";

    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_OUTPUT, message)
    }

    #[must_use]
    pub fn is_invalid_output(&self) -> bool {
        self.kind == Self::INVALID_OUTPUT
    }
}

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Core trait every generation stage implements
#[async_trait]
pub trait StageAdapter: Send + Sync {
    /// Unique stage name, used as the store caller identity
    fn name(&self) -> &str;

    /// Phase this stage runs in
    fn phase(&self) -> Phase;

    fn input_keys(&self) -> Vec<DocKey> {
        default_keys(self.phase()).0
    }

    fn output_keys(&self) -> Vec<DocKey> {
        default_keys(self.phase()).1
    }

    /// Run the stage once.
    ///
    /// Returns the raw output on success or a structured failure. Timeouts
    /// and cancellation are enforced by the caller.
    async fn invoke(&self, inputs: StageInputs) -> Result<StageOutput, StageFailure>;
}

/// Store capabilities for a stage.
#[must_use]
pub fn capabilities_of(stage: &dyn StageAdapter) -> StageCapabilities {
    StageCapabilities::new(
        stage.name(),
        stage.phase(),
        stage.input_keys(),
        stage.output_keys(),
    )
}

/// Injectable table of stages, one per phase.
#[derive(Clone, Default)]
pub struct StageTable {
    stages: BTreeMap<Phase, Arc<dyn StageAdapter>>,
}

impl std::fmt::Debug for StageTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.stages.iter().map(|(p, s)| (p.as_str(), s.name())))
            .finish()
    }
}

/// Phases that must have a stage. `VALIDATION` may run without one.
pub const REQUIRED_PHASES: [Phase; 4] = [
    Phase::Planning,
    Phase::SpecGeneration,
    Phase::BackendGeneration,
    Phase::FrontendGeneration,
];

impl StageTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage, replacing any stage already registered for its phase.
    ///
    /// The stage must produce its phase's primary document.
    pub fn insert(&mut self, stage: Arc<dyn StageAdapter>) -> Result<(), ConfigError> {
        let phase = stage.phase();
        let Some(primary) = phase.primary_output() else {
            return Err(ConfigError::InvalidValue {
                key: format!("stages.{}", stage.name()),
                value: format!("phase {phase} does not run stages"),
            });
        };
        if !stage.output_keys().contains(&primary) {
            return Err(ConfigError::StageShape {
                stage: stage.name().to_string(),
                phase: phase.to_string(),
                key: primary.to_string(),
            });
        }
        self.stages.insert(phase, stage);
        Ok(())
    }

    pub fn with(mut self, stage: Arc<dyn StageAdapter>) -> Result<Self, ConfigError> {
        self.insert(stage)?;
        Ok(self)
    }

    #[must_use]
    pub fn get(&self, phase: Phase) -> Option<&Arc<dyn StageAdapter>> {
        self.stages.get(&phase)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn StageAdapter>> {
        self.stages.values()
    }

    /// Every required phase has a stage.
    pub fn ensure_complete(&self) -> Result<(), ConfigError> {
        match REQUIRED_PHASES.iter().find(|p| !self.stages.contains_key(p)) {
            Some(phase) => Err(ConfigError::MissingStage {
                phase: phase.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// External file-persistence collaborator.
///
/// The coordinator never writes source files. It hands report-declared
/// artifact references to the sink and records the file list it returns.
pub trait ArtifactSink: Send + Sync {
    fn persist(&self, phase: Phase, artifacts: &[ArtifactRef]) -> anyhow::Result<Vec<String>>;
}

/// Sink that writes nothing and reports the declared filenames.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredArtifacts;

impl ArtifactSink for DeclaredArtifacts {
    fn persist(&self, _phase: Phase, artifacts: &[ArtifactRef]) -> anyhow::Result<Vec<String>> {
        Ok(artifacts.iter().map(|a| a.filename.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo {
        phase: Phase,
        outputs: Vec<DocKey>,
    }

    #[async_trait]
    impl StageAdapter for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn phase(&self) -> Phase {
            self.phase
        }

        fn output_keys(&self) -> Vec<DocKey> {
            self.outputs.clone()
        }

        async fn invoke(&self, inputs: StageInputs) -> Result<StageOutput, StageFailure> {
            Ok(StageOutput::json(&json!({ "attempt": inputs.attempt })))
        }
    }

    #[test]
    fn test_default_keys_follow_phase() {
        let (inputs, outputs) = default_keys(Phase::BackendGeneration);
        assert_eq!(inputs, vec![DocKey::ProjectPlan, DocKey::ApiSpec]);
        assert_eq!(outputs, vec![DocKey::BackendReport]);
        assert!(default_keys(Phase::Completed).0.is_empty());
    }

    #[test]
    fn test_table_rejects_stage_without_primary_output() {
        let mut table = StageTable::new();
        let wrong = Arc::new(Echo {
            phase: Phase::SpecGeneration,
            outputs: vec![DocKey::ProjectPlan],
        });
        assert!(matches!(table.insert(wrong), Err(ConfigError::StageShape { .. })));

        let terminal = Arc::new(Echo {
            phase: Phase::Completed,
            outputs: vec![],
        });
        assert!(matches!(table.insert(terminal), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_table_completeness() {
        let mut table = StageTable::new();
        for phase in REQUIRED_PHASES {
            assert!(table.ensure_complete().is_err());
            let outputs = default_keys(phase).1;
            table.insert(Arc::new(Echo { phase, outputs })).unwrap();
        }
        table.ensure_complete().unwrap();
        assert!(table.get(Phase::Validation).is_none());
    }

    #[tokio::test]
    async fn test_invoke_through_trait_object() {
        let stage: Arc<dyn StageAdapter> = Arc::new(Echo {
            phase: Phase::Planning,
            outputs: vec![DocKey::ProjectPlan],
        });
        let caps = capabilities_of(stage.as_ref());
        assert_eq!(caps.input_keys, vec![DocKey::UserRequest]);
        let out = stage
            .invoke(StageInputs {
                run_id: "r".into(),
                phase: Phase::Planning,
                attempt: 2,
                documents: BTreeMap::new(),
                feedback: vec![],
                retry_reason: None,
            })
            .await
            .unwrap();
        assert_eq!(out.raw, r#"{"attempt":2}"#);
    }

    #[test]
    fn test_declared_artifacts_sink() {
        let refs: Vec<ArtifactRef> = serde_json::from_value(json!([
            {"type": "route", "filename": "routes/users.py"},
            {"type": "model", "filename": "models/user.py"}
        ]))
        .unwrap();
        let files = DeclaredArtifacts.persist(Phase::BackendGeneration, &refs).unwrap();
        assert_eq!(files, vec!["routes/users.py", "models/user.py"]);
    }
}

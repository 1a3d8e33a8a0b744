//! Coordinator entry point.
//!
//! [`Coordinator`] owns an injectable [`StageTable`], the run settings and a
//! storage backend. Each call opens a [`SharedStateStore`] over one run
//! document, registers every stage's capabilities and drives a
//! [`WorkflowStateMachine`] to a terminal phase.

use contractflow_config::Config;
use contractflow_contract::{BackendReport, Contract, FrontendReport, RevisionOrigin, RevisionRecord};
use contractflow_lock::RunLock;
use contractflow_revision::{ChangeKind, Revision, ensure_monotonic, increment};
use contractflow_stage_api::{ArtifactSink, DeclaredArtifacts, StageTable, capabilities_of};
use contractflow_store::{
    AuditEvent, COORDINATOR, CoordinatorChange, DocumentBackend, FileBackend, MemoryBackend, RunDocument,
    SharedStateStore,
};
use contractflow_utils::error::{FlowError, StoreError};
use contractflow_utils::exit_codes::ExitCode;
use contractflow_utils::paths;
use contractflow_utils::types::{DocKey, Phase};
use contractflow_validation::validate_integrity;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::cancel::CancelHandle;
use crate::machine::{WorkflowStateMachine, contract_digest, parse, revision_history, transition_event};
use crate::settings::RunSettings;
use crate::state::{ErrorRecord, WorkflowState};

/// Documents replaced when an existing run is iterated from the top.
const ITERATION_STALE: [DocKey; 5] = [
    DocKey::ProjectPlan,
    DocKey::ApiSpec,
    DocKey::BackendReport,
    DocKey::FrontendReport,
    DocKey::ValidationFindings,
];

/// Where run documents are persisted.
#[derive(Debug, Clone)]
pub enum Storage {
    /// Process memory. Clones of the backend share documents.
    Memory(MemoryBackend),
    /// Canonical JSON files, with a single-writer lock per run id.
    File(FileBackend),
}

impl Default for Storage {
    fn default() -> Self {
        Self::Memory(MemoryBackend::new())
    }
}

impl Storage {
    fn backend(&self) -> Box<dyn DocumentBackend> {
        match self {
            Self::Memory(backend) => Box::new(backend.clone()),
            Self::File(backend) => Box::new(backend.clone()),
        }
    }

    fn lock(&self, run_id: &str, ttl_seconds: u64, force: bool) -> Result<Option<RunLock>, FlowError> {
        match self {
            Self::Memory(_) => Ok(None),
            Self::File(_) => Ok(Some(RunLock::acquire(run_id, force, Some(ttl_seconds))?)),
        }
    }
}

/// Result of a run that reached a terminal phase.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub state: WorkflowState,
    pub contract: Option<Contract>,
    pub backend_report: Option<BackendReport>,
    pub frontend_report: Option<FrontendReport>,
    /// The full run document as persisted
    pub document: RunDocument,
}

fn optional<T: DeserializeOwned>(document: &RunDocument, key: DocKey) -> Result<Option<T>, FlowError> {
    match document.get(key) {
        Some(value) if !value.is_null() => parse(key, value).map(Some),
        _ => Ok(None),
    }
}

/// History including the document's contract, when the history does not
/// cover that contract's revision yet.
///
/// An iterated document loses its contract before the next spec commit; the
/// record keeps its revision as the floor for the next one.
fn adopt_contract(document: &RunDocument) -> Result<Option<Vec<RevisionRecord>>, FlowError> {
    let Some(contract) = optional::<Contract>(document, DocKey::ApiSpec)? else {
        return Ok(None);
    };
    let Some(revision) = contract.revision.as_deref() else {
        return Ok(None);
    };
    let revision: Revision = revision.parse()?;
    let mut history = revision_history(document.get(DocKey::ApiSpecHistory))?;
    if history.last().is_some_and(|r| r.revision >= revision) {
        return Ok(None);
    }
    history.push(RevisionRecord {
        revision,
        origin: RevisionOrigin::Adopted,
        phase: Phase::Init,
        stage: COORDINATOR.to_string(),
        description: "contract carried over from an existing document".to_string(),
        digest: contract_digest(&contract)?,
        timestamp: chrono::Utc::now(),
    });
    Ok(Some(history))
}

impl RunOutcome {
    fn from_document(document: RunDocument, state: WorkflowState) -> Result<Self, FlowError> {
        Ok(Self {
            run_id: document.run_id.clone(),
            contract: optional(&document, DocKey::ApiSpec)?,
            backend_report: optional(&document, DocKey::BackendReport)?,
            frontend_report: optional(&document, DocKey::FrontendReport)?,
            state,
            document,
        })
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.state.current_phase == Phase::Completed
    }

    /// `{phase, error_kind, message}` of a failed run.
    #[must_use]
    pub fn failure(&self) -> Option<&ErrorRecord> {
        if self.state.current_phase == Phase::Failed {
            self.state.last_error.as_ref()
        } else {
            None
        }
    }

    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self.failure() {
            Some(error) => ExitCode::for_kind(error.error_kind),
            None if self.succeeded() => ExitCode::SUCCESS,
            None => ExitCode::RUN_FAILED,
        }
    }
}

/// Drives runs over an injectable table of stages.
///
/// ```rust,no_run
/// # async fn demo(stages: contractflow_stage_api::StageTable) -> Result<(), contractflow_utils::error::FlowError> {
/// use contractflow_orchestrator::{Coordinator, RunSettings};
///
/// let coordinator = Coordinator::new(stages, RunSettings::default())?;
/// let outcome = coordinator.run("todo-app", "A todo list with users", None).await?;
/// if let Some(error) = outcome.failure() {
///     eprintln!("{} failed: {}", error.phase, error.message);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Coordinator {
    stages: StageTable,
    settings: RunSettings,
    sink: Arc<dyn ArtifactSink>,
    storage: Storage,
    force_lock: bool,
    cancel: CancelHandle,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("stages", &self.stages)
            .field("settings", &self.settings)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Every phase up to `FRONTEND_GENERATION` must have a stage.
    pub fn new(stages: StageTable, settings: RunSettings) -> Result<Self, FlowError> {
        stages.ensure_complete()?;
        Ok(Self {
            stages,
            settings,
            sink: Arc::new(DeclaredArtifacts),
            storage: Storage::default(),
            force_lock: false,
            cancel: CancelHandle::new(),
        })
    }

    pub fn from_config(stages: StageTable, config: &Config) -> Result<Self, FlowError> {
        Self::new(stages, RunSettings::from_config(config))
    }

    /// File-persistence collaborator for declared artifacts.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    /// Replace a stale run lock instead of refusing to start.
    #[must_use]
    pub fn with_force_lock(mut self, force: bool) -> Self {
        self.force_lock = force;
        self
    }

    /// Handle for cancelling the in-flight run from another task.
    ///
    /// Each run clears earlier cancellations when it starts.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    #[must_use]
    pub const fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Load a persisted run document.
    pub fn load(&self, run_id: &str) -> Result<Option<RunDocument>, FlowError> {
        paths::validate_run_id(run_id)?;
        Ok(self.storage.backend().load(run_id)?)
    }

    fn open(&self, document: RunDocument) -> Result<SharedStateStore, FlowError> {
        let store = SharedStateStore::new(document, self.storage.backend());
        for stage in self.stages.iter() {
            store.register(capabilities_of(stage.as_ref()))?;
        }
        Ok(store)
    }

    async fn drive(&self, store: &SharedStateStore, state: WorkflowState) -> Result<RunOutcome, FlowError> {
        let machine = WorkflowStateMachine::new(
            store,
            &self.stages,
            &self.settings,
            self.sink.as_ref(),
            self.cancel.arm(),
            state,
        );
        let state = machine.drive().await?;
        RunOutcome::from_document(store.snapshot(), state)
    }

    /// Start a run from a free-text request.
    ///
    /// With `existing`, the run iterates on that document: its previous
    /// workflow state is archived, generated documents are replaced and the
    /// contract history carries over, so the next contract gets a bumped
    /// revision. Without it, `run_id` must not name a persisted run.
    ///
    /// A run that fails inside a phase still returns `Ok` with a `FAILED`
    /// state. `Err` means the run could not be started or recorded.
    pub async fn run(
        &self,
        run_id: &str,
        user_request: &str,
        existing: Option<RunDocument>,
    ) -> Result<RunOutcome, FlowError> {
        paths::validate_run_id(run_id)?;
        let _lock = self
            .storage
            .lock(run_id, self.settings.lock_ttl_seconds, self.force_lock)?;

        let state = WorkflowState::new();
        let mut change = CoordinatorChange::default()
            .write(DocKey::UserRequest, Value::String(user_request.to_string()))
            .write(DocKey::WorkflowState, state.to_value()?);

        let document = match existing {
            Some(document) => {
                if document.run_id != run_id {
                    return Err(FlowError::ResumeRejected {
                        reason: format!(
                            "document belongs to run '{}', not '{run_id}'",
                            document.run_id
                        ),
                    });
                }
                if let Some(previous) = document.get(DocKey::WorkflowState) {
                    change = change.archive(previous.clone());
                }
                if let Some(history) = adopt_contract(&document)? {
                    change = change.write(DocKey::ApiSpecHistory, serde_json::to_value(&history)?);
                }
                change = change.clear(ITERATION_STALE);
                document
            }
            None => {
                if self.storage.backend().load(run_id)?.is_some() {
                    return Err(FlowError::ResumeRejected {
                        reason: format!("run '{run_id}' already exists; resume it instead"),
                    });
                }
                RunDocument::new(run_id)
            }
        };

        tracing::info!(run_id, attempt = state.attempt, "Starting run");
        let store = self.open(document)?;
        store.coordinator_commit(Phase::Init, change)?;
        self.drive(&store, state).await
    }

    /// Continue a persisted run from the phase after its last stable one.
    ///
    /// The document must pass the integrity check and carry a workflow state
    /// that is not `COMPLETED`. The old state is archived; the regeneration
    /// count carries over.
    pub async fn resume(&self, document: RunDocument) -> Result<RunOutcome, FlowError> {
        let run_id = document.run_id.clone();
        paths::validate_run_id(&run_id)?;
        let _lock = self
            .storage
            .lock(&run_id, self.settings.lock_ttl_seconds, self.force_lock)?;

        let integrity = validate_integrity(&document.documents);
        if !integrity.passed() {
            let problems: Vec<&str> = integrity.errors().map(|i| i.message.as_str()).collect();
            return Err(FlowError::ResumeRejected {
                reason: format!("document failed integrity check: {}", problems.join("; ")),
            });
        }

        let value = document
            .get(DocKey::WorkflowState)
            .ok_or_else(|| FlowError::ResumeRejected {
                reason: format!("run '{run_id}' has no workflow_state"),
            })?;
        let mut state = WorkflowState::from_value(value)?;
        if state.current_phase == Phase::Completed {
            return Err(FlowError::ResumeRejected {
                reason: format!("run '{run_id}' already completed"),
            });
        }

        let archived = state.to_value()?;
        let from = state.current_phase;
        let to = match state.last_stable_phase.and_then(|p| p.forward()) {
            None => Phase::Planning,
            Some(Phase::Completed) => Phase::Validation,
            Some(next) => next,
        };
        let entry = state.resume_at(to);
        tracing::info!(
            run_id = %run_id,
            from = %from,
            to = %to,
            attempt = state.attempt,
            "Resuming run"
        );

        let store = self.open(document)?;
        let change = CoordinatorChange::default()
            .archive(archived)
            .write(DocKey::WorkflowState, state.to_value()?)
            .event(AuditEvent::Resume { from, to })
            .event(transition_event(&entry));
        store.coordinator_commit(to, change)?;
        self.drive(&store, state).await
    }

    /// Load `run_id` from storage and resume it.
    pub async fn resume_run(&self, run_id: &str) -> Result<RunOutcome, FlowError> {
        let document = self.load(run_id)?.ok_or_else(|| FlowError::ResumeRejected {
            reason: format!("no persisted run '{run_id}'"),
        })?;
        self.resume(document).await
    }

    /// Replace the contract of an existing document and revise it.
    ///
    /// The new revision is computed from the current one with `change`, the
    /// history gains a record attributed to the coordinator, and the result is
    /// persisted. The state machine does not run.
    pub fn amend_contract(
        &self,
        document: RunDocument,
        mut contract: Contract,
        change: ChangeKind,
    ) -> Result<RunDocument, FlowError> {
        let run_id = document.run_id.clone();
        paths::validate_run_id(&run_id)?;
        let _lock = self
            .storage
            .lock(&run_id, self.settings.lock_ttl_seconds, self.force_lock)?;

        let current: Contract = optional(&document, DocKey::ApiSpec)?.ok_or_else(|| {
            StoreError::MissingDependency {
                caller: COORDINATOR.to_string(),
                key: DocKey::ApiSpec.to_string(),
            }
        })?;
        let mut history = revision_history(document.get(DocKey::ApiSpecHistory))?;
        let previous = current
            .revision
            .clone()
            .or_else(|| history.last().map(|r| r.revision.to_string()))
            .ok_or_else(|| FlowError::ResumeRejected {
                reason: format!("run '{run_id}' has a contract without a revision"),
            })?;

        let next = increment(&previous, change)?;
        ensure_monotonic(&previous, &next)?;
        contract.revision = Some(next.clone());

        let phase = match document.get(DocKey::WorkflowState) {
            Some(value) => WorkflowState::from_value(value)?.current_phase,
            None => Phase::Init,
        };
        history.push(RevisionRecord {
            revision: next.parse()?,
            origin: change.into(),
            phase,
            stage: COORDINATOR.to_string(),
            description: format!("{change} amendment"),
            digest: contract_digest(&contract)?,
            timestamp: chrono::Utc::now(),
        });

        let store = SharedStateStore::new(document, self.storage.backend());
        let batch = CoordinatorChange::default()
            .write(DocKey::ApiSpec, serde_json::to_value(&contract)?)
            .write(DocKey::ApiSpecHistory, serde_json::to_value(&history)?)
            .event(AuditEvent::Revision {
                previous: Some(previous.clone()),
                revision: next.clone(),
                change: change.to_string(),
            });
        store.coordinator_commit(phase, batch)?;
        contractflow_utils::logging::log_revision(&run_id, Some(&previous), &next, &change.to_string());
        Ok(store.snapshot())
    }
}

//! The workflow state machine.
//!
//! Drives phases strictly in sequence until a terminal phase is reached.
//! Every phase is: acquire permitted inputs → invoke the stage → gate the
//! output → commit through the store → (implementation phases) validate
//! against the contract → decide the next edge. Any fatal error moves the run
//! to `FAILED` with `{phase, error_kind, message}`.

use contractflow_contract::{
    ArtifactRef, Attribution, BackendReport, Contract, FrontendReport, Issue, ProjectPlan, RevisionOrigin,
    RevisionRecord, ValidationFindings, ValidationReport,
};
use contractflow_revision::{ChangeKind, INITIAL_REVISION, Revision, ensure_monotonic, increment};
use contractflow_stage_api::{ArtifactSink, StageAdapter, StageTable};
use contractflow_store::{AuditEvent, COORDINATOR, CoordinatorChange, SharedStateStore};
use contractflow_utils::canonical::canonical_digest;
use contractflow_utils::error::{ConfigError, FlowError, StageError, StoreError};
use contractflow_utils::logging::{
    log_phase_complete, log_phase_error, log_phase_start, log_regeneration, log_revision, log_soft_drift,
    phase_span,
};
use contractflow_utils::types::{DocKey, Phase};
use contractflow_validation::{ContractValidator, StageEnvelope};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Instant;
use tracing::Instrument;

use crate::cancel::CancelSignal;
use crate::phase_exec::{Invocation, execute_stage};
use crate::settings::RunSettings;
use crate::state::{ErrorRecord, PhaseTransition, WorkflowState};
use crate::transitions::predecessor;

/// Where the machine goes after a phase.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Decision {
    Forward,
    Regenerate {
        to: Phase,
        change: ChangeKind,
        feedback: Vec<Issue>,
    },
}

/// Documents invalidated by a regeneration targeting `to`.
fn stale_documents(to: Phase) -> Vec<DocKey> {
    let mut keys = vec![DocKey::BackendReport, DocKey::FrontendReport, DocKey::ValidationFindings];
    if to == Phase::Planning {
        keys.insert(0, DocKey::ApiSpec);
    }
    keys
}

fn issue_event(issue: &Issue) -> AuditEvent {
    AuditEvent::Issue {
        rule: issue.rule.clone(),
        level: issue.level.to_string(),
        location: issue.location.clone(),
        message: issue.message.clone(),
    }
}

pub(crate) fn transition_event(entry: &PhaseTransition) -> AuditEvent {
    AuditEvent::Transition {
        from: entry.from,
        to: entry.to,
        transition: entry.transition,
    }
}

pub(crate) fn parse<T: DeserializeOwned>(key: DocKey, value: &Value) -> Result<T, FlowError> {
    T::deserialize(value).map_err(|e| {
        StoreError::MalformedDocument {
            reason: format!("{key}: {e}"),
        }
        .into()
    })
}

/// BLAKE3 of the canonical contract body.
pub(crate) fn contract_digest(contract: &Contract) -> Result<String, FlowError> {
    canonical_digest(&contract.openapi_spec)
        .map_err(|e| FlowError::Internal(format!("failed to digest contract body: {e:#}")))
}

pub(crate) fn revision_history(value: Option<&Value>) -> Result<Vec<RevisionRecord>, FlowError> {
    match value {
        Some(value) if !value.is_null() => parse(DocKey::ApiSpecHistory, value),
        _ => Ok(Vec::new()),
    }
}

/// One run of the state machine over a prepared store.
pub struct WorkflowStateMachine<'a> {
    run_id: String,
    store: &'a SharedStateStore,
    stages: &'a StageTable,
    settings: &'a RunSettings,
    sink: &'a dyn ArtifactSink,
    validator: ContractValidator,
    cancel: CancelSignal,
    state: WorkflowState,
    /// Audit events flushed with the next state commit
    pending: Vec<AuditEvent>,
}

impl<'a> WorkflowStateMachine<'a> {
    pub(crate) fn new(
        store: &'a SharedStateStore,
        stages: &'a StageTable,
        settings: &'a RunSettings,
        sink: &'a dyn ArtifactSink,
        cancel: CancelSignal,
        state: WorkflowState,
    ) -> Self {
        Self {
            run_id: store.run_id(),
            store,
            stages,
            settings,
            sink,
            validator: settings.validator(),
            cancel,
            state,
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Run until `COMPLETED` or `FAILED`.
    ///
    /// Errors are returned only when the store itself cannot record the
    /// outcome; every other failure ends in a `FAILED` state.
    pub async fn drive(mut self) -> Result<WorkflowState, FlowError> {
        while !self.state.is_terminal() {
            let phase = self.state.current_phase;
            let started = Instant::now();
            let span = phase_span(&self.run_id, phase.as_str(), self.state.attempt);

            let step = self.step(phase).instrument(span).await;
            let outcome = match step {
                Ok(decision) => self.advance(phase, decision),
                Err(err) => Err(err),
            };
            match outcome {
                Ok(()) => {
                    if phase.is_stage_phase() {
                        log_phase_complete(&self.run_id, phase.as_str(), started.elapsed().as_millis());
                    }
                }
                Err(err) => {
                    log_phase_error(
                        &self.run_id,
                        phase.as_str(),
                        &err.kind().to_string(),
                        &err.to_string(),
                        started.elapsed().as_millis(),
                    );
                    self.fail(phase, &err)?;
                }
            }
        }
        Ok(self.state)
    }

    async fn step(&mut self, phase: Phase) -> Result<Decision, FlowError> {
        if self.cancel.is_cancelled() {
            return Err(StageError::Cancelled {
                phase: phase.as_str().to_string(),
            }
            .into());
        }
        if phase == Phase::Init {
            return Ok(Decision::Forward);
        }

        let Some(stage) = self.stages.get(phase).cloned() else {
            if phase == Phase::Validation {
                return self.route_validation();
            }
            return Err(ConfigError::MissingStage {
                phase: phase.as_str().to_string(),
            }
            .into());
        };
        let envelope = self.invoke(phase, stage.as_ref()).await?;

        match phase {
            Phase::SpecGeneration => self.commit_contract(stage.name(), envelope)?,
            Phase::BackendGeneration | Phase::FrontendGeneration => {
                self.store.commit(stage.name(), envelope.outputs.clone())?;
                self.check_implementation(phase, &envelope)?;
            }
            _ => self.store.commit(stage.name(), envelope.outputs)?,
        }

        if phase == Phase::Validation {
            self.route_validation()
        } else {
            Ok(Decision::Forward)
        }
    }

    async fn invoke(&mut self, phase: Phase, stage: &dyn StageAdapter) -> Result<StageEnvelope, FlowError> {
        log_phase_start(&self.run_id, phase.as_str(), stage.name());
        let documents = self.store.read_inputs(stage.name())?;
        let output_keys = self
            .store
            .capabilities(stage.name())
            .map(|c| c.output_keys)
            .unwrap_or_default();
        let feedback = if matches!(phase, Phase::Planning | Phase::SpecGeneration) {
            self.state.feedback.clone()
        } else {
            Vec::new()
        };

        let invocation = Invocation {
            run_id: &self.run_id,
            phase,
            stage,
            output_keys: &output_keys,
            documents,
            feedback,
            timeout: self.settings.timeout_for(phase),
            retries: self.settings.output_retries,
        };

        let mut retried = Vec::new();
        let result = execute_stage(invocation, &mut self.cancel, |attempt, err| {
            retried.push((attempt, ErrorRecord::new(phase, err)));
        })
        .await;

        for (attempt, record) in retried {
            self.pending.push(AuditEvent::Retry {
                attempt,
                reason: record.message.clone(),
            });
            self.state.error_history.push(record);
        }
        result
    }

    /// Stamp the revision and commit the contract with its history record.
    ///
    /// The previous revision is the newer of the committed contract's and the
    /// last history entry's, so a document that arrives with a contract but
    /// no history keeps counting from that contract.
    fn commit_contract(&mut self, stage: &str, mut envelope: StageEnvelope) -> Result<(), FlowError> {
        let value = envelope.outputs.remove(&DocKey::ApiSpec).ok_or_else(|| {
            FlowError::Internal("spec envelope is missing api_spec".to_string())
        })?;
        let mut contract: Contract = parse(DocKey::ApiSpec, &value)?;

        let mut history = revision_history(self.store.get(DocKey::ApiSpecHistory).as_ref())?;
        let previous = self.previous_revision(&history)?;
        let (revision, origin) = match &previous {
            None => (INITIAL_REVISION.to_string(), RevisionOrigin::Initial),
            Some(prev) => {
                let change = self.state.pending_change.unwrap_or(ChangeKind::SpecRegen);
                let next = increment(prev, change)?;
                ensure_monotonic(prev, &next)?;
                (next, change.into())
            }
        };

        // Deserializing recomputed the embedded report status.
        contract.revision = Some(revision.clone());
        let digest = contract_digest(&contract)?;
        envelope
            .outputs
            .insert(DocKey::ApiSpec, serde_json::to_value(&contract)?);

        let description = match origin {
            RevisionOrigin::Initial => "initial contract".to_string(),
            _ => format!(
                "{origin} after {} blocking issue(s)",
                self.state.feedback.iter().filter(|i| i.is_error()).count()
            ),
        };
        history.push(RevisionRecord {
            revision: revision.parse()?,
            origin,
            phase: Phase::SpecGeneration,
            stage: stage.to_string(),
            description,
            digest,
            timestamp: chrono::Utc::now(),
        });

        let change = CoordinatorChange::default()
            .write(DocKey::ApiSpecHistory, serde_json::to_value(&history)?)
            .event(AuditEvent::Revision {
                previous: previous.clone(),
                revision: revision.clone(),
                change: origin.to_string(),
            });
        self.store.commit_with(stage, envelope.outputs, change)?;
        log_revision(&self.run_id, previous.as_deref(), &revision, &origin.to_string());

        self.state.pending_change = None;
        self.state.feedback.clear();
        Ok(())
    }

    fn previous_revision(&self, history: &[RevisionRecord]) -> Result<Option<String>, FlowError> {
        let committed = match self.store.get(DocKey::ApiSpec) {
            Some(value) if !value.is_null() => parse::<Contract>(DocKey::ApiSpec, &value)?
                .revision
                .map(|r| r.parse::<Revision>())
                .transpose()?,
            _ => None,
        };
        let recorded = history.last().map(|r| r.revision);
        Ok(committed.max(recorded).map(|r| r.to_string()))
    }

    fn document<T: DeserializeOwned>(&self, key: DocKey) -> Result<T, FlowError> {
        let value = self.store.get(key).ok_or_else(|| StoreError::MissingDependency {
            caller: COORDINATOR.to_string(),
            key: key.to_string(),
        })?;
        parse(key, &value)
    }

    fn check_implementation(&mut self, phase: Phase, envelope: &StageEnvelope) -> Result<(), FlowError> {
        let contract: Contract = self.document(DocKey::ApiSpec)?;
        let (report, artifacts): (ValidationReport, Vec<ArtifactRef>) = match phase {
            Phase::BackendGeneration => {
                let value = envelope.outputs.get(&DocKey::BackendReport);
                let report: BackendReport = parse(DocKey::BackendReport, value.unwrap_or(&Value::Null))?;
                (self.validator.validate(&report, &contract), report.artifacts)
            }
            _ => {
                let value = envelope.outputs.get(&DocKey::FrontendReport);
                let report: FrontendReport = parse(DocKey::FrontendReport, value.unwrap_or(&Value::Null))?;
                (self.validator.validate(&report, &contract), report.artifacts)
            }
        };

        for issue in report.issues() {
            if !issue.is_error() {
                log_soft_drift(&self.run_id, phase.as_str(), &issue.rule, &issue.location);
            }
            self.pending.push(issue_event(issue));
        }
        tracing::info!(
            run_id = %self.run_id,
            phase = %phase,
            status = %report.status(),
            errors = report.error_count(),
            "Contract compliance checked"
        );

        let files = self
            .sink
            .persist(phase, &artifacts)
            .map_err(|e| StageError::Failed {
                phase: phase.as_str().to_string(),
                stage: "artifact_sink".to_string(),
                kind: "persist_failed".to_string(),
                message: format!("{e:#}"),
            })?;
        self.state.artifacts.record_persisted(phase, &artifacts, files);

        if phase == Phase::BackendGeneration {
            self.state.backend_validation = Some(report);
        } else {
            self.state.frontend_validation = Some(report);
        }
        Ok(())
    }

    /// Combine every finding and pick the next edge.
    ///
    /// Requirements-attributed hard drift rebuilds the plan; any other hard
    /// drift regenerates the contract. Warnings never route backwards.
    fn route_validation(&mut self) -> Result<Decision, FlowError> {
        let contract: Contract = self.document(DocKey::ApiSpec)?;
        let plan: ProjectPlan = self.document(DocKey::ProjectPlan)?;

        let mut fresh = Vec::new();
        fresh.extend(contract.validation_report.issues().iter().cloned());
        fresh.extend(self.validator.validate_requirements(&contract, &plan).into_issues());
        if let Some(value) = self.store.get(DocKey::ValidationFindings) {
            let findings: ValidationFindings = parse(DocKey::ValidationFindings, &value)?;
            fresh.extend(findings.issues);
        }
        for issue in &fresh {
            if !issue.is_error() {
                log_soft_drift(&self.run_id, Phase::Validation.as_str(), &issue.rule, &issue.location);
            }
            self.pending.push(issue_event(issue));
        }

        let mut combined = ValidationReport::default();
        for report in [&self.state.backend_validation, &self.state.frontend_validation]
            .into_iter()
            .flatten()
        {
            combined.extend(report.issues().iter().cloned());
        }
        combined.extend(fresh);

        let blocking: Vec<Issue> = combined.errors().cloned().collect();
        self.state.validation = Some(combined);
        if blocking.is_empty() {
            return Ok(Decision::Forward);
        }

        let (to, change) = if blocking
            .iter()
            .any(|i| i.attribution == Attribution::Requirements)
        {
            (Phase::Planning, ChangeKind::PlannerRegen)
        } else {
            (Phase::SpecGeneration, ChangeKind::SpecRegen)
        };
        Ok(Decision::Regenerate {
            to,
            change,
            feedback: blocking,
        })
    }

    fn advance(&mut self, phase: Phase, decision: Decision) -> Result<(), FlowError> {
        let mut change = CoordinatorChange::default();
        match decision {
            Decision::Forward => {
                let next = phase.forward().ok_or_else(|| FlowError::RunTerminated {
                    phase: phase.as_str().to_string(),
                })?;
                let entry = self.state.transition(next)?;
                if phase.is_stage_phase() {
                    self.state.last_stable_phase = Some(phase);
                }
                change = change.event(transition_event(&entry));
            }
            Decision::Regenerate { to, change: kind, feedback } => {
                let count = self.state.regeneration_count + 1;
                self.state.regeneration_count = count;
                let limit = self.settings.max_regenerations;
                if count > limit {
                    return Err(FlowError::RegenerationLimitExceeded { count, limit });
                }
                log_regeneration(&self.run_id, phase.as_str(), to.as_str(), count, limit);

                let entry = self.state.transition(to)?;
                self.state.pending_change = Some(kind);
                self.state.feedback = feedback;
                self.state.last_stable_phase = Some(predecessor(to)).filter(|p| *p != Phase::Init);
                self.state.backend_validation = None;
                self.state.frontend_validation = None;
                change = change
                    .clear(stale_documents(to))
                    .event(AuditEvent::Regeneration {
                        from: phase,
                        to,
                        count,
                        change: kind.to_string(),
                    })
                    .event(transition_event(&entry));
            }
        }
        self.commit_state(phase, change)
    }

    fn fail(&mut self, phase: Phase, err: &FlowError) -> Result<(), FlowError> {
        let entry = self.state.fail(phase, err)?;
        let change = CoordinatorChange::default()
            .event(AuditEvent::Failure {
                error_kind: err.kind().to_string(),
                message: err.to_string(),
            })
            .event(transition_event(&entry));
        self.commit_state(phase, change)
    }

    fn commit_state(&mut self, phase: Phase, change: CoordinatorChange) -> Result<(), FlowError> {
        let mut change = change.write(DocKey::WorkflowState, self.state.to_value()?);
        let mut events = std::mem::take(&mut self.pending);
        events.append(&mut change.events);
        change.events = events;
        self.store.coordinator_commit(phase, change)?;
        Ok(())
    }
}

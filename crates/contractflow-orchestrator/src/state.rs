//! Workflow state, persisted under `workflow_state`.

use chrono::{DateTime, Utc};
use contractflow_contract::{Issue, ValidationReport};
use contractflow_revision::ChangeKind;
use contractflow_status::ArtifactTracker;
use contractflow_utils::error::{FlowError, StoreError};
use contractflow_utils::types::{ErrorKind, Phase, TransitionKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transitions::check_transition;

/// One entry of `phase_history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
    pub timestamp: DateTime<Utc>,
    pub transition: TransitionKind,
}

/// A fatal error or a retried output rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub phase: Phase,
    pub error_kind: ErrorKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    #[must_use]
    pub fn new(phase: Phase, error: &FlowError) -> Self {
        Self {
            phase,
            error_kind: error.kind(),
            message: error.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Singleton per run, mutated only by the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub current_phase: Phase,
    #[serde(default)]
    pub phase_history: Vec<PhaseTransition>,
    #[serde(default)]
    pub regeneration_count: u32,
    #[serde(default)]
    pub last_error: Option<ErrorRecord>,
    #[serde(default)]
    pub error_history: Vec<ErrorRecord>,
    /// Last phase whose outputs are committed and still current
    #[serde(default)]
    pub last_stable_phase: Option<Phase>,
    /// Change classification for the next contract commit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_change: Option<ChangeKind>,
    /// Blocking issues handed to the regenerated stages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feedback: Vec<Issue>,
    #[serde(default)]
    pub backend_validation: Option<ValidationReport>,
    #[serde(default)]
    pub frontend_validation: Option<ValidationReport>,
    /// Combined report of the last `VALIDATION` pass
    #[serde(default)]
    pub validation: Option<ValidationReport>,
    /// 1 for a fresh run, incremented by every resume
    #[serde(default = "first_attempt")]
    pub attempt: u32,
    #[serde(default)]
    pub artifacts: ArtifactTracker,
}

const fn first_attempt() -> u32 {
    1
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current_phase: Phase::Init,
            phase_history: Vec::new(),
            regeneration_count: 0,
            last_error: None,
            error_history: Vec::new(),
            last_stable_phase: None,
            pending_change: None,
            feedback: Vec::new(),
            backend_validation: None,
            frontend_validation: None,
            validation: None,
            attempt: first_attempt(),
            artifacts: ArtifactTracker::new(),
        }
    }

    /// Move along an edge of the transition table and record it.
    pub fn transition(&mut self, to: Phase) -> Result<PhaseTransition, FlowError> {
        let from = self.current_phase;
        let kind = check_transition(from, to)?;
        Ok(self.push_history(from, to, kind))
    }

    /// Start a new attempt at `to` after a failure or interruption.
    ///
    /// Bypasses the table: a resumed run is a new attempt, not an edge out
    /// of the absorbing `FAILED` state.
    pub(crate) fn resume_at(&mut self, to: Phase) -> PhaseTransition {
        let from = self.current_phase;
        self.attempt += 1;
        self.last_error = None;
        self.push_history(from, to, TransitionKind::Resume)
    }

    fn push_history(&mut self, from: Phase, to: Phase, transition: TransitionKind) -> PhaseTransition {
        let entry = PhaseTransition {
            from,
            to,
            timestamp: Utc::now(),
            transition,
        };
        self.current_phase = to;
        self.phase_history.push(entry.clone());
        entry
    }

    /// Record a fatal error and move to `FAILED`.
    pub fn fail(&mut self, phase: Phase, error: &FlowError) -> Result<PhaseTransition, FlowError> {
        let record = ErrorRecord::new(phase, error);
        self.error_history.push(record.clone());
        self.last_error = Some(record);
        self.transition(Phase::Failed)
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.current_phase.is_terminal()
    }

    pub fn to_value(&self) -> Result<Value, FlowError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: &Value) -> Result<Self, FlowError> {
        Self::deserialize(value).map_err(|e| {
            StoreError::MalformedDocument {
                reason: format!("workflow_state: {e}"),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractflow_utils::error::StageError;

    #[test]
    fn test_history_records_each_edge() {
        let mut state = WorkflowState::new();
        state.transition(Phase::Planning).unwrap();
        state.transition(Phase::SpecGeneration).unwrap();
        assert_eq!(state.phase_history.len(), 2);
        assert_eq!(state.phase_history[1].from, Phase::Planning);
        assert_eq!(state.phase_history[1].transition, TransitionKind::Forward);
    }

    #[test]
    fn test_invalid_transition_leaves_state_untouched() {
        let mut state = WorkflowState::new();
        state.transition(Phase::Planning).unwrap();
        let err = state.transition(Phase::BackendGeneration).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(state.current_phase, Phase::Planning);
        assert_eq!(state.phase_history.len(), 1);
    }

    #[test]
    fn test_fail_records_error_and_absorbs() {
        let mut state = WorkflowState::new();
        state.transition(Phase::Planning).unwrap();
        let err: FlowError = StageError::Timeout {
            phase: "PLANNING".into(),
            timeout_seconds: 30,
        }
        .into();
        let entry = state.fail(Phase::Planning, &err).unwrap();
        assert_eq!(entry.transition, TransitionKind::Failure);
        assert_eq!(state.last_error.as_ref().unwrap().error_kind, ErrorKind::StageTimeout);
        assert!(state.is_terminal());
        assert!(matches!(
            state.transition(Phase::Planning),
            Err(FlowError::RunTerminated { .. })
        ));
    }

    #[test]
    fn test_resume_starts_new_attempt() {
        let mut state = WorkflowState::new();
        state.transition(Phase::Planning).unwrap();
        state
            .fail(Phase::Planning, &FlowError::Internal("boom".into()))
            .unwrap();
        let entry = state.resume_at(Phase::Planning);
        assert_eq!(entry.transition, TransitionKind::Resume);
        assert_eq!(state.attempt, 2);
        assert!(state.last_error.is_none());
        assert_eq!(state.error_history.len(), 1);
    }

    #[test]
    fn test_serialized_layout() {
        let mut state = WorkflowState::new();
        state.transition(Phase::Planning).unwrap();
        let value = state.to_value().unwrap();
        assert_eq!(value["current_phase"], "PLANNING");
        assert_eq!(value["phase_history"][0]["transition"], "forward");
        assert_eq!(value["attempt"], 1);
        assert!(value.get("pending_change").is_none());
        assert_eq!(WorkflowState::from_value(&value).unwrap(), state);

        let minimal = serde_json::json!({"current_phase": "FAILED"});
        assert_eq!(WorkflowState::from_value(&minimal).unwrap().attempt, 1);
        assert!(WorkflowState::from_value(&serde_json::json!({"phase": 1})).is_err());
    }
}

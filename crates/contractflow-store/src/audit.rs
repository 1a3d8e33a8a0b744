//! Append-only audit log.
//!
//! Every committed write, issue, retry, regeneration, transition and failure
//! lands here with the phase it happened in. The log is persisted with the
//! run document and is never rewritten.

use chrono::{DateTime, Utc};
use contractflow_utils::types::{Phase, TransitionKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A document key was committed.
    Write { key: String, stage: String },
    /// A document key was cleared ahead of regeneration.
    Cleared { key: String },
    /// A validation finding.
    Issue {
        rule: String,
        level: String,
        location: String,
        message: String,
    },
    /// An output-format retry.
    Retry { attempt: u32, reason: String },
    Regeneration {
        from: Phase,
        to: Phase,
        count: u32,
        change: String,
    },
    Transition {
        from: Phase,
        to: Phase,
        transition: TransitionKind,
    },
    Failure { error_kind: String, message: String },
    Resume { from: Phase, to: Phase },
    /// A contract revision was assigned.
    Revision {
        previous: Option<String>,
        revision: String,
        change: String,
    },
}

impl AuditEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Write { .. } => "write",
            Self::Cleared { .. } => "cleared",
            Self::Issue { .. } => "issue",
            Self::Retry { .. } => "retry",
            Self::Regeneration { .. } => "regeneration",
            Self::Transition { .. } => "transition",
            Self::Failure { .. } => "failure",
            Self::Resume { .. } => "resume",
            Self::Revision { .. } => "revision",
        }
    }
}

/// One line of the audit log: `(phase, timestamp, event)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub phase: Phase,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuditEvent,
}

impl AuditEntry {
    #[must_use]
    pub fn now(phase: Phase, event: AuditEvent) -> Self {
        Self {
            phase,
            timestamp: Utc::now(),
            event,
        }
    }

    /// Written key, for `write` entries.
    #[must_use]
    pub fn written_key(&self) -> Option<&str> {
        match &self.event {
            AuditEvent::Write { key, .. } => Some(key),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_is_flat_with_event_tag() {
        let entry = AuditEntry::now(
            Phase::Planning,
            AuditEvent::Write {
                key: "project_plan".to_string(),
                stage: "planner".to_string(),
            },
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["event"], "write");
        assert_eq!(value["phase"], "PLANNING");
        assert_eq!(value["key"], "project_plan");
        assert!(value["timestamp"].is_string());

        let back: AuditEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back.written_key(), Some("project_plan"));
    }

    #[test]
    fn test_transition_entry() {
        let entry = AuditEntry::now(
            Phase::Validation,
            AuditEvent::Transition {
                from: Phase::Validation,
                to: Phase::SpecGeneration,
                transition: TransitionKind::Regeneration,
            },
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["transition"], "regeneration");
        assert_eq!(entry.event.name(), "transition");
    }
}

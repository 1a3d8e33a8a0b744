use chrono::{DateTime, Utc};
use contractflow_revision::{ChangeKind, Revision};
use contractflow_utils::types::Phase;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Why a contract revision exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RevisionOrigin {
    /// First contract of the run.
    Initial,
    BugFix,
    SpecRegen,
    PlannerRegen,
    /// Contract that arrived with an existing document, recorded as-is.
    Adopted,
}

impl From<ChangeKind> for RevisionOrigin {
    fn from(kind: ChangeKind) -> Self {
        match kind {
            ChangeKind::BugFix => Self::BugFix,
            ChangeKind::SpecRegen => Self::SpecRegen,
            ChangeKind::PlannerRegen => Self::PlannerRegen,
        }
    }
}

/// One entry of `api_spec_history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub revision: Revision,
    pub origin: RevisionOrigin,
    /// Phase in which the contract was committed
    pub phase: Phase,
    /// Stage (or caller) that produced the contract body
    pub stage: String,
    pub description: String,
    /// BLAKE3 of the canonical contract body
    pub digest: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serialization() {
        let record = RevisionRecord {
            revision: Revision::new(1, 1, 0),
            origin: ChangeKind::SpecRegen.into(),
            phase: Phase::SpecGeneration,
            stage: "spec".to_string(),
            description: "regenerated after missing_endpoint".to_string(),
            digest: "ab".repeat(32),
            timestamp: DateTime::parse_from_rfc3339("2026-10-14T08:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["revision"], "1.1.0");
        assert_eq!(value["origin"], "spec_regen");
        assert_eq!(value["phase"], "SPEC_GENERATION");
        let back: RevisionRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}

use contractflow_utils::error::StoreError;
use contractflow_utils::types::{DocKey, Phase};
use serde::{Deserialize, Serialize};

/// Name the coordinator uses for its own audit entries.
pub const COORDINATOR: &str = "coordinator";

/// What a registered caller may touch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCapabilities {
    pub name: String,
    pub phase: Phase,
    pub input_keys: Vec<DocKey>,
    pub output_keys: Vec<DocKey>,
}

impl StageCapabilities {
    pub fn new(
        name: impl Into<String>,
        phase: Phase,
        input_keys: impl Into<Vec<DocKey>>,
        output_keys: impl Into<Vec<DocKey>>,
    ) -> Self {
        Self {
            name: name.into(),
            phase,
            input_keys: input_keys.into(),
            output_keys: output_keys.into(),
        }
    }

    #[must_use]
    pub fn can_read(&self, key: DocKey) -> bool {
        self.input_keys.contains(&key)
    }

    #[must_use]
    pub fn can_write(&self, key: DocKey) -> bool {
        self.output_keys.contains(&key)
    }

    /// Reject declarations the store must never honor.
    pub(crate) fn check(&self) -> Result<(), StoreError> {
        if self.name.trim().is_empty() || self.name == COORDINATOR {
            return Err(StoreError::DuplicateCaller {
                caller: self.name.clone(),
            });
        }
        if let Some(key) = self.output_keys.iter().find(|k| k.is_reserved()) {
            return Err(StoreError::ReservedKey {
                caller: self.name.clone(),
                key: key.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_output_rejected() {
        let caps = StageCapabilities::new(
            "rogue",
            Phase::Planning,
            [DocKey::UserRequest],
            [DocKey::ProjectPlan, DocKey::WorkflowState],
        );
        assert!(matches!(caps.check(), Err(StoreError::ReservedKey { key, .. }) if key == "workflow_state"));
    }

    #[test]
    fn test_coordinator_name_is_taken() {
        let caps = StageCapabilities::new(COORDINATOR, Phase::Planning, Vec::<DocKey>::new(), [DocKey::ProjectPlan]);
        assert!(caps.check().is_err());
    }

    #[test]
    fn test_reading_reserved_keys_is_allowed() {
        let caps = StageCapabilities::new(
            "auditor",
            Phase::Validation,
            [DocKey::ApiSpecHistory],
            [DocKey::ValidationFindings],
        );
        assert!(caps.check().is_ok());
        assert!(caps.can_read(DocKey::ApiSpecHistory));
        assert!(!caps.can_write(DocKey::ApiSpecHistory));
    }
}

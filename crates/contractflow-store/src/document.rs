//! The persisted run document.
//!
//! ```json
//! {
//!   "run_id": "todo-app",
//!   "user_request": "...",
//!   "project_plan": {...},
//!   "api_spec": {"revision": "1.1.0", "openapi_spec": {...}, "validation_report": {...}},
//!   "api_spec_history": [...],
//!   "backend_report": {...},
//!   "frontend_report": {...},
//!   "workflow_state": {...},
//!   "audit_log": [...],
//!   "archived_states": [...]
//! }
//! ```
//!
//! Document keys sit at the top level. Keys this version does not know are
//! kept in `extra` and written back unchanged.

use contractflow_utils::error::StoreError;
use contractflow_utils::types::DocKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::audit::AuditEntry;

const RUN_ID: &str = "run_id";
const AUDIT_LOG: &str = "audit_log";
const ARCHIVED_STATES: &str = "archived_states";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunDocument {
    pub run_id: String,
    pub documents: BTreeMap<DocKey, Value>,
    pub audit_log: Vec<AuditEntry>,
    /// Workflow states of earlier attempts, oldest first.
    pub archived_states: Vec<Value>,
    pub extra: Map<String, Value>,
}

impl RunDocument {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn get(&self, key: DocKey) -> Option<&Value> {
        self.documents.get(&key)
    }

    /// Present and not empty.
    #[must_use]
    pub fn has(&self, key: DocKey) -> bool {
        self.get(key).is_some_and(|v| !is_empty(v))
    }

    pub fn to_value(&self) -> Result<Value, StoreError> {
        let mut map = self.extra.clone();
        map.insert(RUN_ID.to_string(), Value::String(self.run_id.clone()));
        for (key, value) in &self.documents {
            map.insert(key.to_string(), value.clone());
        }
        let audit = serde_json::to_value(&self.audit_log).map_err(|e| StoreError::MalformedDocument {
            reason: format!("audit log: {e}"),
        })?;
        map.insert(AUDIT_LOG.to_string(), audit);
        map.insert(
            ARCHIVED_STATES.to_string(),
            Value::Array(self.archived_states.clone()),
        );
        Ok(Value::Object(map))
    }

    pub fn from_value(value: Value) -> Result<Self, StoreError> {
        let Value::Object(mut map) = value else {
            return Err(StoreError::MalformedDocument {
                reason: "run document must be a JSON object".to_string(),
            });
        };

        let run_id = match map.remove(RUN_ID) {
            Some(Value::String(id)) => id,
            Some(_) => {
                return Err(StoreError::MalformedDocument {
                    reason: "run_id must be a string".to_string(),
                });
            }
            None => String::new(),
        };
        let audit_log = match map.remove(AUDIT_LOG) {
            Some(v) => serde_json::from_value(v).map_err(|e| StoreError::MalformedDocument {
                reason: format!("audit log: {e}"),
            })?,
            None => Vec::new(),
        };
        let archived_states = match map.remove(ARCHIVED_STATES) {
            Some(Value::Array(states)) => states,
            Some(_) => {
                return Err(StoreError::MalformedDocument {
                    reason: "archived_states must be an array".to_string(),
                });
            }
            None => Vec::new(),
        };

        let mut documents = BTreeMap::new();
        let mut extra = Map::new();
        for (name, value) in map {
            match name.parse::<DocKey>() {
                Ok(key) => {
                    documents.insert(key, value);
                }
                Err(_) => {
                    extra.insert(name, value);
                }
            }
        }

        Ok(Self {
            run_id,
            documents,
            audit_log,
            archived_states,
            extra,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let value: Value = serde_json::from_str(json).map_err(|e| StoreError::MalformedDocument {
            reason: e.to_string(),
        })?;
        Self::from_value(value)
    }
}

impl Serialize for RunDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RunDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// Absent-equivalent values: `null`, `{}`, `[]`, and blank strings.
#[must_use]
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

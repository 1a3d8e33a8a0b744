//! Typed shape checks for committed documents.

use contractflow_contract::{BackendReport, Contract, FrontendReport, ProjectPlan, ValidationFindings};
use contractflow_utils::types::DocKey;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

fn normalize_as<T: DeserializeOwned + Serialize>(value: &Value) -> Result<Value, String> {
    let typed = T::deserialize(value).map_err(|e| e.to_string())?;
    serde_json::to_value(&typed).map_err(|e| e.to_string())
}

/// Parse `value` through the typed model for `key` and serialize it back.
///
/// Defaulted fields come back explicit, so a committed document always
/// carries every field [`validate_integrity`](crate::validate_integrity)
/// requires. Keys without a typed model (`user_request`) are returned as-is
/// and only need to be non-null.
pub fn normalize_document(key: DocKey, value: &Value) -> Result<Value, String> {
    match key {
        DocKey::ProjectPlan => normalize_as::<ProjectPlan>(value),
        DocKey::ApiSpec => normalize_as::<Contract>(value),
        DocKey::BackendReport => normalize_as::<BackendReport>(value),
        DocKey::FrontendReport => normalize_as::<FrontendReport>(value),
        DocKey::ValidationFindings => normalize_as::<ValidationFindings>(value),
        DocKey::UserRequest | DocKey::ApiSpecHistory | DocKey::WorkflowState => {
            if value.is_null() {
                Err(format!("'{key}' must not be null"))
            } else {
                Ok(value.clone())
            }
        }
    }
}

/// Check that `value` has the shape expected for `key`.
pub fn check_shape(key: DocKey, value: &Value) -> Result<(), String> {
    normalize_document(key, value).map(|_| ())
}

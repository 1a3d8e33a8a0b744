//! Whole-document integrity checks, run before resuming from a persisted run.

use contractflow_contract::{Issue, ValidationReport};
use contractflow_revision::{Revision, ensure_monotonic};
use contractflow_utils::types::DocKey;
use serde_json::Value;
use std::collections::BTreeMap;

fn required_fields(key: DocKey) -> &'static [&'static str] {
    match key {
        DocKey::ProjectPlan => &["project_name", "features", "entities"],
        DocKey::ApiSpec => &["revision", "openapi_spec", "validation_report"],
        DocKey::BackendReport => &["implemented_endpoints", "compliance_status"],
        DocKey::FrontendReport => &["implemented_components", "compliance_status"],
        _ => &[],
    }
}

/// Check required fields of every document present in `documents`.
///
/// Absent documents are not an error here: a run that failed in
/// `BACKEND_GENERATION` legitimately has no frontend report yet.
pub fn validate_integrity(documents: &BTreeMap<DocKey, Value>) -> ValidationReport {
    let mut report = ValidationReport::default();

    for (key, value) in documents {
        let fields = required_fields(*key);
        if fields.is_empty() || value.is_null() {
            continue;
        }
        let Some(object) = value.as_object() else {
            report.push(Issue::error(
                "integrity_not_object",
                key.to_string(),
                format!("'{key}' must be a JSON object"),
            ));
            continue;
        };
        for field in fields {
            if object.get(*field).is_none_or(Value::is_null) {
                report.push(Issue::error(
                    "integrity_missing_field",
                    format!("{key}.{field}"),
                    format!("'{key}' is missing required field '{field}'"),
                ));
            }
        }
    }

    if let Some(revision) = documents
        .get(&DocKey::ApiSpec)
        .and_then(|spec| spec.get("revision"))
        .and_then(Value::as_str)
        && revision.parse::<Revision>().is_err()
    {
        report.push(Issue::error(
            "invalid_revision",
            "api_spec.revision",
            format!("contract revision '{revision}' is not MAJOR.MINOR.PATCH"),
        ));
    }

    if let Some(history) = documents.get(&DocKey::ApiSpecHistory) {
        check_history(history, &mut report);
    }

    report
}

fn check_history(history: &Value, report: &mut ValidationReport) {
    let Some(entries) = history.as_array() else {
        report.push(Issue::error(
            "integrity_not_array",
            "api_spec_history",
            "'api_spec_history' must be a JSON array",
        ));
        return;
    };
    let revisions: Vec<&str> = entries
        .iter()
        .filter_map(|e| e.get("revision").and_then(Value::as_str))
        .collect();
    for pair in revisions.windows(2) {
        if let Err(e) = ensure_monotonic(pair[0], pair[1]) {
            report.push(Issue::error("revision_regressed", "api_spec_history", e.to_string()));
        }
    }
}

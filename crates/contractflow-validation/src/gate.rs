//! Stage output gate.
//!
//! A stage must answer with exactly one JSON object keyed by document key:
//!
//! ```json
//! {"project_plan": {"project_name": "todo", "features": []}}
//! ```
//!
//! Markdown fences, leading or trailing prose, and non-object values are
//! rejected as `invalid_output_format` before anything reaches the store.
//! A key the stage did not declare as an output is a permission error, not a
//! format error: retrying would not change what the stage is allowed to write.

use contractflow_utils::error::{FlowError, StageError, StoreError};
use contractflow_utils::types::{DocKey, Phase};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::shape::normalize_document;

/// Openers that mark conversational output rather than a document
static PROSE_OPENERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(I('ve| have| will| am|'ll)|Here('s| is)|This is|Let me|Sure|Certainly|Great|Perfect|Below is|Based on)")
        .expect("static prose regex")
});

/// Gated stage output, ready for a permissioned commit.
#[derive(Debug, Clone, PartialEq)]
pub struct StageEnvelope {
    pub outputs: BTreeMap<DocKey, Value>,
}

fn invalid(phase: Phase, reason: impl Into<String>) -> FlowError {
    StageError::InvalidOutput {
        phase: phase.as_str().to_string(),
        reason: reason.into(),
    }
    .into()
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Parse raw stage output into an envelope.
///
/// `stage` and `declared_outputs` come from the stage's registration. Every
/// declared output must be present, non-empty and well-shaped. Typed
/// documents are returned in their normalized form.
pub fn parse_stage_output(
    phase: Phase,
    stage: &str,
    declared_outputs: &[DocKey],
    raw: &str,
) -> Result<StageEnvelope, FlowError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid(phase, "output is empty"));
    }
    if trimmed.starts_with("```") {
        return Err(invalid(phase, "output is wrapped in a Markdown code fence"));
    }
    if !trimmed.starts_with('{') {
        let reason = if trimmed.starts_with('[') {
            "top-level value is an array, expected an object".to_string()
        } else if PROSE_OPENERS.is_match(trimmed) {
            "output starts with prose instead of JSON".to_string()
        } else {
            let head: String = trimmed.chars().take(24).collect();
            format!("output does not start with a JSON object (starts with {head:?})")
        };
        return Err(invalid(phase, reason));
    }

    let mut de = serde_json::Deserializer::from_str(trimmed);
    let value = Value::deserialize(&mut de).map_err(|e| invalid(phase, format!("invalid JSON: {e}")))?;
    de.end()
        .map_err(|_| invalid(phase, "unexpected content after the JSON object"))?;

    let Value::Object(map) = value else {
        return Err(invalid(phase, "top-level value is not an object"));
    };

    let mut outputs = BTreeMap::new();
    for (name, value) in map {
        let key: DocKey = name
            .parse()
            .map_err(|_| invalid(phase, format!("unknown document key '{name}'")))?;
        if !declared_outputs.contains(&key) {
            return Err(StoreError::WriteDenied {
                caller: stage.to_string(),
                key: name,
            }
            .into());
        }
        outputs.insert(key, value);
    }

    for key in declared_outputs {
        let Some(value) = outputs.get(key) else {
            return Err(invalid(phase, format!("missing declared output '{key}'")));
        };
        if is_empty_value(value) {
            return Err(invalid(phase, format!("declared output '{key}' is empty")));
        }
        let normalized = normalize_document(*key, value)
            .map_err(|reason| invalid(phase, format!("'{key}' has the wrong shape: {reason}")))?;
        outputs.insert(*key, normalized);
    }

    Ok(StageEnvelope { outputs })
}

//! Run status summaries.

use anyhow::{Context, Result};
use contractflow_contract::{ArtifactRef, ValidationReport};
use contractflow_store::RunDocument;
use contractflow_utils::canonical::emit_jcs;
use contractflow_utils::types::{ConfigSource, DocKey, Phase};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use strum::IntoEnumIterator;

use crate::artifact::{ArtifactSummary, ArtifactTracker};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigValue {
    pub value: Value,
    pub source: ConfigSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastError {
    pub phase: String,
    pub error_kind: String,
    pub message: String,
}

/// Status of one run, built from its persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub schema_version: String,
    pub run_id: String,
    pub current_phase: Option<Phase>,
    pub last_stable_phase: Option<Phase>,
    /// Availability of every document key
    pub documents: BTreeMap<DocKey, bool>,
    pub contract_revision: Option<String>,
    pub revision_count: usize,
    pub regeneration_count: u64,
    pub backend_validation: Option<ValidationReport>,
    pub frontend_validation: Option<ValidationReport>,
    pub artifacts: ArtifactTracker,
    pub audit_entries: usize,
    pub archived_attempts: usize,
    pub last_error: Option<LastError>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub effective_config: BTreeMap<String, ConfigValue>,
}

fn phase_field(state: Option<&Value>, field: &str) -> Option<Phase> {
    state?.get(field)?.as_str()?.parse().ok()
}

fn report_field(state: Option<&Value>, field: &str) -> Option<ValidationReport> {
    let value = state?.get(field)?;
    if value.is_null() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

fn artifact_refs(document: &RunDocument, key: DocKey) -> Vec<ArtifactRef> {
    document
        .get(key)
        .and_then(|r| r.get("artifacts"))
        .and_then(|a| serde_json::from_value(a.clone()).ok())
        .unwrap_or_default()
}

impl StatusSummary {
    #[must_use]
    pub fn from_document(document: &RunDocument) -> Self {
        let state = document.get(DocKey::WorkflowState);

        let documents = DocKey::iter().map(|k| (k, document.has(k))).collect();

        // Recorded summaries include the persistence collaborator's file
        // lists; fall back to what the reports declare.
        let artifacts = state
            .and_then(|s| s.get("artifacts"))
            .and_then(|a| serde_json::from_value::<ArtifactTracker>(a.clone()).ok())
            .unwrap_or_else(|| {
                let mut tracker = ArtifactTracker::new();
                for (phase, key) in [
                    (Phase::BackendGeneration, DocKey::BackendReport),
                    (Phase::FrontendGeneration, DocKey::FrontendReport),
                ] {
                    if document.has(key) {
                        tracker.record(phase, &artifact_refs(document, key));
                    }
                }
                tracker
            });

        Self {
            schema_version: "1".to_string(),
            run_id: document.run_id.clone(),
            current_phase: phase_field(state, "current_phase"),
            last_stable_phase: phase_field(state, "last_stable_phase"),
            documents,
            contract_revision: document
                .get(DocKey::ApiSpec)
                .and_then(|c| c.get("revision"))
                .and_then(Value::as_str)
                .map(str::to_string),
            revision_count: document
                .get(DocKey::ApiSpecHistory)
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
            regeneration_count: state
                .and_then(|s| s.get("regeneration_count"))
                .and_then(Value::as_u64)
                .unwrap_or(0),
            backend_validation: report_field(state, "backend_validation"),
            frontend_validation: report_field(state, "frontend_validation"),
            artifacts,
            audit_entries: document.audit_log.len(),
            archived_attempts: document.archived_states.len(),
            last_error: state
                .and_then(|s| s.get("last_error"))
                .filter(|e| !e.is_null())
                .and_then(|e| serde_json::from_value(e.clone()).ok()),
            effective_config: BTreeMap::new(),
        }
    }

    /// Attach effective configuration with source attribution.
    #[must_use]
    pub fn with_effective_config(mut self, config: BTreeMap<String, (String, ConfigSource)>) -> Self {
        self.effective_config = config
            .into_iter()
            .map(|(key, (value, source))| {
                let value = if let Ok(n) = value.parse::<i64>() {
                    Value::Number(n.into())
                } else if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
                    Value::Bool(value.eq_ignore_ascii_case("true"))
                } else {
                    Value::String(value)
                };
                (key, ConfigValue { value, source })
            })
            .collect();
        self
    }

    /// Emit as canonical JSON using JCS (RFC 8785).
    pub fn to_json(&self) -> Result<String> {
        emit_jcs(self).context("Failed to emit status JSON")
    }

    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let phase = self.current_phase.map_or("not started", |p| p.as_str());
        let _ = writeln!(out, "Run: {}", self.run_id);
        let _ = writeln!(out, "Phase: {phase}");
        if let Some(stable) = self.last_stable_phase {
            let _ = writeln!(out, "Last stable phase: {stable}");
        }
        let _ = writeln!(
            out,
            "Contract revision: {} ({} revision(s))",
            self.contract_revision.as_deref().unwrap_or("none"),
            self.revision_count
        );
        let _ = writeln!(out, "Regenerations: {}", self.regeneration_count);

        out.push_str("Documents:\n");
        for (key, present) in &self.documents {
            let mark = if *present { "✓" } else { "-" };
            let _ = writeln!(out, "  {mark} {key}");
        }

        for (label, report) in [
            ("Backend validation", &self.backend_validation),
            ("Frontend validation", &self.frontend_validation),
        ] {
            if let Some(report) = report {
                let _ = writeln!(
                    out,
                    "{label}: {} ({} error(s), {} warning(s))",
                    report.status(),
                    report.error_count(),
                    report.warnings().count()
                );
            }
        }

        let tracked: Vec<(&Phase, &ArtifactSummary)> = self.artifacts.iter().collect();
        if !tracked.is_empty() {
            out.push_str("Artifacts:\n");
            for (phase, summary) in tracked {
                let _ = writeln!(out, "  {phase}: {} file(s)", summary.file_count);
            }
        }

        let _ = writeln!(
            out,
            "Audit log: {} entr{}",
            self.audit_entries,
            if self.audit_entries == 1 { "y" } else { "ies" }
        );
        if let Some(err) = &self.last_error {
            let _ = writeln!(
                out,
                "Last error: [{}] in {}: {}",
                err.error_kind, err.phase, err.message
            );
        }
        out
    }
}

//! Artifact metadata aggregation.
//!
//! Purely observational: nothing here reads artifact contents or feeds back
//! into phase transitions.

use contractflow_contract::{ArtifactRef, Complexity};
use contractflow_utils::types::Phase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub file_count: usize,
    /// Sorted, deduplicated
    pub names: Vec<String>,
    pub complexity: BTreeMap<Complexity, usize>,
    /// Counts per artifact `type`; untyped artifacts count under `""`
    pub by_type: BTreeMap<String, usize>,
}

impl ArtifactSummary {
    /// Aggregate declared artifact references.
    #[must_use]
    pub fn from_refs(refs: &[ArtifactRef]) -> Self {
        let mut summary = Self::default();
        for artifact in refs {
            *summary.complexity.entry(artifact.complexity).or_default() += 1;
            *summary.by_type.entry(artifact.kind.clone()).or_default() += 1;
        }
        summary.set_names(refs.iter().map(|a| a.filename.clone()).collect());
        summary
    }

    fn set_names(&mut self, mut names: Vec<String>) {
        names.sort();
        names.dedup();
        self.file_count = names.len();
        self.names = names;
    }
}

/// Per-phase artifact summaries for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactTracker {
    phases: BTreeMap<Phase, ArtifactSummary>,
}

impl ArtifactTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record what `phase` declared. Replaces that phase's previous summary,
    /// since implementation reports are recreated on every pass.
    pub fn record(&mut self, phase: Phase, refs: &[ArtifactRef]) -> ArtifactSummary {
        let summary = ArtifactSummary::from_refs(refs);
        self.phases.insert(phase, summary.clone());
        summary
    }

    /// Record declared references with the file list the persistence
    /// collaborator returned. Names and counts follow `files`.
    pub fn record_persisted(
        &mut self,
        phase: Phase,
        refs: &[ArtifactRef],
        files: Vec<String>,
    ) -> ArtifactSummary {
        let mut summary = ArtifactSummary::from_refs(refs);
        summary.set_names(files);
        self.phases.insert(phase, summary.clone());
        summary
    }

    #[must_use]
    pub fn get(&self, phase: Phase) -> Option<&ArtifactSummary> {
        self.phases.get(&phase)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Phase, &ArtifactSummary)> {
        self.phases.iter()
    }

    #[must_use]
    pub fn total_files(&self) -> usize {
        self.phases.values().map(|s| s.file_count).sum()
    }
}

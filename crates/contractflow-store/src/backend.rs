//! Storage backends for run documents.

use camino::Utf8PathBuf;
use contractflow_utils::atomic_write::write_file_atomic;
use contractflow_utils::canonical::emit_jcs;
use contractflow_utils::error::StoreError;
use contractflow_utils::paths;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::document::RunDocument;

/// Where run documents live between coordinator invocations.
///
/// Implementations must round-trip a [`RunDocument`] losslessly.
pub trait DocumentBackend: Send + Sync {
    fn load(&self, run_id: &str) -> Result<Option<RunDocument>, StoreError>;
    fn save(&self, document: &RunDocument) -> Result<(), StoreError>;
}

/// Process-local backend. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    documents: Arc<Mutex<HashMap<String, RunDocument>>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentBackend for MemoryBackend {
    fn load(&self, run_id: &str) -> Result<Option<RunDocument>, StoreError> {
        let documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(documents.get(run_id).cloned())
    }

    fn save(&self, document: &RunDocument) -> Result<(), StoreError> {
        let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        documents.insert(document.run_id.clone(), document.clone());
        Ok(())
    }
}

/// `<home>/runs/<run_id>/run.json`, written atomically as canonical JSON.
#[derive(Debug, Clone, Default)]
pub struct FileBackend {
    /// Overrides the state-home layout when set.
    root: Option<Utf8PathBuf>,
}

impl FileBackend {
    /// Use the state home (`CONTRACTFLOW_HOME`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep run documents under `root/<run_id>.json` instead.
    #[must_use]
    pub fn with_root(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn path_for(&self, run_id: &str) -> Result<Utf8PathBuf, StoreError> {
        match &self.root {
            Some(root) => {
                paths::validate_run_id(run_id).map_err(backend_error)?;
                Ok(root.join(format!("{run_id}.json")))
            }
            None => paths::run_document_path(run_id).map_err(backend_error),
        }
    }
}

fn backend_error(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend {
        reason: e.to_string(),
    }
}

impl DocumentBackend for FileBackend {
    fn load(&self, run_id: &str) -> Result<Option<RunDocument>, StoreError> {
        let path = self.path_for(run_id)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(backend_error(format!("failed to read {path}: {e}"))),
        };
        let mut document = RunDocument::from_json(&content)?;
        if document.run_id.is_empty() {
            document.run_id = run_id.to_string();
        }
        Ok(Some(document))
    }

    fn save(&self, document: &RunDocument) -> Result<(), StoreError> {
        let path = self.path_for(&document.run_id)?;
        let json = emit_jcs(&document.to_value()?).map_err(backend_error)?;
        let result = write_file_atomic(&path, &json).map_err(|e| backend_error(format!("{e:#}")))?;
        for warning in result.warnings {
            tracing::warn!(path = %path, "{warning}");
        }
        tracing::debug!(path = %path, "run document saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractflow_utils::paths::with_isolated_home;
    use contractflow_utils::types::DocKey;
    use serde_json::json;

    fn sample() -> RunDocument {
        let mut doc = RunDocument::new("run-1");
        doc.documents
            .insert(DocKey::UserRequest, json!("build a todo app"));
        doc.extra.insert("owner".to_string(), json!("platform"));
        doc
    }

    #[test]
    fn test_memory_backend_round_trip() {
        let backend = MemoryBackend::new();
        assert!(backend.load("run-1").unwrap().is_none());
        backend.save(&sample()).unwrap();
        let shared = backend.clone();
        assert_eq!(shared.load("run-1").unwrap(), Some(sample()));
    }

    #[test]
    fn test_file_backend_round_trip() {
        let _home = with_isolated_home();
        let backend = FileBackend::new();
        backend.save(&sample()).unwrap();

        let path = backend.path_for("run-1").unwrap();
        assert!(path.ends_with("runs/run-1/run.json"));
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(on_disk.starts_with("{\"archived_states\":[]"), "{on_disk}");

        assert_eq!(backend.load("run-1").unwrap(), Some(sample()));
        assert!(backend.load("run-2").unwrap().is_none());
    }

    #[test]
    fn test_file_backend_with_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().join("store")).unwrap();
        let backend = FileBackend::with_root(root.clone());
        backend.save(&sample()).unwrap();
        assert!(root.join("run-1.json").exists());
        assert!(backend.path_for("../x").is_err());
    }
}

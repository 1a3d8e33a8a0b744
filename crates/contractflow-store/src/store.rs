//! Permissioned access to the run document.
//!
//! Stages are registered with explicit input and output key sets and every
//! read or commit is checked against them. A commit either applies every
//! write of a stage invocation or none of them: permissions are checked for
//! the whole batch first, the result is persisted through the backend, and
//! only then becomes visible. Commits are serialized by a single mutex.
//!
//! Reserved keys (`workflow_state`, `api_spec_history`) can only be written
//! through the `coordinator_*` methods.

use contractflow_utils::error::StoreError;
use contractflow_utils::types::{DocKey, Phase};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::audit::{AuditEntry, AuditEvent};
use crate::backend::{DocumentBackend, MemoryBackend};
use crate::capability::{COORDINATOR, StageCapabilities};
use crate::document::{RunDocument, is_empty};

struct Inner {
    document: RunDocument,
    capabilities: BTreeMap<String, StageCapabilities>,
}

/// The shared state store for one run.
pub struct SharedStateStore {
    inner: Mutex<Inner>,
    backend: Box<dyn DocumentBackend>,
}

impl std::fmt::Debug for SharedStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("SharedStateStore")
            .field("run_id", &inner.document.run_id)
            .field("stages", &inner.capabilities.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl SharedStateStore {
    pub fn new(document: RunDocument, backend: Box<dyn DocumentBackend>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                document,
                capabilities: BTreeMap::new(),
            }),
            backend,
        }
    }

    /// Store backed by process memory only.
    pub fn in_memory(run_id: impl Into<String>) -> Self {
        Self::new(RunDocument::new(run_id), Box::new(MemoryBackend::new()))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn run_id(&self) -> String {
        self.lock().document.run_id.clone()
    }

    pub fn register(&self, capabilities: StageCapabilities) -> Result<(), StoreError> {
        capabilities.check()?;
        let mut inner = self.lock();
        if inner.capabilities.contains_key(&capabilities.name) {
            return Err(StoreError::DuplicateCaller {
                caller: capabilities.name,
            });
        }
        tracing::debug!(
            stage = %capabilities.name,
            phase = %capabilities.phase,
            inputs = ?capabilities.input_keys,
            outputs = ?capabilities.output_keys,
            "stage registered"
        );
        inner
            .capabilities
            .insert(capabilities.name.clone(), capabilities);
        Ok(())
    }

    pub fn capabilities(&self, caller: &str) -> Option<StageCapabilities> {
        self.lock().capabilities.get(caller).cloned()
    }

    /// Read `key` on behalf of `caller`.
    ///
    /// Fails closed: an undeclared key is a permission error, and a declared
    /// key that is absent or empty is a missing dependency.
    pub fn read(&self, caller: &str, key: DocKey) -> Result<Value, StoreError> {
        let inner = self.lock();
        Self::read_locked(&inner, caller, key)
    }

    /// Read every declared input of `caller` in one consistent snapshot.
    pub fn read_inputs(&self, caller: &str) -> Result<BTreeMap<DocKey, Value>, StoreError> {
        let inner = self.lock();
        let caps = Self::caller(&inner, caller)?;
        caps.input_keys
            .iter()
            .map(|key| Self::read_locked(&inner, caller, *key).map(|v| (*key, v)))
            .collect()
    }

    fn caller<'a>(inner: &'a Inner, caller: &str) -> Result<&'a StageCapabilities, StoreError> {
        inner
            .capabilities
            .get(caller)
            .ok_or_else(|| StoreError::UnknownCaller {
                caller: caller.to_string(),
            })
    }

    fn read_locked(inner: &Inner, caller: &str, key: DocKey) -> Result<Value, StoreError> {
        let caps = Self::caller(inner, caller)?;
        if !caps.can_read(key) {
            return Err(StoreError::ReadDenied {
                caller: caller.to_string(),
                key: key.to_string(),
            });
        }
        match inner.document.get(key) {
            Some(value) if !is_empty(value) => Ok(value.clone()),
            _ => Err(StoreError::MissingDependency {
                caller: caller.to_string(),
                key: key.to_string(),
            }),
        }
    }

    /// Single-key write; see [`commit`](Self::commit).
    pub fn write(&self, caller: &str, key: DocKey, value: Value) -> Result<(), StoreError> {
        self.commit(caller, BTreeMap::from([(key, value)]))
    }

    /// Apply every write of one stage invocation, or none.
    pub fn commit(&self, caller: &str, writes: BTreeMap<DocKey, Value>) -> Result<(), StoreError> {
        self.commit_with(caller, writes, CoordinatorChange::default())
    }

    /// Like [`commit`](Self::commit), with coordinator-side mutations that
    /// belong to the same invocation persisted in the same save.
    ///
    /// The stage's writes are permission-checked as usual; `change` is
    /// applied after them under the stage's phase.
    pub fn commit_with(
        &self,
        caller: &str,
        writes: BTreeMap<DocKey, Value>,
        change: CoordinatorChange,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let caps = Self::caller(&inner, caller)?.clone();
        if let Some(key) = writes.keys().find(|k| !caps.can_write(**k)) {
            tracing::warn!(stage = caller, key = %key, "write rejected");
            return Err(StoreError::WriteDenied {
                caller: caller.to_string(),
                key: key.to_string(),
            });
        }

        let mut next = inner.document.clone();
        for (key, value) in writes {
            next.audit_log.push(AuditEntry::now(
                caps.phase,
                AuditEvent::Write {
                    key: key.to_string(),
                    stage: caps.name.clone(),
                },
            ));
            next.documents.insert(key, value);
        }
        apply_change(&mut next, caps.phase, change);
        self.backend.save(&next)?;
        inner.document = next;
        Ok(())
    }

    /// Unpermissioned read for the coordinator.
    pub fn get(&self, key: DocKey) -> Option<Value> {
        self.lock().document.get(key).cloned()
    }

    /// Coordinator-privileged batch: writes (any key, reserved included),
    /// clears and audit events, persisted together.
    pub fn coordinator_commit(&self, phase: Phase, change: CoordinatorChange) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let mut next = inner.document.clone();
        apply_change(&mut next, phase, change);
        self.backend.save(&next)?;
        inner.document = next;
        Ok(())
    }

    pub fn coordinator_write(&self, phase: Phase, key: DocKey, value: Value) -> Result<(), StoreError> {
        self.coordinator_commit(phase, CoordinatorChange::default().write(key, value))
    }

    /// Append audit events without touching documents.
    pub fn record(&self, phase: Phase, events: impl IntoIterator<Item = AuditEvent>) -> Result<(), StoreError> {
        let change = CoordinatorChange {
            events: events.into_iter().collect(),
            ..CoordinatorChange::default()
        };
        self.coordinator_commit(phase, change)
    }

    pub fn snapshot(&self) -> RunDocument {
        self.lock().document.clone()
    }

    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.lock().document.audit_log.clone()
    }
}

fn apply_change(next: &mut RunDocument, phase: Phase, change: CoordinatorChange) {
    for key in change.clear {
        if next.documents.remove(&key).is_some() {
            next.audit_log.push(AuditEntry::now(
                phase,
                AuditEvent::Cleared {
                    key: key.to_string(),
                },
            ));
        }
    }
    for (key, value) in change.writes {
        if !key.is_reserved() {
            next.audit_log.push(AuditEntry::now(
                phase,
                AuditEvent::Write {
                    key: key.to_string(),
                    stage: COORDINATOR.to_string(),
                },
            ));
        }
        next.documents.insert(key, value);
    }
    next.archived_states.extend(change.archive);
    next.audit_log
        .extend(change.events.into_iter().map(|e| AuditEntry::now(phase, e)));
}

/// A batch of coordinator-side mutations.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorChange {
    pub writes: BTreeMap<DocKey, Value>,
    pub clear: Vec<DocKey>,
    pub events: Vec<AuditEvent>,
    /// Workflow states to move into `archived_states`.
    pub archive: Vec<Value>,
}

impl CoordinatorChange {
    #[must_use]
    pub fn write(mut self, key: DocKey, value: Value) -> Self {
        self.writes.insert(key, value);
        self
    }

    #[must_use]
    pub fn clear(mut self, keys: impl IntoIterator<Item = DocKey>) -> Self {
        self.clear.extend(keys);
        self
    }

    #[must_use]
    pub fn event(mut self, event: AuditEvent) -> Self {
        self.events.push(event);
        self
    }

    #[must_use]
    pub fn archive(mut self, state: Value) -> Self {
        self.archive.push(state);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractflow_utils::types::ErrorKind;
    use proptest::prelude::*;
    use serde_json::json;
    use strum::IntoEnumIterator;

    fn store() -> SharedStateStore {
        let store = SharedStateStore::in_memory("run-1");
        store
            .register(StageCapabilities::new(
                "planner",
                Phase::Planning,
                [DocKey::UserRequest],
                [DocKey::ProjectPlan],
            ))
            .unwrap();
        store
            .register(StageCapabilities::new(
                "backend",
                Phase::BackendGeneration,
                [DocKey::ProjectPlan, DocKey::ApiSpec],
                [DocKey::BackendReport],
            ))
            .unwrap();
        store
            .coordinator_write(Phase::Init, DocKey::UserRequest, json!("todo app"))
            .unwrap();
        store
    }

    #[test]
    fn test_read_requires_declaration() {
        let store = store();
        assert_eq!(store.read("planner", DocKey::UserRequest).unwrap(), json!("todo app"));
        let err = store.read("planner", DocKey::ApiSpec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionError);
        let err = store.read("nobody", DocKey::UserRequest).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionError);
    }

    #[test]
    fn test_missing_or_empty_input_fails_closed() {
        let store = store();
        let err = store.read_inputs("backend").unwrap_err();
        assert_eq!(
            err,
            StoreError::MissingDependency {
                caller: "backend".into(),
                key: "project_plan".into()
            }
        );
        store
            .write("planner", DocKey::ProjectPlan, json!({}))
            .unwrap();
        assert_eq!(
            store.read("backend", DocKey::ProjectPlan).unwrap_err().kind(),
            ErrorKind::MissingDependencyError
        );
    }

    #[test]
    fn test_commit_is_all_or_nothing() {
        let store = store();
        let before = store.snapshot();
        let writes = BTreeMap::from([
            (DocKey::ProjectPlan, json!({"project_name": "todo"})),
            (DocKey::ApiSpec, json!({"openapi_spec": {}})),
        ]);
        let err = store.commit("planner", writes).unwrap_err();
        assert!(matches!(err, StoreError::WriteDenied { ref key, .. } if key == "api_spec"));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_commit_appends_audit_entries() {
        let store = store();
        store
            .write("planner", DocKey::ProjectPlan, json!({"project_name": "todo"}))
            .unwrap();
        let log = store.audit_log();
        let last = log.last().unwrap();
        assert_eq!(last.phase, Phase::Planning);
        assert_eq!(
            last.event,
            AuditEvent::Write {
                key: "project_plan".into(),
                stage: "planner".into()
            }
        );
    }

    #[test]
    fn test_registration_rules() {
        let store = store();
        let dup = StageCapabilities::new("planner", Phase::Planning, [DocKey::UserRequest], [DocKey::ProjectPlan]);
        assert!(matches!(store.register(dup), Err(StoreError::DuplicateCaller { .. })));
        let reserved = StageCapabilities::new(
            "sneaky",
            Phase::SpecGeneration,
            [DocKey::ProjectPlan],
            [DocKey::ApiSpec, DocKey::ApiSpecHistory],
        );
        assert!(matches!(store.register(reserved), Err(StoreError::ReservedKey { .. })));
    }

    #[test]
    fn test_coordinator_clear_and_archive() {
        let store = store();
        store
            .write("planner", DocKey::ProjectPlan, json!({"project_name": "todo"}))
            .unwrap();
        let change = CoordinatorChange::default()
            .clear([DocKey::ProjectPlan, DocKey::BackendReport])
            .archive(json!({"current_phase": "FAILED"}))
            .write(DocKey::WorkflowState, json!({"current_phase": "PLANNING"}));
        store.coordinator_commit(Phase::Validation, change).unwrap();

        let doc = store.snapshot();
        assert!(!doc.has(DocKey::ProjectPlan));
        assert_eq!(doc.archived_states.len(), 1);
        let cleared: Vec<_> = doc
            .audit_log
            .iter()
            .filter(|e| matches!(e.event, AuditEvent::Cleared { .. }))
            .collect();
        assert_eq!(cleared.len(), 1);
    }

    #[test]
    fn test_backend_failure_leaves_state_untouched() {
        struct FailingBackend;
        impl DocumentBackend for FailingBackend {
            fn load(&self, _: &str) -> Result<Option<RunDocument>, StoreError> {
                Ok(None)
            }
            fn save(&self, _: &RunDocument) -> Result<(), StoreError> {
                Err(StoreError::Backend {
                    reason: "disk full".into(),
                })
            }
        }

        let store = SharedStateStore::new(RunDocument::new("r"), Box::new(FailingBackend));
        store
            .register(StageCapabilities::new("planner", Phase::Planning, [DocKey::UserRequest], [DocKey::ProjectPlan]))
            .unwrap();
        let err = store
            .write("planner", DocKey::ProjectPlan, json!({"project_name": "x"}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoError);
        assert!(store.snapshot().documents.is_empty());
        assert!(store.audit_log().is_empty());
    }

    #[test]
    fn test_commit_with_persists_stage_and_coordinator_writes_together() {
        #[derive(Clone, Default)]
        struct CountingBackend {
            saves: std::sync::Arc<Mutex<Vec<RunDocument>>>,
        }
        impl DocumentBackend for CountingBackend {
            fn load(&self, _: &str) -> Result<Option<RunDocument>, StoreError> {
                Ok(None)
            }
            fn save(&self, document: &RunDocument) -> Result<(), StoreError> {
                self.saves
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(document.clone());
                Ok(())
            }
        }

        let backend = CountingBackend::default();
        let store = SharedStateStore::new(RunDocument::new("r"), Box::new(backend.clone()));
        store
            .register(StageCapabilities::new(
                "spec",
                Phase::SpecGeneration,
                [DocKey::ProjectPlan],
                [DocKey::ApiSpec],
            ))
            .unwrap();

        let history = CoordinatorChange::default()
            .write(DocKey::ApiSpecHistory, json!([{"revision": "1.0.0"}]))
            .event(AuditEvent::Revision {
                previous: None,
                revision: "1.0.0".into(),
                change: "initial".into(),
            });
        store
            .commit_with(
                "spec",
                BTreeMap::from([(DocKey::ApiSpec, json!({"revision": "1.0.0", "openapi_spec": {}}))]),
                history,
            )
            .unwrap();

        let saves = backend.saves.lock().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(saves.len(), 1);
        assert!(saves[0].has(DocKey::ApiSpec));
        assert!(saves[0].has(DocKey::ApiSpecHistory));
        assert!(saves[0].audit_log.iter().all(|e| e.phase == Phase::SpecGeneration));
    }

    #[test]
    fn test_commit_with_denied_write_skips_coordinator_change() {
        let store = store();
        let before = store.snapshot();
        let change = CoordinatorChange::default().write(DocKey::ApiSpecHistory, json!([]));
        let err = store
            .commit_with(
                "planner",
                BTreeMap::from([(DocKey::ApiSpec, json!({"openapi_spec": {}}))]),
                change,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionError);
        assert_eq!(store.snapshot(), before);
    }

    fn any_key() -> impl Strategy<Value = DocKey> {
        (0..DocKey::iter().count()).prop_map(|i| DocKey::iter().nth(i).unwrap_or(DocKey::UserRequest))
    }

    proptest! {
        #[test]
        fn prop_undeclared_writes_are_denied(key in any_key()) {
            let store = store();
            let result = store.write("planner", key, json!({"x": 1}));
            if key == DocKey::ProjectPlan {
                prop_assert!(result.is_ok());
            } else {
                prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::PermissionError);
            }
        }
    }
}

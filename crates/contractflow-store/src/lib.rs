//! Capability-tagged shared state for contractflow runs.
//!
//! The run document is the only shared mutable resource a coordinator
//! touches. [`SharedStateStore`] wraps it with per-stage read/write
//! permissions, all-or-nothing commits and an append-only audit log, and
//! persists it through a pluggable [`DocumentBackend`].

pub mod audit;
pub mod backend;
pub mod capability;
pub mod document;
pub mod store;

pub use audit::{AuditEntry, AuditEvent};
pub use backend::{DocumentBackend, FileBackend, MemoryBackend};
pub use capability::{COORDINATOR, StageCapabilities};
pub use document::{RunDocument, is_empty};
pub use store::{CoordinatorChange, SharedStateStore};

//! contractflow - Contract-first coordinator for multi-stage generation runs
//!
//! contractflow turns a free-text request into a project plan, a versioned API
//! contract and backend and frontend implementations, by driving external
//! stages through a strict finite-state machine. Every stage only sees and
//! writes the documents it is registered for, every output passes a JSON gate
//! before it is committed, and implementation reports are checked against the
//! contract with bounded regeneration on drift.
//!
//! contractflow can be used in two ways:
//! - **CLI**: run configured command stages from `.contractflow/config.toml`
//! - **Library**: inject your own [`StageAdapter`] implementations
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! # Start a run; the request is read from stdin when --request is absent
//! echo "A todo app with users" | contractflow run todo-app
//!
//! # Inspect a persisted run
//! contractflow status todo-app --json
//!
//! # Continue a failed run from its last stable phase
//! contractflow resume todo-app
//!
//! # Check a report against a contract without running anything
//! contractflow validate --contract api_spec.json --report backend.json --kind backend
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use contractflow::{Coordinator, RunSettings, StageTable};
//!
//! # async fn demo(stages: StageTable) -> Result<(), contractflow::FlowError> {
//! let coordinator = Coordinator::new(stages, RunSettings::default())?;
//! let outcome = coordinator.run("todo-app", "A todo app with users", None).await?;
//! match outcome.failure() {
//!     Some(error) => eprintln!("{}: {}", error.error_kind, error.message),
//!     None => println!("revision {:?}", outcome.contract.as_ref().and_then(|c| c.revision.as_deref())),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # JSON Contracts
//!
//! Persisted run documents and `status --json` output are emitted in JCS
//! (RFC 8785) canonical form. Use [`emit_jcs`] for your own integrations.

// ============================================================================
// Stable Public API
// ============================================================================

/// Coordinator facade: run, resume and amend runs.
pub use contractflow_orchestrator::{Coordinator, RunOutcome, Storage};

/// Execution knobs and the cancel handle for in-flight runs.
pub use contractflow_orchestrator::{CancelHandle, RunSettings};

/// Persisted workflow state.
pub use contractflow_orchestrator::{ErrorRecord, PhaseTransition, WorkflowState};

/// Stage interface and the injectable stage table.
pub use contractflow_stage_api::{
    ArtifactSink, StageAdapter, StageFailure, StageInputs, StageOutput, StageTable,
};

/// Hierarchical configuration: CLI > environment > config file > defaults.
pub use contractflow_config::{CliArgs, Config, ConfigBuilder};

/// Library-level error type, its stable classification and CLI exit codes.
pub use contractflow_utils::error::FlowError;
pub use contractflow_utils::exit_codes::ExitCode;
pub use contractflow_utils::types::{DocKey, ErrorKind, Phase};

/// Pure contract revision arithmetic.
pub use contractflow_revision::{ChangeKind, Revision, increment};

/// Contract-driven compliance checks.
pub use contractflow_validation::ContractValidator;

/// JCS (RFC 8785) canonical JSON emission.
pub use contractflow_utils::canonical::emit_jcs;

/// Error categories and user-facing reporting.
pub use contractflow_utils::error::{ErrorCategory, UserFriendlyError};

// ============================================================================
// Internal modules - accessible but not stable
// ============================================================================

#[doc(hidden)]
pub use contractflow_utils::{atomic_write, canonical, error, exit_codes, logging, paths, types};

#[doc(hidden)]
pub use contractflow_config as config;
#[doc(hidden)]
pub use contractflow_contract as contract;
#[doc(hidden)]
pub use contractflow_orchestrator as orchestrator;
#[doc(hidden)]
pub use contractflow_stages as stages;
#[doc(hidden)]
pub use contractflow_status as status;
#[doc(hidden)]
pub use contractflow_store as store;
#[doc(hidden)]
pub use contractflow_validation as validation;

/// Returns the contractflow version
#[must_use]
pub fn contractflow_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

// CLI module - internal implementation detail, not part of stable public API
#[doc(hidden)]
pub mod cli;

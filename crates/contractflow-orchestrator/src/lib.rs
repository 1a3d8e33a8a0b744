//! Coordinator for contract-first generation runs
//!
//! This crate wires the stage table, the shared state store and the contract
//! validator into one finite-state machine that runs a request through
//! planning, contract generation, backend and frontend generation and
//! contract compliance checks.
//!
//! # Architecture
//!
//! - **Coordinator**: Stable facade for callers (CLI, embedding hosts)
//! - **WorkflowStateMachine**: Phase loop, forward and regeneration edges
//! - **RunSettings**: Timeouts and bounds resolved from configuration
//! - **RunOutcome**: Final state, contract and reports of a run
//!
//! # Module Organization
//!
//! - `handle.rs`: Coordinator facade, resume and contract amendment
//! - `machine.rs`: Multi-phase execution and edge decisions
//! - `phase_exec.rs`: Single stage invocation with timeout, cancel and retry
//! - `transitions.rs`: The transition table
//! - `state.rs`: Persisted workflow state
//!
//! # Integration Rule
//!
//! **Outside this crate, use `Coordinator`.** The state machine is only
//! constructed by the coordinator, which owns locking and store setup.
//!
//! ## Example
//!
//! ```rust,no_run
//! use contractflow_orchestrator::{Coordinator, RunSettings};
//! use contractflow_stage_api::StageTable;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stages = StageTable::new(); // populate with one stage per phase
//!     let coordinator = Coordinator::new(stages, RunSettings::default())?;
//!
//!     let outcome = coordinator.run("todo-app", "A todo list with users", None).await?;
//!     println!("{}: {}", outcome.run_id, outcome.state.current_phase);
//!     Ok(())
//! }
//! ```

mod cancel;
mod handle;
mod machine;
mod phase_exec;
mod settings;
mod state;
mod transitions;

pub use self::cancel::CancelHandle;
pub use self::handle::{Coordinator, RunOutcome, Storage};
pub use self::machine::WorkflowStateMachine;
pub use self::settings::RunSettings;
pub use self::state::{ErrorRecord, PhaseTransition, WorkflowState};
pub use self::transitions::{check_transition, edge_kind, predecessor};

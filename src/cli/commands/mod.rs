//! CLI command implementations (facade).
//!
//! This module re-exports the stable command surface used by `run.rs` and CLI tests.
//! Implementations live in `commands/*`.

// Allow unused imports for public API surface - these are intentionally exported
// for external use and tests, even if not used within the CLI module itself.
#![allow(unused_imports)]

mod common;
mod execute;
mod json_emit;
mod revision;
mod status;
mod validate;

// Re-export command handlers
pub use execute::{execute_resume_command, execute_run_command};
pub use revision::execute_revision_command;
pub use status::execute_status_command;
pub use validate::execute_validate_command;

// Re-export common helpers
pub use common::{build_coordinator, build_stage_table, read_request};

// Re-export JSON emit functions
pub use json_emit::{OutcomeJson, emit_outcome_json, emit_validation_json};

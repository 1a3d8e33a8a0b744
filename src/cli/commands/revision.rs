//! Revision command implementation
//!
//! Handles `contractflow revision <current> <change>`.

use anyhow::Result;

use crate::{ChangeKind, ExitCode, FlowError, increment};

/// Print the revision that follows `current` for `change`.
pub fn execute_revision_command(current: &str, change: ChangeKind) -> Result<ExitCode> {
    let next = increment(current, change).map_err(FlowError::from)?;
    println!("{next}");
    Ok(ExitCode::SUCCESS)
}

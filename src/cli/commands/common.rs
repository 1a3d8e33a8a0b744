//! Common helper functions used across CLI commands
//!
//! This module builds the stage table and coordinator from configuration and
//! reads the request text for `run`.

use anyhow::{Context, Result};
use std::io::Read;
use std::sync::Arc;

use contractflow_stages::CommandStage;
use contractflow_store::FileBackend;

use crate::{Config, Coordinator, StageTable, Storage};

/// One [`CommandStage`] per configured `[stages.<role>]` section.
///
/// The stage is named after its role, so permissions and audit entries read
/// `planner`, `spec`, `backend`, `frontend` and `validator`.
pub fn build_stage_table(config: &Config) -> Result<StageTable> {
    let mut table = StageTable::new();
    for (role, stage_config) in &config.stages {
        let mut stage = CommandStage::new(role.to_string(), role.phase(), stage_config.command.clone())
            .args(stage_config.args.iter().cloned());
        for (key, value) in &stage_config.env {
            stage = stage.env(key.clone(), value.clone());
        }
        if let Some(cwd) = &stage_config.cwd {
            stage = stage.cwd(cwd.clone().into_std_path_buf());
        }
        table
            .insert(Arc::new(stage))
            .map_err(crate::FlowError::from)
            .with_context(|| format!("Failed to register stage '{role}'"))?;
    }
    Ok(table)
}

/// Coordinator over file storage under the state home.
pub fn build_coordinator(config: &Config, force: bool) -> Result<Coordinator> {
    let table = build_stage_table(config)?;
    let coordinator = Coordinator::from_config(table, config)?
        .with_storage(Storage::File(FileBackend::new()))
        .with_force_lock(force);
    Ok(coordinator)
}

/// `--request` when given, otherwise all of stdin.
pub fn read_request(request: Option<String>) -> Result<String> {
    let text = match request {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read request from stdin")?;
            buffer
        }
    };
    let text = text.trim().to_string();
    if text.is_empty() {
        anyhow::bail!("Request is empty; pass --request or pipe the request on stdin");
    }
    Ok(text)
}

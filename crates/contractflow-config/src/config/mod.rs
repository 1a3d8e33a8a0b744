//! Configuration management for contractflow
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > `CONTRACTFLOW_*` environment > `.contractflow/config.toml` > defaults.

mod builder;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use contractflow_utils::types::ConfigSource;
pub use model::*;

use contractflow_validation::SchemaDiff;
use std::path::PathBuf;

/// Prefix of environment overrides (`CONTRACTFLOW_PHASE_TIMEOUT_SECS`, ...)
pub const ENV_PREFIX: &str = "CONTRACTFLOW_";

/// Keys that always carry a source attribution.
pub(crate) const ATTRIBUTED_KEYS: &[&str] = &[
    "phase_timeout_secs",
    "max_regenerations",
    "output_retries",
    "lock_ttl_seconds",
    "verbose",
    "extra_coverage_level",
    "schema_diff",
];

/// Overrides taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Explicit config file; disables upward discovery
    pub config_path: Option<PathBuf>,
    pub phase_timeout_secs: Option<u64>,
    pub max_regenerations: Option<u32>,
    pub output_retries: Option<u32>,
    pub lock_ttl_seconds: Option<u64>,
    pub verbose: Option<bool>,
    pub schema_diff: Option<SchemaDiff>,
}

//! Configuration model, discovery, and validation for contractflow

pub mod config;

pub use config::{
    CliArgs, Config, ConfigBuilder, ConfigSource, DEFAULT_MAX_REGENERATIONS, DEFAULT_OUTPUT_RETRIES,
    DEFAULT_PHASE_TIMEOUT_SECS, Defaults, ENV_PREFIX, StageCommandConfig, StageRole, ValidationConfig,
};

use camino::Utf8PathBuf;
use contractflow_contract::Level;
use contractflow_utils::types::{ConfigSource, Phase};
use contractflow_validation::SchemaDiff;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use strum::{Display, EnumIter, EnumString};

/// Default timeout for one stage invocation in seconds
pub const DEFAULT_PHASE_TIMEOUT_SECS: u64 = 30;
/// Default bound on backward edges per run
pub const DEFAULT_MAX_REGENERATIONS: u32 = 3;
/// Default retries after an `InvalidOutputFormat` rejection
pub const DEFAULT_OUTPUT_RETRIES: u32 = 1;

/// Named stage slots in `[stages.<role>]`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StageRole {
    Planner,
    Spec,
    Backend,
    Frontend,
    Validator,
}

impl StageRole {
    /// Phase this role's stage is registered for.
    #[must_use]
    pub const fn phase(self) -> Phase {
        match self {
            Self::Planner => Phase::Planning,
            Self::Spec => Phase::SpecGeneration,
            Self::Backend => Phase::BackendGeneration,
            Self::Frontend => Phase::FrontendGeneration,
            Self::Validator => Phase::Validation,
        }
    }
}

/// `[defaults]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    pub phase_timeout_secs: Option<u64>,
    pub max_regenerations: Option<u32>,
    pub output_retries: Option<u32>,
    pub lock_ttl_seconds: Option<u64>,
    pub verbose: Option<bool>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            phase_timeout_secs: Some(DEFAULT_PHASE_TIMEOUT_SECS),
            max_regenerations: Some(DEFAULT_MAX_REGENERATIONS),
            output_retries: Some(DEFAULT_OUTPUT_RETRIES),
            lock_ttl_seconds: Some(contractflow_utils::paths::DEFAULT_LOCK_TTL_SECS),
            verbose: Some(false),
        }
    }
}

/// External command backing one stage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StageCommandConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Working directory for the process
    pub cwd: Option<Utf8PathBuf>,
    /// Overrides `defaults.phase_timeout_secs` for this stage
    pub timeout_secs: Option<u64>,
}

impl StageCommandConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            timeout_secs: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// `[validation]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct ValidationConfig {
    /// Level for coverage the contract does not declare
    pub extra_coverage_level: Option<Level>,
    pub schema_diff: Option<SchemaDiff>,
}

/// Configuration for contractflow runs.
///
/// Precedence: CLI arguments > `CONTRACTFLOW_*` environment > config file >
/// built-in defaults. Every effective value records where it came from in
/// `source_attribution`.
///
/// Use [`Config::discover()`] for CLI-like behavior, or [`Config::builder()`]
/// for deterministic programmatic configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub defaults: Defaults,
    pub stages: BTreeMap<StageRole, StageCommandConfig>,
    pub validation: ValidationConfig,
    /// Config file that was loaded, if any
    pub config_path: Option<PathBuf>,
    pub source_attribution: BTreeMap<String, ConfigSource>,
}

impl Default for Config {
    fn default() -> Self {
        let mut source_attribution = BTreeMap::new();
        for key in super::ATTRIBUTED_KEYS {
            source_attribution.insert((*key).to_string(), ConfigSource::Default);
        }
        Self {
            defaults: Defaults::default(),
            stages: BTreeMap::new(),
            validation: ValidationConfig::default(),
            config_path: None,
            source_attribution,
        }
    }
}

impl Config {
    #[must_use]
    pub fn phase_timeout(&self) -> Duration {
        Duration::from_secs(self.defaults.phase_timeout_secs.unwrap_or(DEFAULT_PHASE_TIMEOUT_SECS))
    }

    /// Timeout for one role, honoring its `timeout_secs` override.
    #[must_use]
    pub fn timeout_for(&self, role: StageRole) -> Duration {
        self.stages
            .get(&role)
            .and_then(|s| s.timeout_secs)
            .map_or_else(|| self.phase_timeout(), Duration::from_secs)
    }

    #[must_use]
    pub fn max_regenerations(&self) -> u32 {
        self.defaults.max_regenerations.unwrap_or(DEFAULT_MAX_REGENERATIONS)
    }

    #[must_use]
    pub fn output_retries(&self) -> u32 {
        self.defaults.output_retries.unwrap_or(DEFAULT_OUTPUT_RETRIES)
    }

    #[must_use]
    pub fn lock_ttl_seconds(&self) -> u64 {
        self.defaults
            .lock_ttl_seconds
            .unwrap_or(contractflow_utils::paths::DEFAULT_LOCK_TTL_SECS)
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.defaults.verbose.unwrap_or(false)
    }

    #[must_use]
    pub fn extra_coverage_level(&self) -> Level {
        self.validation.extra_coverage_level.unwrap_or(Level::Warning)
    }

    #[must_use]
    pub fn schema_diff(&self) -> SchemaDiff {
        self.validation.schema_diff.unwrap_or_default()
    }

    #[must_use]
    pub fn stage(&self, role: StageRole) -> Option<&StageCommandConfig> {
        self.stages.get(&role)
    }
}

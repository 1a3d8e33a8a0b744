use contractflow_contract::Level;
use contractflow_utils::error::FlowError;
use contractflow_validation::SchemaDiff;
use std::collections::BTreeMap;
use std::time::Duration;

use super::{Config, ConfigSource, StageCommandConfig, StageRole};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when embedding contractflow without relying on environment
    /// variables or config files.
    ///
    /// # Example
    ///
    /// ```rust
    /// use contractflow_config::{Config, StageCommandConfig, StageRole};
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .phase_timeout(Duration::from_secs(120))
    ///     .max_regenerations(2)
    ///     .stage(StageRole::Planner, StageCommandConfig::new("./planner.sh"))
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.max_regenerations(), 2);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Fluent builder for [`Config`].
///
/// All values set via the builder are attributed to
/// `ConfigSource::Programmatic`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    phase_timeout: Option<Duration>,
    max_regenerations: Option<u32>,
    output_retries: Option<u32>,
    lock_ttl_seconds: Option<u64>,
    verbose: Option<bool>,
    extra_coverage_level: Option<Level>,
    schema_diff: Option<SchemaDiff>,
    stages: BTreeMap<StageRole, StageCommandConfig>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeout per stage invocation. Sub-second precision is dropped.
    #[must_use]
    pub fn phase_timeout(mut self, timeout: Duration) -> Self {
        self.phase_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn max_regenerations(mut self, limit: u32) -> Self {
        self.max_regenerations = Some(limit);
        self
    }

    #[must_use]
    pub fn output_retries(mut self, retries: u32) -> Self {
        self.output_retries = Some(retries);
        self
    }

    #[must_use]
    pub fn lock_ttl_seconds(mut self, seconds: u64) -> Self {
        self.lock_ttl_seconds = Some(seconds);
        self
    }

    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    #[must_use]
    pub fn extra_coverage_level(mut self, level: Level) -> Self {
        self.extra_coverage_level = Some(level);
        self
    }

    #[must_use]
    pub fn schema_diff(mut self, mode: SchemaDiff) -> Self {
        self.schema_diff = Some(mode);
        self
    }

    #[must_use]
    pub fn stage(mut self, role: StageRole, stage: StageCommandConfig) -> Self {
        self.stages.insert(role, stage);
        self
    }

    /// Build and validate.
    pub fn build(self) -> Result<Config, FlowError> {
        let mut config = Config::default();
        let src = ConfigSource::Programmatic;
        let attr = &mut config.source_attribution;

        if let Some(timeout) = self.phase_timeout {
            config.defaults.phase_timeout_secs = Some(timeout.as_secs());
            attr.insert("phase_timeout_secs".into(), src);
        }
        if let Some(v) = self.max_regenerations {
            config.defaults.max_regenerations = Some(v);
            attr.insert("max_regenerations".into(), src);
        }
        if let Some(v) = self.output_retries {
            config.defaults.output_retries = Some(v);
            attr.insert("output_retries".into(), src);
        }
        if let Some(v) = self.lock_ttl_seconds {
            config.defaults.lock_ttl_seconds = Some(v);
            attr.insert("lock_ttl_seconds".into(), src);
        }
        if let Some(v) = self.verbose {
            config.defaults.verbose = Some(v);
            attr.insert("verbose".into(), src);
        }
        if let Some(v) = self.extra_coverage_level {
            config.validation.extra_coverage_level = Some(v);
            attr.insert("extra_coverage_level".into(), src);
        }
        if let Some(v) = self.schema_diff {
            config.validation.schema_diff = Some(v);
            attr.insert("schema_diff".into(), src);
        }
        for (role, stage) in self.stages {
            attr.insert(format!("stages.{role}"), src);
            config.stages.insert(role, stage);
        }

        config.validate()?;
        Ok(config)
    }
}

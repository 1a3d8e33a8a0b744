use contractflow_config::Config;
use contractflow_contract::Level;
use contractflow_utils::types::Phase;
use contractflow_validation::{ContractValidator, SchemaDiff};
use std::collections::BTreeMap;
use std::time::Duration;

/// Execution knobs for one coordinator, resolved from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub phase_timeout: Duration,
    /// Per-phase overrides of `phase_timeout`
    pub stage_timeouts: BTreeMap<Phase, Duration>,
    pub max_regenerations: u32,
    pub output_retries: u32,
    pub lock_ttl_seconds: u64,
    pub extra_coverage_level: Level,
    pub schema_diff: SchemaDiff,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RunSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let stage_timeouts = config
            .stages
            .iter()
            .filter_map(|(role, stage)| {
                stage
                    .timeout_secs
                    .map(|secs| (role.phase(), Duration::from_secs(secs)))
            })
            .collect();
        Self {
            phase_timeout: config.phase_timeout(),
            stage_timeouts,
            max_regenerations: config.max_regenerations(),
            output_retries: config.output_retries(),
            lock_ttl_seconds: config.lock_ttl_seconds(),
            extra_coverage_level: config.extra_coverage_level(),
            schema_diff: config.schema_diff(),
        }
    }

    #[must_use]
    pub fn timeout_for(&self, phase: Phase) -> Duration {
        self.stage_timeouts
            .get(&phase)
            .copied()
            .unwrap_or(self.phase_timeout)
    }

    pub(crate) fn validator(&self) -> ContractValidator {
        ContractValidator::new()
            .with_undeclared_level(self.extra_coverage_level)
            .with_schema_diff(self.schema_diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractflow_config::{StageCommandConfig, StageRole};

    #[test]
    fn test_settings_from_config() {
        let mut backend = StageCommandConfig::new("gen");
        backend.timeout_secs = Some(120);
        let config = Config::builder()
            .max_regenerations(1)
            .stage(StageRole::Backend, backend)
            .build()
            .unwrap();
        let settings = RunSettings::from_config(&config);
        assert_eq!(settings.max_regenerations, 1);
        assert_eq!(settings.timeout_for(Phase::BackendGeneration), Duration::from_secs(120));
        assert_eq!(settings.timeout_for(Phase::Planning), Duration::from_secs(30));
    }
}

use std::collections::BTreeMap;

use super::{Config, ConfigSource};

impl Config {
    fn source_of(&self, key: &str) -> ConfigSource {
        self.source_attribution
            .get(key)
            .copied()
            .unwrap_or(ConfigSource::Default)
    }

    /// Effective configuration as key-value pairs with source attribution.
    ///
    /// Stage entries appear as `stages.<role>` with the command line as value.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, ConfigSource)> {
        let mut config = BTreeMap::new();
        let mut add = |key: &str, value: String| {
            config.insert(key.to_string(), (value, self.source_of(key)));
        };

        add("phase_timeout_secs", self.phase_timeout().as_secs().to_string());
        add("max_regenerations", self.max_regenerations().to_string());
        add("output_retries", self.output_retries().to_string());
        add("lock_ttl_seconds", self.lock_ttl_seconds().to_string());
        add("verbose", self.verbose().to_string());
        add("extra_coverage_level", self.extra_coverage_level().to_string());
        add("schema_diff", self.schema_diff().to_string());

        for (role, stage) in &self.stages {
            let mut line = stage.command.clone();
            for arg in &stage.args {
                line.push(' ');
                line.push_str(arg);
            }
            add(&format!("stages.{role}"), line);
        }
        config
    }
}

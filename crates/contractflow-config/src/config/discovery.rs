use contractflow_utils::error::{ConfigError, FlowError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::{
    CliArgs, Config, ConfigSource, Defaults, ENV_PREFIX, StageCommandConfig, StageRole, ValidationConfig,
};

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
struct TomlConfig {
    defaults: Option<Defaults>,
    #[serde(default)]
    stages: BTreeMap<StageRole, StageCommandConfig>,
    validation: Option<ValidationConfig>,
}

/// Set `$slot` from `$value` when present and attribute it to `$source`.
macro_rules! layer {
    ($attribution:expr, $slot:expr, $value:expr, $key:literal, $source:expr) => {
        if let Some(v) = $value {
            $slot = Some(v);
            $attribution.insert($key.to_string(), $source);
        }
    };
}

fn env_value<T: FromStr>(
    env: &dyn Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let name = format!("{ENV_PREFIX}{}", key.to_ascii_uppercase());
    match env(&name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| ConfigError::InvalidValue {
            key: name,
            value: raw,
        }),
    }
}

impl Config {
    /// Discover and load configuration with precedence: CLI > env > file > defaults
    ///
    /// Uses the current working directory for config file discovery when no
    /// explicit path is provided in `cli_args`.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, FlowError> {
        let start_dir = std::env::current_dir()?;
        Self::discover_from(&start_dir, cli_args, &|key| std::env::var(key).ok())
    }

    /// Discover configuration starting from a specific directory, reading
    /// environment values through `env`.
    ///
    /// This is the path-driven variant used by tests to avoid process-global state.
    pub fn discover_from(
        start_dir: &Path,
        cli_args: &CliArgs,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, FlowError> {
        let mut config = Self::default();
        let Self {
            defaults,
            stages,
            validation,
            config_path,
            source_attribution,
        } = &mut config;

        let path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    }
                    .into());
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir)?,
        };

        if let Some(path) = &path {
            let file = Self::load_config_file(path)?;
            let src = ConfigSource::Config;
            if let Some(d) = file.defaults {
                layer!(source_attribution, defaults.phase_timeout_secs, d.phase_timeout_secs, "phase_timeout_secs", src);
                layer!(source_attribution, defaults.max_regenerations, d.max_regenerations, "max_regenerations", src);
                layer!(source_attribution, defaults.output_retries, d.output_retries, "output_retries", src);
                layer!(source_attribution, defaults.lock_ttl_seconds, d.lock_ttl_seconds, "lock_ttl_seconds", src);
                layer!(source_attribution, defaults.verbose, d.verbose, "verbose", src);
            }
            if let Some(v) = file.validation {
                layer!(source_attribution, validation.extra_coverage_level, v.extra_coverage_level, "extra_coverage_level", src);
                layer!(source_attribution, validation.schema_diff, v.schema_diff, "schema_diff", src);
            }
            for (role, stage) in file.stages {
                source_attribution.insert(format!("stages.{role}"), src);
                stages.insert(role, stage);
            }
        }
        *config_path = path;

        let src = ConfigSource::Env;
        layer!(source_attribution, defaults.phase_timeout_secs, env_value(env, "phase_timeout_secs")?, "phase_timeout_secs", src);
        layer!(source_attribution, defaults.max_regenerations, env_value(env, "max_regenerations")?, "max_regenerations", src);
        layer!(source_attribution, defaults.output_retries, env_value(env, "output_retries")?, "output_retries", src);
        layer!(source_attribution, defaults.lock_ttl_seconds, env_value(env, "lock_ttl_seconds")?, "lock_ttl_seconds", src);
        layer!(source_attribution, defaults.verbose, env_value(env, "verbose")?, "verbose", src);

        let src = ConfigSource::Cli;
        layer!(source_attribution, defaults.phase_timeout_secs, cli_args.phase_timeout_secs, "phase_timeout_secs", src);
        layer!(source_attribution, defaults.max_regenerations, cli_args.max_regenerations, "max_regenerations", src);
        layer!(source_attribution, defaults.output_retries, cli_args.output_retries, "output_retries", src);
        layer!(source_attribution, defaults.lock_ttl_seconds, cli_args.lock_ttl_seconds, "lock_ttl_seconds", src);
        layer!(source_attribution, defaults.verbose, cli_args.verbose, "verbose", src);
        layer!(source_attribution, validation.schema_diff, cli_args.schema_diff, "schema_diff", src);

        config.validate()?;
        Ok(config)
    }

    /// Walk up from `start_dir` looking for `.contractflow/config.toml`,
    /// stopping at repository root markers (.git, .hg, .svn) or the
    /// filesystem root.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
        for dir in start_dir.ancestors() {
            let candidate = dir.join(".contractflow").join("config.toml");
            if candidate.is_file() {
                return Ok(Some(candidate));
            }
            if [".git", ".hg", ".svn"].iter().any(|m| dir.join(m).exists()) {
                break;
            }
        }
        Ok(None)
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .map_err(|e| ConfigError::InvalidFile(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TomlConfig::default()),
            Err(e) => Err(ConfigError::DiscoveryFailed {
                reason: format!("failed to read {}: {e}", path.display()),
            }),
        }
    }
}

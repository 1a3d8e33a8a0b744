use contractflow_utils::error::{ConfigError, FlowError};

use super::Config;

fn check_range<T>(key: &str, value: Option<T>, min: T, max: T, unit: &str) -> Result<(), FlowError>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    let Some(value) = value else {
        return Ok(());
    };
    if value < min {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: format!("{value} is below the minimum of {min}{unit}"),
        }
        .into());
    }
    if value > max {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: format!("{value} exceeds the maximum of {max}{unit}"),
        }
        .into());
    }
    Ok(())
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), FlowError> {
        let d = &self.defaults;
        check_range("phase_timeout_secs", d.phase_timeout_secs, 1, 7200, " seconds")?;
        check_range("max_regenerations", d.max_regenerations, 0, 20, "")?;
        check_range("output_retries", d.output_retries, 0, 5, "")?;
        check_range("lock_ttl_seconds", d.lock_ttl_seconds, 60, 86_400, " seconds")?;

        for (role, stage) in &self.stages {
            if stage.command.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: format!("stages.{role}.command"),
                    value: "must not be empty".to_string(),
                }
                .into());
            }
            check_range(
                &format!("stages.{role}.timeout_secs"),
                stage.timeout_secs,
                1,
                7200,
                " seconds",
            )?;
        }
        Ok(())
    }
}

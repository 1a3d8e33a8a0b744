use std::fmt;
use std::io;
use thiserror::Error;

pub use contractflow_lock::LockError;
pub use contractflow_revision::RevisionError;

use crate::types::ErrorKind;

/// Library-level error type with rich context and user-friendly reporting.
///
/// `FlowError` is returned by every contractflow coordinator operation. Each
/// variant maps to a stable [`ErrorKind`] via [`kind()`](Self::kind), which is
/// what a `FAILED` workflow state carries, and to a CLI exit code via
/// [`to_exit_code()`](Self::to_exit_code).
///
/// | Kind | Recovery |
/// |------|----------|
/// | `permission_error` | fatal |
/// | `missing_dependency_error` | fatal (phase ordering bug) |
/// | `invalid_output_format` | one bounded retry, then fatal |
/// | `spec_validation_error` | regeneration, bounded |
/// | `invalid_revision_format` | fatal (contract corruption) |
/// | `regeneration_limit_exceeded` | fatal |
///
/// ```rust
/// use contractflow_utils::error::{FlowError, StoreError};
/// use contractflow_utils::exit_codes::ExitCode;
/// use contractflow_utils::types::ErrorKind;
///
/// let err = FlowError::from(StoreError::WriteDenied {
///     caller: "planner".into(),
///     key: "api_spec".into(),
/// });
/// assert_eq!(err.kind(), ErrorKind::PermissionError);
/// assert_eq!(err.to_exit_code(), ExitCode::CONTRACT_VIOLATION);
/// ```
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Shared state error: {0}")]
    Store(#[from] StoreError),

    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    #[error("Revision error: {0}")]
    Revision(#[from] RevisionError),

    #[error("Run lock error: {0}")]
    Lock(#[from] LockError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid phase transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Contract validation failed in {phase}: {error_count} blocking issue(s)")]
    SpecValidation { phase: String, error_count: usize },

    #[error("Regeneration limit exceeded: {count} regenerations (limit {limit})")]
    RegenerationLimitExceeded { count: u32, limit: u32 },

    #[error("Run is in terminal phase {phase}; no further phases may execute")]
    RunTerminated { phase: String },

    #[error("Cannot resume run: {reason}")]
    ResumeRejected { reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlowError {
    /// Stable classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::ConfigurationError,
            Self::Store(e) => e.kind(),
            Self::Stage(e) => e.kind(),
            Self::Revision(_) => ErrorKind::InvalidRevisionFormat,
            Self::Lock(_) => ErrorKind::LockHeld,
            Self::Io(_) => ErrorKind::IoError,
            Self::Json(_) => ErrorKind::Internal,
            Self::InvalidTransition { .. } | Self::RunTerminated { .. } => {
                ErrorKind::InvalidTransition
            }
            Self::SpecValidation { .. } => ErrorKind::SpecValidationError,
            Self::RegenerationLimitExceeded { .. } => ErrorKind::RegenerationLimitExceeded,
            Self::ResumeRejected { .. } => ErrorKind::InvalidTransition,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// A user-facing message with context and actionable suggestions.
    ///
    /// ```text
    /// Error: <user message>
    ///
    /// Context: <context>
    ///
    /// Suggestions:
    ///   • <suggestion>
    /// ```
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = format!("Error: {}\n", self.user_message());
        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }
        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }
        output
    }

    /// Map this error to the CLI exit code table in [`crate::exit_codes`].
    #[must_use]
    pub fn to_exit_code(&self) -> crate::exit_codes::ExitCode {
        crate::exit_codes::ExitCode::for_kind(self.kind())
    }
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    PhaseExecution,
    ContractIntegrity,
    FileSystem,
    Concurrency,
    Validation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::PhaseExecution => write!(f, "Phase Execution"),
            Self::ContractIntegrity => write!(f, "Contract Integrity"),
            Self::FileSystem => write!(f, "File System"),
            Self::Concurrency => write!(f, "Concurrency"),
            Self::Validation => write!(f, "Validation"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },

    #[error("No stage registered for phase {phase}")]
    MissingStage { phase: String },

    #[error("Stage '{stage}' for phase {phase} does not declare output '{key}'")]
    StageShape {
        stage: String,
        phase: String,
        key: String,
    },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => format!("Configuration file has invalid format: {reason}"),
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::DiscoveryFailed { reason } => {
                format!("Failed to discover configuration: {reason}")
            }
            Self::MissingStage { phase } => format!("No stage is configured for {phase}"),
            Self::StageShape { stage, phase, key } => format!(
                "Stage '{stage}' cannot run {phase}: it does not produce '{key}'"
            ),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files must be valid TOML with [defaults], [stages.*] and [validation] sections."
                    .to_string(),
            ),
            Self::MissingStage { .. } => Some(
                "Every phase from PLANNING to FRONTEND_GENERATION needs a stage; VALIDATION is optional."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidValue { key, .. } => {
                vec![format!("Check the allowed range for '{key}' in .contractflow/config.toml")]
            }
            Self::NotFound { .. } => vec![
                "Create .contractflow/config.toml or pass --config <path>".to_string(),
            ],
            Self::MissingStage { phase } => {
                vec![format!("Add a [stages.*] entry for {phase}")]
            }
            _ => vec![],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Errors raised by the permissioned shared state store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Stage '{caller}' is not permitted to read '{key}'")]
    ReadDenied { caller: String, key: String },

    #[error("Stage '{caller}' is not permitted to write '{key}'")]
    WriteDenied { caller: String, key: String },

    #[error("Key '{key}' is owned by the coordinator; stage '{caller}' may not declare it")]
    ReservedKey { caller: String, key: String },

    #[error("Stage '{caller}' is not registered with the store")]
    UnknownCaller { caller: String },

    #[error("Stage '{caller}' is already registered")]
    DuplicateCaller { caller: String },

    #[error("Stage '{caller}' requires '{key}', which is absent or empty")]
    MissingDependency { caller: String, key: String },

    #[error("Run document is malformed: {reason}")]
    MalformedDocument { reason: String },

    #[error("Storage backend failed: {reason}")]
    Backend { reason: String },
}

impl StoreError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ReadDenied { .. }
            | Self::WriteDenied { .. }
            | Self::ReservedKey { .. }
            | Self::UnknownCaller { .. }
            | Self::DuplicateCaller { .. } => ErrorKind::PermissionError,
            Self::MissingDependency { .. } => ErrorKind::MissingDependencyError,
            Self::MalformedDocument { .. } => ErrorKind::Internal,
            Self::Backend { .. } => ErrorKind::IoError,
        }
    }
}

impl UserFriendlyError for StoreError {
    fn user_message(&self) -> String {
        match self {
            Self::ReadDenied { caller, key } => {
                format!("Stage '{caller}' tried to read '{key}' without declaring it as an input")
            }
            Self::WriteDenied { caller, key } => {
                format!("Stage '{caller}' tried to write '{key}' without declaring it as an output")
            }
            Self::MissingDependency { caller, key } => {
                format!("Stage '{caller}' cannot run yet: '{key}' has not been produced")
            }
            other => other.to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::MissingDependency { .. } => Some(
                "Inputs must be committed by an earlier phase before a stage can read them."
                    .to_string(),
            ),
            Self::ReadDenied { .. } | Self::WriteDenied { .. } | Self::ReservedKey { .. } => Some(
                "Each stage may only touch the document keys it declared at registration."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::WriteDenied { key, .. } => vec![format!(
                "Remove '{key}' from the stage output or declare it in the stage's output keys"
            )],
            Self::MissingDependency { .. } => {
                vec!["Resume the run from the phase that produces the missing key".to_string()]
            }
            _ => vec![],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingDependency { .. } => ErrorCategory::PhaseExecution,
            Self::Backend { .. } => ErrorCategory::FileSystem,
            _ => ErrorCategory::ContractIntegrity,
        }
    }
}

/// Errors raised while invoking a stage or gating its output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("Stage output for {phase} is not a single JSON object: {reason}")]
    InvalidOutput { phase: String, reason: String },

    #[error("Phase {phase} timed out after {timeout_seconds} seconds")]
    Timeout { phase: String, timeout_seconds: u64 },

    #[error("Phase {phase} was cancelled")]
    Cancelled { phase: String },

    #[error("Stage '{stage}' failed in {phase} ({kind}): {message}")]
    Failed {
        phase: String,
        stage: String,
        kind: String,
        message: String,
    },
}

impl StageError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidOutput { .. } => ErrorKind::InvalidOutputFormat,
            Self::Timeout { .. } => ErrorKind::StageTimeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Failed { .. } => ErrorKind::StageFailed,
        }
    }
}

impl UserFriendlyError for StageError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidOutput { phase, reason } => {
                format!("The {phase} stage returned output that is not a JSON object: {reason}")
            }
            Self::Timeout {
                phase,
                timeout_seconds,
            } => format!("The {phase} stage did not answer within {timeout_seconds} seconds"),
            Self::Cancelled { phase } => format!("The {phase} phase was cancelled"),
            Self::Failed {
                stage, message, ..
            } => format!("Stage '{stage}' reported a failure: {message}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidOutput { .. } => Some(
                "Stages must print exactly one JSON object keyed by document name, with no Markdown or prose."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Timeout { .. } => vec![
                "Increase defaults.phase_timeout_secs or the stage's timeout_secs".to_string(),
            ],
            Self::Cancelled { .. } | Self::Failed { .. } => {
                vec!["Run `contractflow resume <run-id>` to continue from the last stable phase".to_string()]
            }
            Self::InvalidOutput { .. } => vec![],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::PhaseExecution
    }
}

impl UserFriendlyError for LockError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            LockError::Held { .. } | LockError::Stale { .. } => Some(
                "Only one coordinator may write a persisted run at a time.".to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            LockError::Stale { .. } => vec!["Re-run with --force to replace the stale lock".to_string()],
            LockError::Held { pid, .. } => vec![format!("Wait for PID {pid} to finish")],
            _ => vec![],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Concurrency
    }
}

impl UserFriendlyError for FlowError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(e) => e.user_message(),
            Self::Store(e) => e.user_message(),
            Self::Stage(e) => e.user_message(),
            Self::Lock(e) => e.user_message(),
            Self::Revision(e) => format!("Contract revision is corrupt: {e}"),
            Self::Io(e) => format!("File system operation failed: {e}"),
            Self::RegenerationLimitExceeded { count, limit } => format!(
                "The contract still drifts after {count} regenerations (limit {limit})"
            ),
            other => other.to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(e) => e.context(),
            Self::Store(e) => e.context(),
            Self::Stage(e) => e.context(),
            Self::Lock(e) => e.context(),
            Self::RegenerationLimitExceeded { .. } => Some(
                "Each backward edge from VALIDATION counts as one regeneration.".to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(e) => e.suggestions(),
            Self::Store(e) => e.suggestions(),
            Self::Stage(e) => e.suggestions(),
            Self::Lock(e) => e.suggestions(),
            Self::RegenerationLimitExceeded { .. } => vec![
                "Inspect the validation issues with `contractflow status <run-id>`".to_string(),
                "Raise defaults.max_regenerations if the drift is converging".to_string(),
            ],
            _ => vec![],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Store(e) => e.category(),
            Self::Stage(_) | Self::InvalidTransition { .. } | Self::RunTerminated { .. } => {
                ErrorCategory::PhaseExecution
            }
            Self::Revision(_) => ErrorCategory::ContractIntegrity,
            Self::Lock(_) => ErrorCategory::Concurrency,
            Self::Io(_) | Self::Json(_) => ErrorCategory::FileSystem,
            Self::SpecValidation { .. } | Self::RegenerationLimitExceeded { .. } => {
                ErrorCategory::Validation
            }
            Self::ResumeRejected { .. } | Self::Internal(_) => ErrorCategory::PhaseExecution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_kinds() {
        let denied = StoreError::WriteDenied {
            caller: "planner".into(),
            key: "api_spec".into(),
        };
        assert_eq!(denied.kind(), ErrorKind::PermissionError);

        let missing = StoreError::MissingDependency {
            caller: "backend".into(),
            key: "api_spec".into(),
        };
        assert_eq!(missing.kind(), ErrorKind::MissingDependencyError);
        assert_eq!(FlowError::from(missing).kind(), ErrorKind::MissingDependencyError);
    }

    #[test]
    fn test_stage_error_kinds() {
        let invalid = StageError::InvalidOutput {
            phase: "PLANNING".into(),
            reason: "markdown fence".into(),
        };
        assert!(invalid.kind().is_retryable());
        let timeout = StageError::Timeout {
            phase: "PLANNING".into(),
            timeout_seconds: 30,
        };
        assert_eq!(timeout.kind(), ErrorKind::StageTimeout);
        assert!(!timeout.kind().is_retryable());
    }

    #[test]
    fn test_revision_error_is_invalid_revision_format() {
        let err = FlowError::from(RevisionError::InvalidFormat {
            value: "1.2".into(),
        });
        assert_eq!(err.kind(), ErrorKind::InvalidRevisionFormat);
        assert_eq!(err.category(), ErrorCategory::ContractIntegrity);
    }

    #[test]
    fn test_display_for_user_includes_suggestions() {
        let err = FlowError::RegenerationLimitExceeded { count: 4, limit: 3 };
        let text = err.display_for_user();
        assert!(text.starts_with("Error: The contract still drifts after 4 regenerations"));
        assert!(text.contains("Context:"));
        assert!(text.contains("Suggestions:"));
        assert!(text.contains("max_regenerations"));
    }

    #[test]
    fn test_display_for_user_without_context() {
        let err = FlowError::Internal("boom".into());
        let text = err.display_for_user();
        assert_eq!(text, "Error: Internal error: boom\n");
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::InvalidValue {
            key: "max_regenerations".into(),
            value: "99".into(),
        };
        assert!(err.user_message().contains("max_regenerations"));
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.suggestions().len(), 1);
    }
}

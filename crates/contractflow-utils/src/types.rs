use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Position of a run in the workflow state machine.
///
/// # Phase Order
///
/// ```text
/// INIT → PLANNING → SPEC_GENERATION → BACKEND_GENERATION
///      → FRONTEND_GENERATION → VALIDATION → COMPLETED
/// ```
///
/// `FAILED` is reachable from every non-terminal phase. `COMPLETED` and
/// `FAILED` are absorbing.
///
/// # Serialization
///
/// Phases serialize in SCREAMING_SNAKE_CASE (`"SPEC_GENERATION"`), matching
/// the persisted `workflow_state` document.
///
/// ```rust
/// use contractflow_utils::types::Phase;
///
/// assert_eq!(Phase::SpecGeneration.as_str(), "SPEC_GENERATION");
/// assert_eq!("VALIDATION".parse::<Phase>().unwrap(), Phase::Validation);
/// assert!(Phase::Completed.is_terminal());
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Init,
    Planning,
    SpecGeneration,
    BackendGeneration,
    FrontendGeneration,
    Validation,
    Completed,
    Failed,
}

impl Phase {
    /// Canonical name used in logs, audit entries and status output.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Planning => "PLANNING",
            Self::SpecGeneration => "SPEC_GENERATION",
            Self::BackendGeneration => "BACKEND_GENERATION",
            Self::FrontendGeneration => "FRONTEND_GENERATION",
            Self::Validation => "VALIDATION",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// `COMPLETED` and `FAILED` accept no further phase execution.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Phases that invoke a stage.
    #[must_use]
    pub const fn is_stage_phase(&self) -> bool {
        matches!(
            self,
            Self::Planning
                | Self::SpecGeneration
                | Self::BackendGeneration
                | Self::FrontendGeneration
                | Self::Validation
        )
    }

    /// Implementation phases are checked against the contract after commit.
    #[must_use]
    pub const fn is_implementation(&self) -> bool {
        matches!(self, Self::BackendGeneration | Self::FrontendGeneration)
    }

    /// Next phase on the forward chain, if any.
    #[must_use]
    pub const fn forward(&self) -> Option<Phase> {
        match self {
            Self::Init => Some(Self::Planning),
            Self::Planning => Some(Self::SpecGeneration),
            Self::SpecGeneration => Some(Self::BackendGeneration),
            Self::BackendGeneration => Some(Self::FrontendGeneration),
            Self::FrontendGeneration => Some(Self::Validation),
            Self::Validation => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    /// The document key a stage in this phase must produce.
    #[must_use]
    pub const fn primary_output(&self) -> Option<DocKey> {
        match self {
            Self::Planning => Some(DocKey::ProjectPlan),
            Self::SpecGeneration => Some(DocKey::ApiSpec),
            Self::BackendGeneration => Some(DocKey::BackendReport),
            Self::FrontendGeneration => Some(DocKey::FrontendReport),
            Self::Validation => Some(DocKey::ValidationFindings),
            Self::Init | Self::Completed | Self::Failed => None,
        }
    }
}

/// Top-level keys of the shared run document.
///
/// ```rust
/// use contractflow_utils::types::DocKey;
///
/// assert_eq!(DocKey::ApiSpec.as_ref(), "api_spec");
/// assert!(DocKey::WorkflowState.is_reserved());
/// assert!(!DocKey::BackendReport.is_reserved());
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocKey {
    UserRequest,
    ProjectPlan,
    ApiSpec,
    ApiSpecHistory,
    BackendReport,
    FrontendReport,
    ValidationFindings,
    WorkflowState,
}

impl DocKey {
    /// Keys written only by the coordinator. No stage may declare them as outputs.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        matches!(self, Self::WorkflowState | Self::ApiSpecHistory)
    }
}

/// How a phase transition came about, recorded in `phase_history`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransitionKind {
    Forward,
    Regeneration,
    Failure,
    Resume,
}

/// Stable, machine-readable classification of every failure.
///
/// This is the `error_kind` carried by a `FAILED` workflow state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    PermissionError,
    MissingDependencyError,
    InvalidOutputFormat,
    SpecValidationError,
    InvalidRevisionFormat,
    RegenerationLimitExceeded,
    StageTimeout,
    Cancelled,
    StageFailed,
    InvalidTransition,
    ConfigurationError,
    LockHeld,
    IoError,
    Internal,
}

impl ErrorKind {
    /// Output-format failures alone are eligible for a bounded retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::InvalidOutputFormat)
    }
}

/// Where a configuration value came from.
///
/// ```rust
/// use contractflow_utils::types::ConfigSource;
///
/// let json = serde_json::to_string(&ConfigSource::Env).unwrap();
/// assert_eq!(json, r#""env""#);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConfigSource {
    /// Value provided via CLI argument (highest precedence).
    Cli,
    /// Value read from a `CONTRACTFLOW_*` environment variable.
    Env,
    /// Value loaded from configuration file.
    Config,
    /// Value provided programmatically (e.g., `Config::builder()`).
    Programmatic,
    /// Built-in default value (lowest precedence).
    Default,
}

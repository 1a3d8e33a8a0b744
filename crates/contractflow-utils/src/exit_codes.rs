//! Exit code constants and error kind mapping for contractflow.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Run completed, or command succeeded |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 9 | `LOCK_HELD` | Another coordinator holds the run lock |
//! | 10 | `PHASE_TIMEOUT` | A stage invocation timed out |
//! | 11 | `RUN_FAILED` | Unresolved drift, regeneration limit, or stage failure |
//! | 12 | `INVALID_OUTPUT` | A stage returned output that failed the JSON gate |
//! | 13 | `CONTRACT_VIOLATION` | Permission, dependency or revision violation |
//! | 130 | `CANCELLED` | Run cancelled by signal |

use crate::types::ErrorKind;

/// Type-safe process exit code.
///
/// The numeric values are part of the CLI contract.
///
/// ```rust
/// use contractflow_utils::exit_codes::ExitCode;
/// use contractflow_utils::types::ErrorKind;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::for_kind(ErrorKind::StageTimeout), ExitCode::PHASE_TIMEOUT);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const INTERNAL: ExitCode = ExitCode(1);
    pub const CLI_ARGS: ExitCode = ExitCode(2);
    pub const LOCK_HELD: ExitCode = ExitCode(9);
    pub const PHASE_TIMEOUT: ExitCode = ExitCode(10);
    pub const RUN_FAILED: ExitCode = ExitCode(11);
    pub const INVALID_OUTPUT: ExitCode = ExitCode(12);
    pub const CONTRACT_VIOLATION: ExitCode = ExitCode(13);
    pub const CANCELLED: ExitCode = ExitCode(130);

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }

    /// Single source of truth for mapping an error kind to an exit code.
    #[must_use]
    pub const fn for_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::ConfigurationError => Self::CLI_ARGS,
            ErrorKind::LockHeld => Self::LOCK_HELD,
            ErrorKind::StageTimeout => Self::PHASE_TIMEOUT,
            ErrorKind::SpecValidationError
            | ErrorKind::RegenerationLimitExceeded
            | ErrorKind::StageFailed => Self::RUN_FAILED,
            ErrorKind::InvalidOutputFormat => Self::INVALID_OUTPUT,
            ErrorKind::PermissionError
            | ErrorKind::MissingDependencyError
            | ErrorKind::InvalidRevisionFormat => Self::CONTRACT_VIOLATION,
            ErrorKind::Cancelled => Self::CANCELLED,
            ErrorKind::InvalidTransition | ErrorKind::IoError | ErrorKind::Internal => {
                Self::INTERNAL
            }
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

pub mod atomic_write;
pub mod canonical;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod paths;
pub mod types;

pub use error::{
    ConfigError, ErrorCategory, FlowError, StageError, StoreError, UserFriendlyError,
};
pub use exit_codes::ExitCode;
pub use types::{DocKey, ErrorKind, ConfigSource, Phase, TransitionKind};

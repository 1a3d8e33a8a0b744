//! State directory layout.
//!
//! ```text
//! <CONTRACTFLOW_HOME>/
//!   runs/<run_id>/
//!     .lock
//!     run.json
//! ```

use camino::Utf8PathBuf;

pub use contractflow_lock::{DEFAULT_LOCK_TTL_SECS, run_root, state_home, validate_run_id};

use crate::error::LockError;

/// File name of the persisted run document inside a run directory.
pub const RUN_DOCUMENT_FILE: &str = "run.json";

/// Returns `<home>/runs/<run_id>/run.json`
pub fn run_document_path(run_id: &str) -> Result<Utf8PathBuf, LockError> {
    Ok(run_root(run_id)?.join(RUN_DOCUMENT_FILE))
}

/// Returns `<home>/runs`
#[must_use]
pub fn runs_dir() -> Utf8PathBuf {
    state_home().join("runs")
}

/// mkdir -p; treat `AlreadyExists` as success (removes TOCTTOU races)
pub fn ensure_dir_all<P: AsRef<std::path::Path>>(p: P) -> std::io::Result<()> {
    match std::fs::create_dir_all(&p) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// RAII guard for isolated home that clears thread-local state on drop
#[cfg(any(test, feature = "test-utils"))]
pub struct HomeGuard {
    inner: tempfile::TempDir,
}

#[cfg(any(test, feature = "test-utils"))]
impl Drop for HomeGuard {
    fn drop(&mut self) {
        contractflow_lock::set_thread_home_for_tests(None);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl std::ops::Deref for HomeGuard {
    type Target = tempfile::TempDir;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Test helper: give this thread a unique state home under the system temp dir.
///
/// Hold the `HomeGuard` for the test's duration.
#[cfg(any(test, feature = "test-utils"))]
#[must_use]
pub fn with_isolated_home() -> HomeGuard {
    HomeGuard {
        inner: contractflow_lock::with_isolated_home(),
    }
}

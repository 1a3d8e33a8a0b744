//! Single-writer locking for persisted run documents.
//!
//! One lock file per run directory serializes every coordinator instance that
//! operates on the same run id. Runs with different ids never contend. The
//! lock is advisory: it coordinates contractflow processes and is not a
//! security boundary.

use camino::Utf8PathBuf;
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

// Thread-local override used only in tests to avoid process-global env races.
thread_local! {
    static THREAD_HOME: RefCell<Option<Utf8PathBuf>> = const { RefCell::new(None) };
}

/// Default age after which a lock left by a dead process is stale (seconds)
pub const DEFAULT_LOCK_TTL_SECS: u64 = 900;

const MAX_RUN_ID_LEN: usize = 128;
const LOCK_FILE_NAME: &str = ".lock";

/// Contents of the lock file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process that holds the lock
    pub pid: u32,
    /// Seconds since the epoch when the lock was taken
    pub created_at: u64,
    pub run_id: String,
    pub contractflow_version: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Run '{run_id}' is locked by PID {pid} (taken {created_ago} ago)")]
    Held {
        run_id: String,
        pid: u32,
        created_ago: String,
    },

    #[error("Stale lock for run '{run_id}' (PID {pid}, age {age_secs}s). Use --force to override")]
    Stale {
        run_id: String,
        pid: u32,
        age_secs: u64,
    },

    #[error("Invalid run id '{run_id}': {reason}")]
    InvalidRunId { run_id: String, reason: String },

    #[error("Lock file is corrupted: {reason}")]
    Corrupted { reason: String },

    #[error("Failed to acquire lock: {reason}")]
    AcquisitionFailed { reason: String },

    #[error("IO error during lock operation: {0}")]
    Io(#[from] io::Error),
}

/// Resolve the state home:
/// 1) thread-local override (tests use this)
/// 2) env `CONTRACTFLOW_HOME`
/// 3) default ".contractflow"
#[must_use]
pub fn state_home() -> Utf8PathBuf {
    if let Some(tl) = THREAD_HOME.with(|tl| tl.borrow().clone()) {
        return tl;
    }
    if let Ok(p) = std::env::var("CONTRACTFLOW_HOME") {
        return Utf8PathBuf::from(p);
    }
    Utf8PathBuf::from(".contractflow")
}

/// Point [`state_home`] at `path` for the current thread.
#[cfg(any(test, feature = "test-utils"))]
pub fn set_thread_home_for_tests(path: Option<Utf8PathBuf>) {
    THREAD_HOME.with(|tl| *tl.borrow_mut() = path);
}

/// Run ids become directory names, so only `[A-Za-z0-9._-]` is accepted.
pub fn validate_run_id(run_id: &str) -> Result<(), LockError> {
    let invalid = |reason: &str| LockError::InvalidRunId {
        run_id: run_id.to_string(),
        reason: reason.to_string(),
    };
    if run_id.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if run_id.len() > MAX_RUN_ID_LEN {
        return Err(invalid("longer than 128 characters"));
    }
    if run_id == "." || run_id == ".." {
        return Err(invalid("reserved path component"));
    }
    if !run_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(invalid("only letters, digits, '.', '_' and '-' are allowed"));
    }
    Ok(())
}

/// Returns `<home>/runs/<run_id>`
pub fn run_root(run_id: &str) -> Result<Utf8PathBuf, LockError> {
    validate_run_id(run_id)?;
    Ok(state_home().join("runs").join(run_id))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Exclusive lock over one run directory, released on drop.
pub struct RunLock {
    lock_path: PathBuf,
    _fd_lock: Option<Box<RwLock<fs::File>>>,
    info: LockInfo,
}

impl RunLock {
    /// Take the lock for `run_id`.
    ///
    /// An existing lock held by a live process is never overridden unless
    /// `force` is set. A lock whose process is gone may be replaced with
    /// `force`, and is reported as [`LockError::Stale`] once older than the TTL.
    pub fn acquire(run_id: &str, force: bool, ttl_seconds: Option<u64>) -> Result<Self, LockError> {
        let root = run_root(run_id)?;
        fs::create_dir_all(&root).map_err(|e| LockError::AcquisitionFailed {
            reason: format!("Failed to create run directory {root}: {e}"),
        })?;

        let lock_path = root.as_std_path().join(LOCK_FILE_NAME);
        let ttl = ttl_seconds.unwrap_or(DEFAULT_LOCK_TTL_SECS);

        match Self::create_exclusive(&lock_path) {
            Ok(file) => Self::finalize(lock_path, file, run_id),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let existing = read_lock_info(&lock_path)?;
                Self::check_existing(&existing, run_id, force, ttl)?;
                fs::remove_file(&lock_path).or_else(|e| {
                    if e.kind() == io::ErrorKind::NotFound {
                        Ok(())
                    } else {
                        Err(e)
                    }
                })?;
                let file = Self::create_exclusive(&lock_path).map_err(|e| {
                    LockError::AcquisitionFailed {
                        reason: format!(
                            "Another process took the lock for run '{run_id}' during override: {e}"
                        ),
                    }
                })?;
                Self::finalize(lock_path, file, run_id)
            }
            Err(e) => Err(LockError::AcquisitionFailed {
                reason: format!(
                    "Failed to create lock file at '{}': {e}",
                    lock_path.display()
                ),
            }),
        }
    }

    /// Read the lock holder for `run_id`, if any.
    pub fn holder(run_id: &str) -> Result<Option<LockInfo>, LockError> {
        let lock_path = run_root(run_id)?.as_std_path().join(LOCK_FILE_NAME);
        if !lock_path.exists() {
            return Ok(None);
        }
        read_lock_info(&lock_path).map(Some)
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.info.run_id
    }

    #[must_use]
    pub const fn info(&self) -> &LockInfo {
        &self.info
    }

    /// Release explicitly, surfacing removal errors that drop would swallow.
    pub fn release(mut self) -> Result<(), LockError> {
        self._fd_lock.take();
        if self.lock_path.exists() {
            fs::remove_file(&self.lock_path)?;
        }
        Ok(())
    }

    fn create_exclusive(path: &Path) -> io::Result<fs::File> {
        fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(path)
    }

    fn finalize(lock_path: PathBuf, file: fs::File, run_id: &str) -> Result<Self, LockError> {
        let info = LockInfo {
            pid: process::id(),
            created_at: now_secs(),
            run_id: run_id.to_string(),
            contractflow_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let json = serde_json::to_string_pretty(&info).map_err(|e| LockError::AcquisitionFailed {
            reason: format!("Failed to serialize lock info: {e}"),
        })?;

        let mut rw_lock = Box::new(RwLock::new(file));
        {
            let guard = rw_lock.try_write().map_err(|_| LockError::Held {
                run_id: run_id.to_string(),
                pid: 0,
                created_ago: "unknown".to_string(),
            })?;
            let mut handle = &*guard;
            handle.write_all(json.as_bytes())?;
            handle.flush()?;
            handle.sync_all()?;
        }

        Ok(Self {
            lock_path,
            _fd_lock: Some(rw_lock),
            info,
        })
    }

    fn check_existing(
        existing: &LockInfo,
        run_id: &str,
        force: bool,
        ttl_seconds: u64,
    ) -> Result<(), LockError> {
        if force {
            return Ok(());
        }
        let age = now_secs().saturating_sub(existing.created_at);
        if !is_process_running(existing.pid) && age > ttl_seconds {
            return Err(LockError::Stale {
                run_id: run_id.to_string(),
                pid: existing.pid,
                age_secs: age,
            });
        }
        Err(LockError::Held {
            run_id: run_id.to_string(),
            pid: existing.pid,
            created_ago: format_age(age),
        })
    }
}

impl std::fmt::Debug for RunLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLock")
            .field("lock_path", &self.lock_path)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        self._fd_lock.take();
        if self.lock_path.exists() {
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

fn read_lock_info(path: &Path) -> Result<LockInfo, LockError> {
    let content = fs::read_to_string(path).map_err(|e| LockError::Corrupted {
        reason: format!("Failed to read lock file: {e}"),
    })?;
    serde_json::from_str(&content).map_err(|e| LockError::Corrupted {
        reason: format!("Failed to parse lock file: {e}"),
    })
}

fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        // kill(pid, 0): 0 means alive; EPERM means alive but not ours
        let rc = unsafe { libc::kill(pid as i32, 0) };
        if rc == 0 {
            true
        } else {
            matches!(
                io::Error::last_os_error().raw_os_error(),
                Some(code) if code == libc::EPERM
            )
        }
    }

    #[cfg(windows)]
    {
        use winapi::um::handleapi::CloseHandle;
        use winapi::um::minwinbase::STILL_ACTIVE;
        use winapi::um::processthreadsapi::{GetExitCodeProcess, OpenProcess};
        use winapi::um::winnt::PROCESS_QUERY_LIMITED_INFORMATION;

        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
            if handle.is_null() {
                return false;
            }
            let mut exit_code: u32 = 0;
            let ok = GetExitCodeProcess(handle, &mut exit_code);
            CloseHandle(handle);
            ok != 0 && exit_code == STILL_ACTIVE
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        true
    }
}

fn format_age(secs: u64) -> String {
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

/// Give the current thread a fresh state home under the system temp dir.
///
/// Hold the returned directory for the test's duration.
#[cfg(any(test, feature = "test-utils"))]
#[allow(clippy::expect_used)]
pub fn with_isolated_home() -> tempfile::TempDir {
    let td = tempfile::TempDir::new().expect("create temp home");
    let path = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).expect("utf-8 temp path");
    set_thread_home_for_tests(Some(path));
    td
}

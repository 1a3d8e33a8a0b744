//! Test support utilities for CLI tests
//!
//! This module provides common test infrastructure including environment
//! isolation, a mutex guard for tests that mutate global state, and
//! document fixtures.

use serde_json::{Value, json};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};
use tempfile::TempDir;

// Global lock for tests that mutate process-global CLI state (env vars, cwd).
// Any test that uses `TestEnvGuard` or `cli_env_guard()` will be serialized.
static CLI_ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub fn cli_env_guard() -> MutexGuard<'static, ()> {
    CLI_ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

pub struct TestEnvGuard {
    // Hold the lock for the entire lifetime of the guard
    _lock: MutexGuard<'static, ()>,
    temp_dir: TempDir,
    original_dir: PathBuf,
    original_home: Option<String>,
}

impl TestEnvGuard {
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }
}

impl Drop for TestEnvGuard {
    fn drop(&mut self) {
        // Restore env and cwd while still holding the lock
        match &self.original_home {
            Some(val) => unsafe { env::set_var("CONTRACTFLOW_HOME", val) },
            None => unsafe { env::remove_var("CONTRACTFLOW_HOME") },
        }
        let _ = env::set_current_dir(&self.original_dir);
        // _lock field drops last, releasing the mutex
    }
}

pub fn setup_test_environment() -> TestEnvGuard {
    // Take the global CLI lock first
    let lock = cli_env_guard();

    let temp_dir = TempDir::new().unwrap();
    let original_dir = env::current_dir().unwrap();
    let original_home = env::var("CONTRACTFLOW_HOME").ok();

    env::set_current_dir(temp_dir.path()).unwrap();

    // Point the state home at the temp directory so no test touches a
    // developer's runs.
    // Safety: We hold the global CLI lock, so no concurrent test can race on env vars.
    unsafe {
        env::set_var("CONTRACTFLOW_HOME", temp_dir.path().join("home"));
    }

    TestEnvGuard {
        _lock: lock,
        temp_dir,
        original_dir,
        original_home,
    }
}

pub fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

/// Contract with `GET /users` and `POST /users`.
pub fn contract() -> Value {
    json!({
        "openapi_spec": {
            "openapi": "3.1.0",
            "paths": {
                "/users": {
                    "get": {"operationId": "listUsers"},
                    "post": {"operationId": "createUser"}
                }
            }
        },
        "validation_report": {"status": "pass", "issues": []}
    })
}

pub fn backend_report(endpoints: &[(&str, &str)]) -> Value {
    let endpoints: Vec<Value> = endpoints
        .iter()
        .map(|(path, method)| json!({"path": path, "method": method}))
        .collect();
    json!({
        "implemented_endpoints": endpoints,
        "artifacts": [{"type": "route", "filename": "routes/users.py"}],
        "compliance_status": "pass"
    })
}

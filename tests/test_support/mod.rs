//! Shared helpers for integration tests.
//!
//! Builds a throwaway workspace with shell-script stages and a config file
//! pointing at them, so the real binary can be driven end to end.

#![allow(dead_code)]

use assert_cmd::Command;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temp directory holding `config.toml`, stage scripts and the state home.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn home(&self) -> PathBuf {
        self.path().join("home")
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("config.toml")
    }

    /// Write a stage script that discards stdin and prints `output`.
    pub fn script(&self, name: &str, output: &Value) -> PathBuf {
        self.raw_script(
            name,
            &format!("cat > /dev/null\ncat <<'JSON'\n{}\nJSON\n", serde_json::to_string(output).unwrap()),
        )
    }

    /// Write a stage script with an arbitrary `sh` body.
    pub fn raw_script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.path().join(format!("{name}.sh"));
        fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        path
    }

    /// Config with one `sh <script>` stage per role.
    pub fn write_config(&self, defaults: &str, stages: &[(&str, &Path)]) {
        let mut toml = format!("[defaults]\n{defaults}\n");
        for (role, script) in stages {
            toml.push_str(&format!(
                "\n[stages.{role}]\ncommand = \"sh\"\nargs = [\"{}\"]\n",
                script.display()
            ));
        }
        fs::write(self.config_path(), toml).unwrap();
    }

    /// The four required stages, all producing a compliant run.
    pub fn passing_stages(&self) {
        let planner = self.script("planner", &plan());
        let spec = self.script("spec", &contract());
        let backend = self.script("backend", &backend(&[("/users", "GET")]));
        let frontend = self.script("frontend", &frontend());
        self.write_config(
            "phase_timeout_secs = 10",
            &[
                ("planner", &planner),
                ("spec", &spec),
                ("backend", &backend),
                ("frontend", &frontend),
            ],
        );
    }

    /// `contractflow --config <config>` with the state home isolated.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("contractflow").unwrap();
        cmd.current_dir(self.path())
            .env("CONTRACTFLOW_HOME", self.home())
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(self.config_path());
        cmd
    }
}

pub fn plan() -> Value {
    json!({"project_plan": {
        "project_name": "todo",
        "features": [{"name": "users"}],
        "entities": [{"name": "User"}]
    }})
}

pub fn contract() -> Value {
    json!({"api_spec": {
        "openapi_spec": {
            "openapi": "3.1.0",
            "paths": {"/users": {"get": {"operationId": "listUsers", "x-requirement": "users"}}}
        },
        "validation_report": {"status": "pass", "issues": []}
    }})
}

pub fn backend(endpoints: &[(&str, &str)]) -> Value {
    let endpoints: Vec<Value> = endpoints
        .iter()
        .map(|(path, method)| json!({"path": path, "method": method}))
        .collect();
    json!({"backend_report": {
        "implemented_endpoints": endpoints,
        "artifacts": [{"type": "route", "filename": "routes/users.py"}]
    }})
}

pub fn frontend() -> Value {
    json!({"frontend_report": {
        "implemented_components": [{"name": "UserList"}],
        "api_integrations": [{"path": "/users", "method": "GET", "component": "UserList"}]
    }})
}

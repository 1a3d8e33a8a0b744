//! External process stage.
//!
//! The process receives [`StageInputs`] as one JSON document on stdin and must
//! print its output envelope on stdout. Invocation is argv-style only: no
//! shell string evaluation. The child is killed when the invocation future is
//! dropped, which is how the coordinator's timeout and cancel take effect.

use async_trait::async_trait;
use contractflow_stage_api::{StageAdapter, StageFailure, StageInputs, StageOutput};
use contractflow_utils::types::{DocKey, Phase};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Upper bound on stderr carried into a failure message.
const STDERR_TAIL_BYTES: usize = 2048;

#[derive(Debug, Clone)]
pub struct CommandStage {
    name: String,
    phase: Phase,
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
    input_keys: Option<Vec<DocKey>>,
    output_keys: Option<Vec<DocKey>>,
}

impl CommandStage {
    pub fn new(name: impl Into<String>, phase: Phase, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase,
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            input_keys: None,
            output_keys: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Override the role's default input keys.
    #[must_use]
    pub fn with_input_keys(mut self, keys: Vec<DocKey>) -> Self {
        self.input_keys = Some(keys);
        self
    }

    /// Override the role's default output keys.
    #[must_use]
    pub fn with_output_keys(mut self, keys: Vec<DocKey>) -> Self {
        self.output_keys = Some(keys);
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env)
            .env("CONTRACTFLOW_PHASE", self.phase.as_str())
            .env("CONTRACTFLOW_STAGE", &self.name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}

#[async_trait]
impl StageAdapter for CommandStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn input_keys(&self) -> Vec<DocKey> {
        self.input_keys
            .clone()
            .unwrap_or_else(|| contractflow_stage_api::default_keys(self.phase).0)
    }

    fn output_keys(&self) -> Vec<DocKey> {
        self.output_keys
            .clone()
            .unwrap_or_else(|| contractflow_stage_api::default_keys(self.phase).1)
    }

    async fn invoke(&self, inputs: StageInputs) -> Result<StageOutput, StageFailure> {
        let payload = serde_json::to_vec(&inputs)
            .map_err(|e| StageFailure::new("encode_failed", e.to_string()))?;

        let mut child = self.command().spawn().map_err(|e| {
            StageFailure::new("spawn_failed", format!("failed to start '{}': {e}", self.program))
        })?;
        tracing::debug!(stage = %self.name, program = %self.program, pid = ?child.id(), "stage process started");

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| StageFailure::new("spawn_failed", "stdin was not captured"))?;
        let write = async move {
            let result = stdin.write_all(&payload).await;
            drop(stdin);
            result
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output.map_err(|e| StageFailure::new("wait_failed", e.to_string()))?;

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(StageFailure::new(
                "exit_status",
                format!("'{}' exited with {code}: {}", self.program, stderr_tail(&output.stderr)),
            ));
        }
        // A child that exits 0 without reading stdin is not an error.
        if let Err(e) = written
            && e.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(StageFailure::new("write_failed", e.to_string()));
        }

        let raw = String::from_utf8(output.stdout).map_err(|e| {
            StageFailure::invalid_output(format!(
                "stage output is not valid UTF-8 (invalid byte at offset {})",
                e.utf8_error().valid_up_to()
            ))
        })?;
        Ok(StageOutput::new(raw))
    }
}

//! Stage that replays a fixed script of responses.
//!
//! Used for dry runs and tests: each invocation pops the next step. Every
//! received [`StageInputs`] is kept so callers can inspect what the
//! coordinator passed.

use async_trait::async_trait;
use contractflow_stage_api::{StageAdapter, StageFailure, StageInputs, StageOutput, default_keys};
use contractflow_utils::types::{DocKey, Phase};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Return this raw text.
    Raw(String),
    Fail(StageFailure),
    /// Sleep, then perform the inner step.
    Delay(Duration, Box<ScriptStep>),
    /// Never answer.
    Hang,
}

impl ScriptStep {
    /// Output envelope serialized as JSON.
    #[must_use]
    pub fn json(value: Value) -> Self {
        Self::Raw(value.to_string())
    }
}

#[derive(Debug, Default)]
struct Script {
    steps: VecDeque<ScriptStep>,
    /// Repeated once `steps` runs out.
    fallback: Option<ScriptStep>,
    received: Vec<StageInputs>,
}

#[derive(Debug, Clone)]
pub struct ScriptedStage {
    name: String,
    phase: Phase,
    output_keys: Vec<DocKey>,
    script: Arc<Mutex<Script>>,
}

impl ScriptedStage {
    pub fn new(name: impl Into<String>, phase: Phase) -> Self {
        Self {
            name: name.into(),
            phase,
            output_keys: default_keys(phase).1,
            script: Arc::default(),
        }
    }

    #[must_use]
    pub fn then(self, step: ScriptStep) -> Self {
        self.lock().steps.push_back(step);
        self
    }

    #[must_use]
    pub fn then_json(self, value: Value) -> Self {
        self.then(ScriptStep::json(value))
    }

    /// Step to repeat after the script is exhausted.
    #[must_use]
    pub fn always(self, step: ScriptStep) -> Self {
        self.lock().fallback = Some(step);
        self
    }

    #[must_use]
    pub fn with_output_keys(mut self, keys: Vec<DocKey>) -> Self {
        self.output_keys = keys;
        self
    }

    /// Inputs of every invocation so far.
    #[must_use]
    pub fn received(&self) -> Vec<StageInputs> {
        self.lock().received.clone()
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.lock().received.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn perform(step: ScriptStep) -> Result<StageOutput, StageFailure> {
    let mut step = step;
    loop {
        match step {
            ScriptStep::Raw(raw) => return Ok(StageOutput::new(raw)),
            ScriptStep::Fail(failure) => return Err(failure),
            ScriptStep::Delay(duration, inner) => {
                tokio::time::sleep(duration).await;
                step = *inner;
            }
            ScriptStep::Hang => return std::future::pending().await,
        }
    }
}

#[async_trait]
impl StageAdapter for ScriptedStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn output_keys(&self) -> Vec<DocKey> {
        self.output_keys.clone()
    }

    async fn invoke(&self, inputs: StageInputs) -> Result<StageOutput, StageFailure> {
        let step = {
            let mut script = self.lock();
            script.received.push(inputs);
            script.steps.pop_front().or_else(|| script.fallback.clone())
        };
        match step {
            Some(step) => perform(step).await,
            None => Err(StageFailure::new(
                "script_exhausted",
                format!("stage '{}' has no scripted response left", self.name),
            )),
        }
    }
}

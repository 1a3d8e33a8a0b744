//! Single stage invocation: timeout, cancellation and the output gate.
//!
//! One call of [`execute_stage`] is the "invoke → gate" part of a phase:
//!
//! 1. Invoke the stage with its permitted inputs, bounded by the phase timeout
//!    and the run's cancel signal
//! 2. Gate the raw output through [`parse_stage_output`]
//! 3. On `invalid_output_format` (from the gate, or a stage reporting
//!    undecodable output), retry up to `retries` times, telling the stage why
//!    the previous answer was rejected
//!
//! Nothing here touches the store. The caller commits the returned envelope.

use contractflow_contract::Issue;
use contractflow_stage_api::{StageAdapter, StageInputs, StageOutput};
use contractflow_utils::error::{FlowError, StageError};
use contractflow_utils::logging::log_output_retry;
use contractflow_utils::types::{DocKey, Phase};
use contractflow_validation::{StageEnvelope, parse_stage_output};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::cancel::CancelSignal;

/// Everything needed to invoke one stage for one phase.
pub(crate) struct Invocation<'a> {
    pub run_id: &'a str,
    pub phase: Phase,
    pub stage: &'a dyn StageAdapter,
    pub output_keys: &'a [DocKey],
    pub documents: BTreeMap<DocKey, Value>,
    pub feedback: Vec<Issue>,
    pub timeout: Duration,
    pub retries: u32,
}

/// Invoke once, bounded by `timeout` and `cancel`.
pub(crate) async fn invoke_with_timeout(
    stage: &dyn StageAdapter,
    inputs: StageInputs,
    timeout: Duration,
    cancel: &mut CancelSignal,
) -> Result<StageOutput, FlowError> {
    let phase = inputs.phase.as_str().to_string();
    let call = tokio::time::timeout(timeout, stage.invoke(inputs));
    tokio::select! {
        result = call => match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(failure)) if failure.is_invalid_output() => Err(StageError::InvalidOutput {
                phase,
                reason: failure.message,
            }
            .into()),
            Ok(Err(failure)) => Err(StageError::Failed {
                phase,
                stage: stage.name().to_string(),
                kind: failure.kind,
                message: failure.message,
            }
            .into()),
            Err(_) => Err(StageError::Timeout {
                phase,
                timeout_seconds: timeout.as_secs(),
            }
            .into()),
        },
        () = cancel.cancelled() => Err(StageError::Cancelled { phase }.into()),
    }
}

/// Invoke and gate, with bounded retries on malformed output.
///
/// `on_retry` sees every rejected attempt that is followed by a retry.
pub(crate) async fn execute_stage(
    invocation: Invocation<'_>,
    cancel: &mut CancelSignal,
    mut on_retry: impl FnMut(u32, &FlowError),
) -> Result<StageEnvelope, FlowError> {
    let Invocation {
        run_id,
        phase,
        stage,
        output_keys,
        documents,
        feedback,
        timeout,
        retries,
    } = invocation;

    let mut retry_reason = None;
    let mut attempt = 1;
    loop {
        let inputs = StageInputs {
            run_id: run_id.to_string(),
            phase,
            attempt,
            documents: documents.clone(),
            feedback: feedback.clone(),
            retry_reason: retry_reason.take(),
        };
        let gated = invoke_with_timeout(stage, inputs, timeout, cancel)
            .await
            .and_then(|output| parse_stage_output(phase, stage.name(), output_keys, &output.raw));

        match gated {
            Ok(envelope) => return Ok(envelope),
            Err(err) if err.kind().is_retryable() && attempt <= retries => {
                let reason = err.to_string();
                log_output_retry(run_id, phase.as_str(), attempt + 1, &reason);
                on_retry(attempt, &err);
                retry_reason = Some(reason);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

//! Structured logging for contractflow.
//!
//! Every phase execution runs inside a `phase_execution` span carrying
//! `run_id`, `phase` and `attempt`. The helpers below emit the events the
//! coordinator produces with consistent field names, so that JSON output can
//! be filtered on them.

use std::io::IsTerminal;
use tracing::{Level, error, info, span, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "CONTRACTFLOW_LOG";

/// Output style of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, minimal.
    #[default]
    Compact,
    /// Compact plus targets and span close events with timings.
    Verbose,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    #[must_use]
    pub const fn from_flags(verbose: bool, json: bool) -> Self {
        match (verbose, json) {
            (_, true) => Self::Json,
            (true, false) => Self::Verbose,
            (false, false) => Self::Compact,
        }
    }
}

fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

fn build_filter(format: LogFormat) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| match format {
            LogFormat::Verbose => EnvFilter::try_new("contractflow=debug,info"),
            LogFormat::Compact | LogFormat::Json => EnvFilter::try_new("contractflow=info,warn"),
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global tracing subscriber. Logs go to stderr so that
/// machine-readable command output on stdout stays clean.
pub fn init_tracing(format: LogFormat) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = build_filter(format);
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(false)
                    .compact(),
            )
            .try_init()?,
        LogFormat::Verbose => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .json()
                    .with_current_span(true),
            )
            .try_init()?,
    }

    Ok(())
}

/// Span wrapping a single phase execution attempt.
pub fn phase_span(run_id: &str, phase: &str, attempt: u32) -> tracing::Span {
    span!(
        Level::INFO,
        "phase_execution",
        run_id = %run_id,
        phase = %phase,
        attempt = attempt,
    )
}

pub fn log_phase_start(run_id: &str, phase: &str, stage: &str) {
    info!(
        run_id = %run_id,
        phase = %phase,
        stage = %stage,
        "Starting phase execution"
    );
}

pub fn log_phase_complete(run_id: &str, phase: &str, duration_ms: u128) {
    info!(
        run_id = %run_id,
        phase = %phase,
        duration_ms = %duration_ms,
        "Phase execution completed"
    );
}

pub fn log_phase_error(run_id: &str, phase: &str, error_kind: &str, error: &str, duration_ms: u128) {
    error!(
        run_id = %run_id,
        phase = %phase,
        error_kind = %error_kind,
        duration_ms = %duration_ms,
        error = %error,
        "Phase execution failed"
    );
}

pub fn log_output_retry(run_id: &str, phase: &str, attempt: u32, reason: &str) {
    warn!(
        run_id = %run_id,
        phase = %phase,
        attempt = attempt,
        reason = %reason,
        "Stage output rejected; retrying"
    );
}

pub fn log_regeneration(run_id: &str, from: &str, to: &str, count: u32, limit: u32) {
    warn!(
        run_id = %run_id,
        from = %from,
        to = %to,
        regeneration_count = count,
        limit = limit,
        "Hard drift detected; regenerating"
    );
}

/// Soft drift never blocks; it is surfaced at warn level only.
pub fn log_soft_drift(run_id: &str, phase: &str, rule: &str, location: &str) {
    warn!(
        run_id = %run_id,
        phase = %phase,
        rule = %rule,
        location = %location,
        "Soft drift recorded"
    );
}

pub fn log_revision(run_id: &str, previous: Option<&str>, revision: &str, change: &str) {
    info!(
        run_id = %run_id,
        previous = previous.unwrap_or("none"),
        revision = %revision,
        change = %change,
        "Contract revision committed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_flags() {
        assert_eq!(LogFormat::from_flags(false, false), LogFormat::Compact);
        assert_eq!(LogFormat::from_flags(true, false), LogFormat::Verbose);
        assert_eq!(LogFormat::from_flags(true, true), LogFormat::Json);
        assert_eq!(LogFormat::from_flags(false, true), LogFormat::Json);
    }

    #[test]
    fn test_helpers_do_not_panic_without_subscriber() {
        let span = phase_span("run-1", "PLANNING", 1);
        let _entered = span.enter();
        log_phase_start("run-1", "PLANNING", "planner");
        log_output_retry("run-1", "PLANNING", 2, "markdown fence");
        log_soft_drift("run-1", "BACKEND_GENERATION", "undeclared_endpoint", "/health");
        log_regeneration("run-1", "VALIDATION", "SPEC_GENERATION", 1, 3);
        log_revision("run-1", Some("1.0.0"), "1.1.0", "spec_regen");
        log_phase_complete("run-1", "PLANNING", 12);
        log_phase_error("run-1", "PLANNING", "stage_timeout", "timed out", 30_000);
    }
}

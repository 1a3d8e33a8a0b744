//! CLI entry point and dispatch logic
//!
//! This module owns the `run()` function which:
//! - Parses CLI arguments
//! - Builds CliArgs and discovers Config
//! - Installs the tracing subscriber
//! - Creates the tokio runtime
//! - Dispatches to command handlers
//! - Handles all error output

use anyhow::Result;
use clap::Parser;

use super::args::{Cli, Commands};
use super::commands;

use crate::logging::{LogFormat, init_tracing};
use crate::{CliArgs, Config, ExitCode, FlowError, UserFriendlyError};

/// Main CLI execution function.
///
/// This function handles ALL output including errors. It returns `Result<(), ExitCode>`:
/// - On success: returns `Ok(())` after printing any output
/// - On error or a failed run: prints the report, returns `Err(ExitCode)`
///
/// main.rs only calls `std::process::exit(code.as_i32())` on error - it does NOT print.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    let cli_args = CliArgs {
        config_path: cli.config.clone(),
        phase_timeout_secs: cli.phase_timeout,
        max_regenerations: cli.max_regenerations,
        output_retries: cli.output_retries,
        lock_ttl_seconds: cli.lock_ttl_seconds,
        verbose: cli.verbose.then_some(true),
        schema_diff: cli.schema_diff,
    };

    // Pure commands need no configuration
    if let Commands::Revision { current, change } = &cli.command {
        return finish(commands::execute_revision_command(current, *change), "revision");
    }

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", report(&err, "config"));
            return Err(err.to_exit_code());
        }
    };

    let format = LogFormat::from_flags(config.verbose(), cli.log_json);
    if let Err(e) = init_tracing(format) {
        eprintln!("✗ Failed to initialize logging: {e}");
        return Err(ExitCode::INTERNAL);
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let operation = match &cli.command {
        Commands::Run { .. } => "run",
        Commands::Resume { .. } => "resume",
        Commands::Status { .. } => "status",
        Commands::Validate { .. } => "validate",
        Commands::Revision { .. } => "revision",
    };

    let result = rt.block_on(async {
        match cli.command {
            Commands::Run {
                id,
                request,
                iterate,
                force,
                json,
            } => commands::execute_run_command(&id, request, iterate, force, json, &config).await,
            Commands::Resume { id, force, json } => {
                commands::execute_resume_command(&id, force, json, &config).await
            }
            Commands::Status { id, json } => commands::execute_status_command(&id, json, &config),
            Commands::Validate {
                contract,
                report,
                kind,
                json,
            } => commands::execute_validate_command(&contract, &report, kind, json, &config),
            Commands::Revision { current, change } => {
                commands::execute_revision_command(&current, change)
            }
        }
    });

    finish(result, operation)
}

/// Map a command result to the process outcome, printing any error.
fn finish(result: Result<ExitCode>, operation: &str) -> Result<(), ExitCode> {
    match result {
        Ok(code) if code == ExitCode::SUCCESS => Ok(()),
        Ok(code) => Err(code),
        Err(error) => {
            if let Some(flow_error) = error.downcast_ref::<FlowError>() {
                eprintln!("{}", report(flow_error, operation));
                return Err(flow_error.to_exit_code());
            }
            eprintln!("✗ Unexpected error: {error:#}");
            eprintln!("\n  General troubleshooting:");
            eprintln!("    - Run with --verbose for more detailed output");
            eprintln!("    - Check that every configured stage command is installed");
            Err(ExitCode::INTERNAL)
        }
    }
}

/// `display_for_user()` plus the operation and error category.
fn report(error: &FlowError, operation: &str) -> String {
    format!(
        "{}\n[{operation}] {} error",
        error.display_for_user().trim_end(),
        error.category()
    )
}

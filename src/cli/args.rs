//! CLI argument definitions and parsing structures
//!
//! This module defines the command-line interface structure using clap,
//! including the main `Cli` struct and all subcommand enums.

use clap::{Parser, Subcommand, ValueEnum};
use contractflow_revision::ChangeKind;
use contractflow_validation::SchemaDiff;
use std::path::PathBuf;

/// contractflow - contract-first coordinator for generation pipelines
#[derive(Parser)]
#[command(name = "contractflow")]
#[command(about = "Drive planning, contract, backend and frontend stages through a validated state machine")]
#[command(long_about = r#"
contractflow turns a free-text request into a project plan, a versioned API
contract and backend and frontend implementations. Stages are external
commands that read their permitted documents as JSON on stdin and print one
JSON object on stdout.

EXAMPLES:
  # Start a run, reading the request from stdin
  echo "A todo app with users and tags" | contractflow run todo-app

  # Start a run with an inline request and JSON output
  contractflow run todo-app --request "A todo app" --json

  # Continue a failed run from its last stable phase
  contractflow resume todo-app

  # Show the state of a run
  contractflow status todo-app --json

  # Check a backend report against a contract
  contractflow validate --contract api_spec.json --report backend.json --kind backend

  # Compute the next contract revision
  contractflow revision 1.2.3 spec_regen

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > CONTRACTFLOW_* env > config file > defaults
  Config file is discovered by searching upward from CWD for .contractflow/config.toml
  Stages are configured under [stages.planner], [stages.spec], [stages.backend],
  [stages.frontend] and optionally [stages.validator]

PHASES:
  INIT → PLANNING → SPEC_GENERATION → BACKEND_GENERATION → FRONTEND_GENERATION → VALIDATION → COMPLETED
  Hard contract drift routes VALIDATION back to SPEC_GENERATION or PLANNING, bounded by max_regenerations
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Stage invocation timeout in seconds (default: 30)
    #[arg(long, global = true)]
    pub phase_timeout: Option<u64>,

    /// Maximum backward edges per run (default: 3)
    #[arg(long, global = true)]
    pub max_regenerations: Option<u32>,

    /// Retries after a malformed stage output (default: 1)
    #[arg(long, global = true)]
    pub output_retries: Option<u32>,

    /// Lock TTL in seconds (default: 900 = 15 minutes)
    #[arg(long, global = true)]
    pub lock_ttl_seconds: Option<u64>,

    /// Schema reference checking: off, reference (warnings) or strict (errors)
    #[arg(long, global = true)]
    pub schema_diff: Option<SchemaDiff>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which implementation report a `validate` call checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    Backend,
    Frontend,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start a run from a free-text request
    ///
    /// Drives every configured stage from PLANNING until the run completes
    /// or fails. The run document is persisted under the state home.
    ///
    /// EXAMPLES:
    ///   echo "A todo app" | contractflow run todo-app
    ///   contractflow run todo-app --request "A todo app" --json
    Run {
        /// Run identifier ([A-Za-z0-9._-])
        id: String,

        /// Request text; read from stdin when absent
        #[arg(long)]
        request: Option<String>,

        /// Iterate on the persisted run with this id instead of starting fresh
        #[arg(long)]
        iterate: bool,

        /// Force override of stale locks
        #[arg(long)]
        force: bool,

        /// Output the run outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resume a failed or interrupted run
    ///
    /// Starts a new attempt at the phase after the last stable one. The
    /// previous workflow state is archived in the run document.
    ///
    /// EXAMPLES:
    ///   contractflow resume todo-app
    ///   contractflow resume todo-app --json
    Resume {
        /// Run identifier to resume
        id: String,

        /// Force override of stale locks
        #[arg(long)]
        force: bool,

        /// Output the run outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show status of a run
    ///
    /// EXAMPLES:
    ///   contractflow status todo-app
    ///   contractflow status todo-app --json
    Status {
        /// Run identifier to check status for
        id: String,

        /// Output status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check an implementation report against a contract
    ///
    /// Exits with 11 when the report has blocking drift.
    ///
    /// EXAMPLES:
    ///   contractflow validate --contract api_spec.json --report backend.json --kind backend
    Validate {
        /// Contract file (`api_spec` document)
        #[arg(long)]
        contract: PathBuf,

        /// Report file (`backend_report` or `frontend_report` document)
        #[arg(long)]
        report: PathBuf,

        /// Kind of report
        #[arg(long, value_enum)]
        kind: ReportKind,

        /// Output the validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute the next contract revision
    ///
    /// EXAMPLES:
    ///   contractflow revision 1.2.3 bug_fix
    ///   contractflow revision 1.0.5 spec_regen
    Revision {
        /// Current revision (MAJOR.MINOR.PATCH)
        current: String,

        /// bug_fix, spec_regen or planner_regen
        change: ChangeKind,
    },
}

/// Build the clap command, for tests and completions.
pub fn build_cli() -> clap::Command {
    <Cli as clap::CommandFactory>::command()
}

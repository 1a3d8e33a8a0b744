//! Tests for CLI argument parsing

use clap::Parser;

use crate::cli::args::{Cli, Commands, ReportKind, build_cli};
use crate::ChangeKind;
use crate::validation::SchemaDiff;

#[test]
fn test_cli_definition_is_consistent() {
    build_cli().debug_assert();
}

#[test]
fn test_run_command_parses_flags() {
    let cli = Cli::try_parse_from([
        "contractflow",
        "run",
        "todo-app",
        "--request",
        "A todo app",
        "--iterate",
        "--json",
    ])
    .unwrap();

    match cli.command {
        Commands::Run {
            id,
            request,
            iterate,
            force,
            json,
        } => {
            assert_eq!(id, "todo-app");
            assert_eq!(request.as_deref(), Some("A todo app"));
            assert!(iterate);
            assert!(!force);
            assert!(json);
        }
        _ => panic!("expected run command"),
    }
}

#[test]
fn test_global_overrides_parse_after_subcommand() {
    let cli = Cli::try_parse_from([
        "contractflow",
        "resume",
        "todo-app",
        "--max-regenerations",
        "5",
        "--phase-timeout",
        "120",
        "--schema-diff",
        "strict",
        "-v",
    ])
    .unwrap();

    assert_eq!(cli.max_regenerations, Some(5));
    assert_eq!(cli.phase_timeout, Some(120));
    assert_eq!(cli.schema_diff, Some(SchemaDiff::Strict));
    assert!(cli.verbose);
    assert!(matches!(cli.command, Commands::Resume { .. }));
}

#[test]
fn test_revision_command_parses_change_kind() {
    let cli = Cli::try_parse_from(["contractflow", "revision", "1.2.3", "planner_regen"]).unwrap();
    match cli.command {
        Commands::Revision { current, change } => {
            assert_eq!(current, "1.2.3");
            assert_eq!(change, ChangeKind::PlannerRegen);
        }
        _ => panic!("expected revision command"),
    }
}

#[test]
fn test_unknown_change_kind_is_rejected() {
    assert!(Cli::try_parse_from(["contractflow", "revision", "1.2.3", "rewrite"]).is_err());
}

#[test]
fn test_validate_requires_kind() {
    assert!(
        Cli::try_parse_from([
            "contractflow",
            "validate",
            "--contract",
            "c.json",
            "--report",
            "r.json"
        ])
        .is_err()
    );

    let cli = Cli::try_parse_from([
        "contractflow",
        "validate",
        "--contract",
        "c.json",
        "--report",
        "r.json",
        "--kind",
        "frontend",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Commands::Validate {
            kind: ReportKind::Frontend,
            ..
        }
    ));
}

// tests/cli.rs

use std::path::PathBuf;

use clap::Parser;

use dagflow::cli::CliArgs;
use dagflow::config::default_config_path;
use dagflow_test_utils::logical_date;

#[test]
fn config_defaults_to_dagflow_toml() {
    let args = CliArgs::try_parse_from(["dagflow"]).unwrap();
    assert_eq!(args.config, default_config_path());
    assert_eq!(args.config, PathBuf::from("Dagflow.toml"));
    assert!(!args.dry_run);
    assert!(args.dag.is_none());
}

#[test]
fn flags_are_parsed() {
    let args = CliArgs::try_parse_from([
        "dagflow",
        "--config",
        "dags/prod.toml",
        "--dag",
        "etl",
        "--logical-date",
        "2024-01-01T00:00:00Z",
        "--parallelism",
        "3",
        "--dry-run",
    ])
    .unwrap();

    assert_eq!(args.config, PathBuf::from("dags/prod.toml"));
    assert_eq!(args.dag.as_deref(), Some("etl"));
    assert_eq!(args.effective_logical_date(), logical_date(2024, 1, 1));
    assert_eq!(args.parallelism, Some(3));
    assert!(args.dry_run);
}

#[test]
fn invalid_values_are_rejected() {
    assert!(CliArgs::try_parse_from(["dagflow", "--parallelism", "0"]).is_err());
    assert!(CliArgs::try_parse_from(["dagflow", "--logical-date", "yesterday"]).is_err());
}

//! Tests for command-line parsing

use std::time::Duration;

use clap::Parser;
use rstest::rstest;

use natskv::cli::args::{Cli, Commands, KvCommands};

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["nats"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).expect("arguments should parse")
}

fn kv(cli: &Cli) -> &KvCommands {
    match &cli.command {
        Commands::Kv { command } => command,
        other => panic!("expected kv command, got {other:?}"),
    }
}

#[test]
fn given_global_flags_after_subcommand_when_parsing_then_they_apply() {
    let cli = parse(&["kv", "get", "T", "X", "-s", "nats://a:4222", "--timeout", "2s"]);

    let overrides = cli.connection_overrides();
    assert_eq!(overrides.servers.as_deref(), Some("nats://a:4222"));
    assert_eq!(overrides.timeout.as_deref(), Some("2s"));
}

#[test]
fn given_put_without_value_when_parsing_then_value_is_absent() {
    let cli = parse(&["kv", "put", "T", "X"]);

    assert!(matches!(kv(&cli), KvCommands::Put { value: None, .. }));
}

#[test]
fn given_add_with_options_when_parsing_then_fields_are_set() {
    let cli = parse(&[
        "kv",
        "add",
        "T",
        "--history",
        "5",
        "--ttl",
        "2m",
        "--max-value-size",
        "1024",
    ]);

    match kv(&cli) {
        KvCommands::Add {
            bucket,
            history,
            ttl,
            max_value_size,
            max_bucket_size,
            replicas,
            ..
        } => {
            assert_eq!(bucket, "T");
            assert_eq!(*history, 5);
            assert_eq!(*ttl, Some(Duration::from_secs(120)));
            assert_eq!(*max_value_size, 1024);
            assert_eq!(*max_bucket_size, -1);
            assert_eq!(*replicas, 1);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn given_add_without_options_when_parsing_then_history_defaults_to_one() {
    let cli = parse(&["kv", "add", "T"]);

    assert!(matches!(
        kv(&cli),
        KvCommands::Add {
            history: 1,
            ttl: None,
            ..
        }
    ));
}

#[rstest]
#[case(&["kv", "update", "T", "X", "v", "notanumber"])]
#[case(&["kv", "add", "T", "--ttl", "forever"])]
#[case(&["kv", "get", "T"])]
#[case(&["kv", "frobnicate"])]
fn given_malformed_arguments_when_parsing_then_error(#[case] args: &[&str]) {
    let mut argv = vec!["nats"];
    argv.extend_from_slice(args);

    assert!(Cli::try_parse_from(argv).is_err());
}

#[test]
fn given_domain_alias_when_parsing_then_sets_js_domain() {
    let cli = parse(&["--domain", "hub", "kv", "ls"]);

    assert_eq!(cli.js_domain.as_deref(), Some("hub"));
}

#[test]
fn given_info_alias_when_parsing_then_status_command() {
    let cli = parse(&["kv", "info", "T"]);

    assert!(matches!(kv(&cli), KvCommands::Status { .. }));
}

#[test]
fn given_repeated_debug_flag_when_parsing_then_counts() {
    let cli = parse(&["-dd", "kv", "ls"]);

    assert_eq!(cli.debug, 2);
}

#[test]
fn given_no_trace_flag_when_building_overrides_then_trace_is_unset() {
    let cli = parse(&["kv", "ls"]);

    assert_eq!(cli.connection_overrides().trace, None);
    assert_eq!(parse(&["--trace", "kv", "ls"]).connection_overrides().trace, Some(true));
}

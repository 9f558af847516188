//! Command dispatch
//!
//! Every kv command validates its arguments first, asks for confirmation
//! where needed, and only then opens the store connection.

use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::CommandFactory;
use tracing::{debug, instrument};

use crate::application::services::{validate_bucket_config, validate_target};
use crate::cli::args::{Cli, Commands, ConfigCommands, KvCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, Settings};
use crate::domain::{validate_bucket, BucketConfig};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

/// Resolve settings when the command needs them, then execute it.
///
/// `setup_logging` receives the effective trace flag before dispatch.
/// Completions and `config init|path` skip settings loading, so they work
/// with a missing settings file or an unknown context.
pub fn run(cli: &Cli, setup_logging: impl FnOnce(bool)) -> CliResult<()> {
    let settings = if needs_settings(&cli.command) {
        Settings::load(&cli.load_options())?
    } else {
        Settings::default()
    };
    setup_logging(cli.trace || settings.connection.trace);
    debug!(
        "settings: servers={}, context={:?}",
        settings.connection.servers, settings.context
    );

    let container = ServiceContainer::new(settings);
    execute_command(cli, &container)
}

fn needs_settings(command: &Commands) -> bool {
    !matches!(
        command,
        Commands::Completion { .. }
            | Commands::Config {
                command: ConfigCommands::Init { .. } | ConfigCommands::Path
            }
    )
}

/// Execute the parsed CLI command, values going to stdout.
pub fn execute_command(cli: &Cli, container: &ServiceContainer) -> CliResult<()> {
    execute_command_to(cli, container, &mut io::stdout())
}

/// Execute the parsed CLI command, writing values to `out`.
pub fn execute_command_to(
    cli: &Cli,
    container: &ServiceContainer,
    out: &mut dyn Write,
) -> CliResult<()> {
    match &cli.command {
        Commands::Kv { command } => execute_kv(command, container, out),
        Commands::Config { command } => execute_config(command, cli, container),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(*shell, &mut cmd, name, out);
            Ok(())
        }
    }
}

fn execute_kv(cmd: &KvCommands, c: &ServiceContainer, out: &mut dyn Write) -> CliResult<()> {
    validate_kv_args(cmd)?;

    match cmd {
        KvCommands::Get { bucket, key, raw } => cmd_get(c, out, bucket, key, *raw),
        KvCommands::Put { bucket, key, value } => {
            cmd_put(c, out, bucket, key, value.as_deref())
        }
        KvCommands::Create { bucket, key, value } => {
            cmd_create(c, out, bucket, key, value.as_deref())
        }
        KvCommands::Update {
            bucket,
            key,
            value,
            revision,
        } => cmd_update(c, out, bucket, key, value, *revision),
        KvCommands::Del { bucket, key, force } => cmd_del(c, bucket, key, *force),
        KvCommands::Purge { bucket, key, force } => cmd_purge(c, bucket, key, *force),
        KvCommands::Add { bucket, .. } => cmd_add(c, &bucket_config(cmd, bucket)),
        KvCommands::Rm { bucket, force } => cmd_rm(c, bucket, *force),
        KvCommands::Status { bucket } => cmd_status(c, bucket),
        KvCommands::History { bucket, key } => cmd_history(c, bucket, key),
        KvCommands::Keys { bucket } => cmd_keys(c, bucket),
        KvCommands::Ls => cmd_ls(c),
    }
}

/// Reject malformed names and bucket settings before any connection is made.
fn validate_kv_args(cmd: &KvCommands) -> CliResult<()> {
    match cmd {
        KvCommands::Get { bucket, key, .. }
        | KvCommands::Put { bucket, key, .. }
        | KvCommands::Create { bucket, key, .. }
        | KvCommands::Update { bucket, key, .. }
        | KvCommands::Del { bucket, key, .. }
        | KvCommands::Purge { bucket, key, .. }
        | KvCommands::History { bucket, key } => validate_target(bucket, key)?,
        KvCommands::Add { bucket, .. } => validate_bucket_config(&bucket_config(cmd, bucket))?,
        KvCommands::Rm { bucket, .. }
        | KvCommands::Status { bucket }
        | KvCommands::Keys { bucket } => validate_bucket(bucket)?,
        KvCommands::Ls => {}
    }
    Ok(())
}

fn bucket_config(cmd: &KvCommands, bucket: &str) -> BucketConfig {
    let mut config = BucketConfig::new(bucket);
    if let KvCommands::Add {
        history,
        ttl,
        max_value_size,
        max_bucket_size,
        replicas,
        description,
        ..
    } = cmd
    {
        config.history = *history;
        config.max_age = ttl.unwrap_or_default();
        config.max_value_size = *max_value_size;
        config.max_bytes = *max_bucket_size;
        config.replicas = *replicas;
        config.description = description.clone();
    }
    config
}

/// The value argument, or all of stdin when it is absent.
fn read_value(value: Option<&str>) -> CliResult<Vec<u8>> {
    match value {
        Some(v) => Ok(v.as_bytes().to_vec()),
        None => {
            debug!("read_value: reading stdin");
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .map_err(|e| InfraError::io("read value from stdin", e))?;
            Ok(buf)
        }
    }
}

/// True when the action may go ahead. A decline is reported and is not an error.
fn confirmed(c: &ServiceContainer, force: bool, question: &str) -> CliResult<bool> {
    if force {
        return Ok(true);
    }
    let ok = c
        .prompter
        .confirm(question)
        .map_err(|e| InfraError::io("read confirmation", e))?;
    if !ok {
        output::warning("skipping");
    }
    Ok(ok)
}

fn print_value(out: &mut dyn Write, value: &[u8]) -> CliResult<()> {
    output::write_value(out, value).map_err(|e| InfraError::io("write value", e).into())
}

#[instrument(skip(c, out))]
fn cmd_get(
    c: &ServiceContainer,
    out: &mut dyn Write,
    bucket: &str,
    key: &str,
    raw: bool,
) -> CliResult<()> {
    let entry = c.kv_service()?.get(bucket, key)?;
    if raw {
        print_value(out, &entry.value)
    } else {
        output::write_entry(out, &entry).map_err(|e| InfraError::io("write entry", e).into())
    }
}

#[instrument(skip(c, out, value))]
fn cmd_put(
    c: &ServiceContainer,
    out: &mut dyn Write,
    bucket: &str,
    key: &str,
    value: Option<&str>,
) -> CliResult<()> {
    let value = read_value(value)?;
    c.kv_service()?.put(bucket, key, &value)?;
    print_value(out, &value)
}

#[instrument(skip(c, out, value))]
fn cmd_create(
    c: &ServiceContainer,
    out: &mut dyn Write,
    bucket: &str,
    key: &str,
    value: Option<&str>,
) -> CliResult<()> {
    let value = read_value(value)?;
    c.kv_service()?.create(bucket, key, &value)?;
    print_value(out, &value)
}

#[instrument(skip(c, out, value))]
fn cmd_update(
    c: &ServiceContainer,
    out: &mut dyn Write,
    bucket: &str,
    key: &str,
    value: &str,
    revision: u64,
) -> CliResult<()> {
    c.kv_service()?.update(bucket, key, value.as_bytes(), revision)?;
    print_value(out, value.as_bytes())
}

#[instrument(skip(c))]
fn cmd_del(c: &ServiceContainer, bucket: &str, key: &str, force: bool) -> CliResult<()> {
    if !confirmed(c, force, &format!("Delete key {bucket} > {key}?"))? {
        return Ok(());
    }
    c.kv_service()?.delete(bucket, key)?;
    Ok(())
}

#[instrument(skip(c))]
fn cmd_purge(c: &ServiceContainer, bucket: &str, key: &str, force: bool) -> CliResult<()> {
    if !confirmed(c, force, &format!("Purge key {bucket} > {key}?"))? {
        return Ok(());
    }
    c.kv_service()?.purge(bucket, key)?;
    Ok(())
}

#[instrument(skip(c))]
fn cmd_add(c: &ServiceContainer, config: &BucketConfig) -> CliResult<()> {
    let status = c.kv_service()?.add_bucket(config)?;
    output::bucket_status(&status);
    Ok(())
}

#[instrument(skip(c))]
fn cmd_rm(c: &ServiceContainer, bucket: &str, force: bool) -> CliResult<()> {
    if !confirmed(
        c,
        force,
        &format!("Delete bucket {bucket} and all its values?"),
    )? {
        return Ok(());
    }
    c.kv_service()?.remove_bucket(bucket)?;
    output::success(&format!("Deleted bucket {bucket}"));
    Ok(())
}

#[instrument(skip(c))]
fn cmd_status(c: &ServiceContainer, bucket: &str) -> CliResult<()> {
    let status = c.kv_service()?.status(bucket)?;
    output::bucket_status(&status);
    Ok(())
}

#[instrument(skip(c))]
fn cmd_history(c: &ServiceContainer, bucket: &str, key: &str) -> CliResult<()> {
    let entries = c.kv_service()?.history(bucket, key)?;
    output::history(&entries);
    Ok(())
}

#[instrument(skip(c))]
fn cmd_keys(c: &ServiceContainer, bucket: &str) -> CliResult<()> {
    let keys = c.kv_service()?.keys(bucket)?;
    if keys.is_empty() {
        output::warning(&format!("no keys found in bucket {bucket}"));
    }
    for key in keys {
        output::info(&key);
    }
    Ok(())
}

#[instrument(skip(c))]
fn cmd_ls(c: &ServiceContainer) -> CliResult<()> {
    let buckets = c.kv_service()?.list_buckets()?;
    if buckets.is_empty() {
        output::warning("no key-value buckets found");
    }
    for bucket in buckets {
        output::info(&bucket);
    }
    Ok(())
}

fn execute_config(cmd: &ConfigCommands, cli: &Cli, c: &ServiceContainer) -> CliResult<()> {
    match cmd {
        ConfigCommands::Show => {
            output::info(&c.settings.to_toml()?);
            Ok(())
        }
        ConfigCommands::Path => {
            match config_file_path(cli) {
                Some(path) => output::info(&path.display()),
                None => output::warning("no config directory for this platform"),
            }
            Ok(())
        }
        ConfigCommands::Init { force } => config_init(cli, *force),
    }
}

fn config_file_path(cli: &Cli) -> Option<PathBuf> {
    cli.config_file.clone().or_else(global_config_path)
}

#[instrument(skip(cli))]
fn config_init(cli: &Cli, force: bool) -> CliResult<()> {
    let path = config_file_path(cli)
        .ok_or_else(|| CliError::Usage("no config directory for this platform".to_string()))?;
    if path.exists() && !force {
        return Err(CliError::Usage(format!(
            "{} already exists, use --force to overwrite",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| InfraError::io(format!("create {}", parent.display()), e))?;
    }
    std::fs::write(&path, Settings::template())
        .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
    output::success(&format!("Created {}", path.display()));
    Ok(())
}

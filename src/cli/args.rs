//! CLI argument definitions using clap

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

use crate::config::{LoadOptions, RawConnectionSettings};
use crate::domain::{format_duration, parse_duration, DomainError};

/// NATS key-value utility
///
/// Reads and writes JetStream backed key-value buckets.
#[derive(Parser, Debug)]
#[command(name = "nats")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// NATS server urls
    #[arg(short = 's', long = "server", global = true, env = "NATS_URL", value_name = "NATS_URL")]
    pub server: Option<String>,

    /// Username or Token
    #[arg(long, global = true, env = "NATS_USER", value_name = "NATS_USER")]
    pub user: Option<String>,

    /// Password
    #[arg(
        long,
        global = true,
        env = "NATS_PASSWORD",
        value_name = "NATS_PASSWORD",
        hide_env_values = true
    )]
    pub password: Option<String>,

    /// User credentials
    #[arg(long, global = true, env = "NATS_CREDS", value_name = "NATS_CREDS", value_hint = ValueHint::FilePath)]
    pub creds: Option<PathBuf>,

    /// User NKEY
    #[arg(long, global = true, env = "NATS_NKEY", value_name = "NATS_NKEY", value_hint = ValueHint::FilePath)]
    pub nkey: Option<PathBuf>,

    /// TLS public certificate
    #[arg(long = "tlscert", global = true, env = "NATS_CERT", value_name = "NATS_CERT", value_hint = ValueHint::FilePath)]
    pub tls_cert: Option<PathBuf>,

    /// TLS private key
    #[arg(long = "tlskey", global = true, env = "NATS_KEY", value_name = "NATS_KEY", value_hint = ValueHint::FilePath)]
    pub tls_key: Option<PathBuf>,

    /// TLS certificate authority chain
    #[arg(long = "tlsca", global = true, env = "NATS_CA", value_name = "NATS_CA", value_hint = ValueHint::FilePath)]
    pub tls_ca: Option<PathBuf>,

    /// Time to wait on responses from NATS [default: 5s]
    #[arg(long, global = true, env = "NATS_TIMEOUT", value_name = "NATS_TIMEOUT", value_parser = parse_duration_arg)]
    pub timeout: Option<Duration>,

    /// Subject prefix for access to JetStream API
    #[arg(long, global = true, value_name = "PREFIX")]
    pub js_api_prefix: Option<String>,

    /// Subject prefix for access to JetStream Advisories
    #[arg(long, global = true, value_name = "PREFIX")]
    pub js_event_prefix: Option<String>,

    /// JetStream domain to access
    #[arg(long, global = true, value_name = "DOMAIN", alias = "domain")]
    pub js_domain: Option<String>,

    /// Configuration context
    #[arg(long, global = true, env = "NATS_CONTEXT")]
    pub context: Option<String>,

    /// Trace API interactions
    #[arg(long, global = true)]
    pub trace: bool,

    /// Settings file (default: $XDG_CONFIG_HOME/natskv/natskv.toml)
    #[arg(long = "config", global = true, env = "NATSKV_CONFIG", value_hint = ValueHint::FilePath)]
    pub config_file: Option<PathBuf>,

    /// Log verbosity (-d info, -dd debug, -ddd trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub debug: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Connection flags given on the command line, as a settings overlay.
    pub fn connection_overrides(&self) -> RawConnectionSettings {
        RawConnectionSettings {
            servers: self.server.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            creds: self.creds.clone(),
            nkey: self.nkey.clone(),
            tls_cert: self.tls_cert.clone(),
            tls_key: self.tls_key.clone(),
            tls_ca: self.tls_ca.clone(),
            timeout: self.timeout.map(format_duration),
            js_api_prefix: self.js_api_prefix.clone(),
            js_event_prefix: self.js_event_prefix.clone(),
            js_domain: self.js_domain.clone(),
            // Only an explicit --trace overrides the settings file
            trace: self.trace.then_some(true),
        }
    }

    /// Everything `Settings::load` needs from the command line.
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config_file.clone(),
            context: self.context.clone(),
            overrides: self.connection_overrides(),
        }
    }
}

fn parse_duration_arg(s: &str) -> Result<Duration, DomainError> {
    parse_duration(s)
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interacts with a JetStream based Key-Value store
    Kv {
        #[command(subcommand)]
        command: KvCommands,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum KvCommands {
    /// Gets a value for a key
    Get {
        /// The bucket to act on
        bucket: String,
        /// The key to act on
        key: String,
        /// Show only the value string
        #[arg(long)]
        raw: bool,
    },

    /// Puts a value into a key
    Put {
        /// The bucket to act on
        bucket: String,
        /// The key to act on
        key: String,
        /// The value to store, when absent reads STDIN
        value: Option<String>,
    },

    /// Puts a value into a key only if the key is new or its last operation was a delete
    Create {
        /// The bucket to act on
        bucket: String,
        /// The key to act on
        key: String,
        /// The value to store, when absent reads STDIN
        value: Option<String>,
    },

    /// Updates a key with a new value if the previous value matches the given revision
    Update {
        /// The bucket to act on
        bucket: String,
        /// The key to act on
        key: String,
        /// The value to store
        value: String,
        /// The revision of the previous value in the bucket
        revision: u64,
    },

    /// Deletes a key from the bucket, preserving history
    Del {
        /// The bucket to act on
        bucket: String,
        /// The key to act on
        key: String,
        /// Act without confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Deletes a key from the bucket, clearing history
    Purge {
        /// The bucket to act on
        bucket: String,
        /// The key to act on
        key: String,
        /// Act without confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Adds a new KV bucket
    Add {
        /// The bucket to act on
        bucket: String,
        /// How many historic values to keep per key
        #[arg(long, default_value_t = 1)]
        history: i64,
        /// How long to keep values for (0 keeps them forever)
        #[arg(long, value_parser = parse_duration_arg)]
        ttl: Option<Duration>,
        /// Maximum size for any single value (-1 for unlimited)
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        max_value_size: i32,
        /// Maximum size for the bucket (-1 for unlimited)
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        max_bucket_size: i64,
        /// How many replicas of the data to store
        #[arg(long, default_value_t = 1)]
        replicas: usize,
        /// A description for the bucket
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Removes a bucket
    Rm {
        /// The bucket to act on
        bucket: String,
        /// Act without confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// View the status of a KV bucket
    #[command(alias = "info")]
    Status {
        /// The bucket to act on
        bucket: String,
    },

    /// Shows the full history for a key
    History {
        /// The bucket to act on
        bucket: String,
        /// The key to act on
        key: String,
    },

    /// List the keys with a value in a bucket
    Keys {
        /// The bucket to act on
        bucket: String,
    },

    /// List buckets
    Ls,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective settings
    Show,

    /// Show the settings file path
    Path,

    /// Create a settings file template
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

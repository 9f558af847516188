//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Settings file: `$XDG_CONFIG_HOME/natskv/natskv.toml` (or `--config`)
//! 3. Selected context: `[contexts.<name>]` table in the settings file
//! 4. Environment variables: `NATSKV_*` prefix
//! 5. Command-line flags (and their `NATS_*` fallbacks)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;
use crate::domain::{expand_env_vars, parse_duration};

/// Default server when nothing else is configured.
pub const DEFAULT_SERVER: &str = "nats://127.0.0.1:4222";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolved connection settings handed to the store client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Comma separated server URLs
    pub servers: String,
    /// Username, or token when no password is set
    pub user: Option<String>,
    pub password: Option<String>,
    /// Credentials file (JWT + seed)
    pub creds: Option<PathBuf>,
    /// NKEY seed file
    pub nkey: Option<PathBuf>,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    pub tls_ca: Option<PathBuf>,
    #[serde(with = "crate::domain::duration::serde_str")]
    pub timeout: Duration,
    pub js_api_prefix: Option<String>,
    pub js_event_prefix: Option<String>,
    pub js_domain: Option<String>,
    /// Trace store interactions
    pub trace: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            servers: DEFAULT_SERVER.to_string(),
            user: None,
            password: None,
            creds: None,
            nkey: None,
            tls_cert: None,
            tls_key: None,
            tls_ca: None,
            timeout: DEFAULT_TIMEOUT,
            js_api_prefix: None,
            js_event_prefix: None,
            js_domain: None,
            trace: false,
        }
    }
}

/// Raw connection settings for intermediate parsing (every field optional).
///
/// Used for file layers, contexts and command-line overrides alike:
/// - `None` → field not specified, inherit from base
/// - `Some(..)` → explicit value, replaces base
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RawConnectionSettings {
    pub servers: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub creds: Option<PathBuf>,
    pub nkey: Option<PathBuf>,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    pub tls_ca: Option<PathBuf>,
    /// Duration string, e.g. "5s"
    pub timeout: Option<String>,
    pub js_api_prefix: Option<String>,
    pub js_event_prefix: Option<String>,
    pub js_domain: Option<String>,
    pub trace: Option<bool>,
}

/// Raw settings file for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    #[serde(flatten)]
    pub connection: RawConnectionSettings,
    /// Context used when `--context` is not given
    pub default_context: Option<String>,
    pub contexts: BTreeMap<String, RawConnectionSettings>,
}

impl ConnectionSettings {
    /// Overlay wins for every field it specifies.
    pub fn merge(&self, overlay: &RawConnectionSettings) -> Result<Self, ApplicationError> {
        let timeout = match &overlay.timeout {
            Some(raw) => parse_duration(raw).map_err(|e| ApplicationError::Config {
                message: format!("timeout: {e}"),
            })?,
            None => self.timeout,
        };

        Ok(Self {
            servers: overlay
                .servers
                .clone()
                .unwrap_or_else(|| self.servers.clone()),
            user: overlay.user.clone().or_else(|| self.user.clone()),
            password: overlay.password.clone().or_else(|| self.password.clone()),
            creds: overlay.creds.clone().or_else(|| self.creds.clone()),
            nkey: overlay.nkey.clone().or_else(|| self.nkey.clone()),
            tls_cert: overlay.tls_cert.clone().or_else(|| self.tls_cert.clone()),
            tls_key: overlay.tls_key.clone().or_else(|| self.tls_key.clone()),
            tls_ca: overlay.tls_ca.clone().or_else(|| self.tls_ca.clone()),
            timeout,
            js_api_prefix: overlay
                .js_api_prefix
                .clone()
                .or_else(|| self.js_api_prefix.clone()),
            js_event_prefix: overlay
                .js_event_prefix
                .clone()
                .or_else(|| self.js_event_prefix.clone()),
            js_domain: overlay
                .js_domain
                .clone()
                .or_else(|| self.js_domain.clone()),
            trace: overlay.trace.unwrap_or(self.trace),
        })
    }

    /// A JetStream domain implies its own API prefix, so the two are exclusive.
    fn check_jetstream_target(&self) -> Result<(), ApplicationError> {
        if let (Some(domain), Some(prefix)) = (&self.js_domain, &self.js_api_prefix) {
            return Err(ApplicationError::Config {
                message: format!(
                    "js_domain {domain:?} and js_api_prefix {prefix:?} cannot be combined"
                ),
            });
        }
        Ok(())
    }

    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        for path in [
            &mut self.creds,
            &mut self.nkey,
            &mut self.tls_cert,
            &mut self.tls_key,
            &mut self.tls_ca,
        ]
        .into_iter()
        .flatten()
        {
            *path = PathBuf::from(expand_env_vars(path.to_string_lossy().as_ref()));
        }
    }
}

/// Inputs for `Settings::load` that come from the command line.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit settings file; must exist when given
    pub config_path: Option<PathBuf>,
    /// Context name (`--context` / `NATS_CONTEXT`)
    pub context: Option<String>,
    /// Connection flags given on the command line
    pub overrides: RawConnectionSettings,
}

/// Unified configuration.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Settings {
    /// Context the connection settings were taken from
    pub context: Option<String>,
    pub connection: ConnectionSettings,
}

/// Get the XDG config directory.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "natskv").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global settings file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("natskv.toml"))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. Settings file (`--config`, else `$XDG_CONFIG_HOME/natskv/natskv.toml` if present)
    /// 3. Selected context (`--context`, else the file's `default_context`)
    /// 4. Environment variables: `NATSKV_*` prefix
    /// 5. Command-line flags
    pub fn load(options: &LoadOptions) -> Result<Self, ApplicationError> {
        Self::load_with_env(options, Environment::with_prefix("NATSKV"))
    }

    fn load_with_env(options: &LoadOptions, env: Environment) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut connection = ConnectionSettings::default();

        // 2. Settings file
        let raw = match &options.config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ApplicationError::Config {
                        message: format!("settings file not found: {}", path.display()),
                    });
                }
                load_raw_settings(path)?
            }
            None => match global_config_path() {
                Some(path) if path.exists() => load_raw_settings(&path)?,
                _ => RawSettings::default(),
            },
        };
        connection = connection.merge(&raw.connection)?;

        // 3. Context
        let context = options
            .context
            .clone()
            .or_else(|| raw.default_context.clone());
        if let Some(name) = &context {
            let overlay = raw.contexts.get(name).ok_or_else(|| ApplicationError::Config {
                message: format!("unknown context: {name}"),
            })?;
            debug!("load: applying context {}", name);
            connection = connection.merge(overlay)?;
        }

        // 4. Environment variables
        connection = apply_env_overrides(connection, env)?;

        // 5. Command-line flags
        connection = connection.merge(&options.overrides)?;

        // Expand ~ and $VAR in path-like fields
        connection.expand_paths();
        connection.check_jetstream_target()?;

        Ok(Self {
            context,
            connection,
        })
    }

    /// Show the effective configuration as TOML, password masked.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        let mut shown = self.clone();
        if shown.connection.password.is_some() {
            shown.connection.password = Some("********".to_string());
        }
        toml::to_string_pretty(&shown).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template settings file.
    pub fn template() -> String {
        r#"# natskv settings
#
# Locations (by precedence, lowest to highest):
#   File:    ~/.config/natskv/natskv.toml (or --config)
#   Context: [contexts.<name>] below, picked by --context or default_context
#   Env:     NATSKV_* environment variables
#   Flags:   --server, --user, ... (and NATS_URL, NATS_USER, ...)

# servers = "nats://127.0.0.1:4222"
# timeout = "5s"
# user = "alice"
# password = "secret"
# creds = "~/.nkeys/creds/alice.creds"
# nkey = "~/.nkeys/alice.nk"
# tls_cert = "~/certs/client.pem"
# tls_key = "~/certs/client-key.pem"
# tls_ca = "~/certs/ca.pem"
# js_domain = "hub"

# default_context = "local"

# [contexts.local]
# servers = "nats://127.0.0.1:4222"

# [contexts.prod]
# servers = "nats://a.example.net:4222,nats://b.example.net:4222"
# creds = "$HOME/.nkeys/prod.creds"
"#
        .to_string()
    }
}

/// Apply `NATSKV_*` environment variables as explicit overrides.
fn apply_env_overrides(
    settings: ConnectionSettings,
    env: Environment,
) -> Result<ConnectionSettings, ApplicationError> {
    let config = Config::builder()
        .add_source(env.prefix_separator("_").separator("__"))
        .build()
        .map_err(config_err)?;

    let get = |key: &str| config.get_string(key).ok();
    let overlay = RawConnectionSettings {
        servers: get("servers"),
        user: get("user"),
        password: get("password"),
        creds: get("creds").map(PathBuf::from),
        nkey: get("nkey").map(PathBuf::from),
        tls_cert: get("tls_cert").map(PathBuf::from),
        tls_key: get("tls_key").map(PathBuf::from),
        tls_ca: get("tls_ca").map(PathBuf::from),
        timeout: get("timeout"),
        js_api_prefix: get("js_api_prefix"),
        js_event_prefix: get("js_event_prefix"),
        js_domain: get("js_domain"),
        trace: config.get_bool("trace").ok(),
    };
    settings.merge(&overlay)
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

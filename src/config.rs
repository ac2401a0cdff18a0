//! Configuration handling for the MySQL gateway.
//!
//! Databases come from two sources, merged in order: the JSON config file
//! (`--config`) and repeated `--database LABEL=URI` arguments. The merged
//! entries are resolved into an ordered list of [`ConnectionDescriptor`]s by
//! [`resolve_descriptors`].

use crate::models::connection::{
    ConnectTarget, ConnectionConfigError, ConnectionDescriptor, DEFAULT_MYSQL_PORT,
    DEFAULT_POOL_SIZE, TlsSettings,
};
use crate::models::query::DEFAULT_QUERY_TIMEOUT_SECS;
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use url::Url;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Errors raised while loading or resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Positional so the offending URI (and its password) is never echoed.
    #[error("Invalid --database argument #{position}: {message}")]
    InvalidArgument { position: usize, message: String },

    #[error("Database '{label}': {message}")]
    InvalidEntry { label: String, message: String },

    #[error(transparent)]
    Descriptor(#[from] ConnectionConfigError),

    #[error("Database '{label}' selected with --only is not configured. Available: {}", available.join(", "))]
    OnlyNotFound {
        label: String,
        available: Vec<String>,
    },

    #[error("No databases configured. Use --config FILE or --database LABEL=URI")]
    NoDatabases,
}

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// Streamable HTTP (for remote clients)
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Config file layout: `{"databases": [ ... ]}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub databases: Vec<DatabaseEntry>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// One unresolved database entry, from the config file or a CLI argument.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseEntry {
    pub label: String,
    pub uri: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub ssl: Option<TlsSettings>,
    pub read_only: Option<bool>,
    pub enabled: Option<bool>,
    pub pool_size: Option<u32>,
}

impl fmt::Debug for DatabaseEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseEntry")
            .field("label", &self.label)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("read_only", &self.read_only)
            .field("enabled", &self.enabled)
            .field("pool_size", &self.pool_size)
            .finish_non_exhaustive()
    }
}

/// Options carried in a URI's query string. They are stripped before the
/// URI reaches the driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct UriOptions {
    read_only: Option<bool>,
    enabled: Option<bool>,
    pool_size: Option<u32>,
}

impl DatabaseEntry {
    /// Query-string keys consumed by the gateway.
    const URI_OPTION_KEYS: &'static [&'static str] = &["read_only", "enabled", "pool_size"];

    /// Parse a `--database` argument.
    ///
    /// # Format
    ///
    /// ```text
    /// shop=mysql://reader:pw@db:3306/shop                 # read-only
    /// shop=mysql://reader:pw@db:3306/shop?read_only=false # writable session
    /// mysql://reader:pw@db:3306/shop?pool_size=10         # label "shop"
    /// ```
    ///
    /// Without an explicit label, the database name becomes the label.
    pub fn parse_arg(arg: &str, position: usize) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidArgument { position, message };

        // Only an '=' before "://" separates the label.
        let scheme_pos = arg.find("://").unwrap_or(arg.len());
        let (explicit_label, uri) = match arg[..scheme_pos].find('=') {
            Some(idx) => (Some(arg[..idx].trim()), &arg[idx + 1..]),
            None => (None, arg),
        };

        let url = Url::parse(uri).map_err(|e| invalid(format!("invalid URI: {e}")))?;
        let label = match explicit_label {
            Some(label) => label.to_string(),
            None => db_name(&url).ok_or_else(|| {
                invalid("a label is required when the URI names no database (use LABEL=URI)".into())
            })?,
        };

        Ok(Self {
            label,
            uri: Some(uri.to_string()),
            ..Default::default()
        })
    }

    /// Turn the entry into a descriptor. Explicit entry fields win over URI
    /// query options. The result is not yet validated.
    pub fn into_descriptor(self) -> Result<ConnectionDescriptor, ConfigError> {
        let label = self.label;
        let entry_error = |message: &str| ConfigError::InvalidEntry {
            label: label.clone(),
            message: message.to_string(),
        };

        let has_host_fields = self.host.is_some() || self.user.is_some() || self.database.is_some();
        let (target, uri_options) = match (self.uri, has_host_fields) {
            (Some(_), true) => {
                return Err(entry_error(
                    "specify either uri or host/user/database, not both",
                ));
            }
            (Some(uri), false) => {
                let mut url = Url::parse(&uri)
                    .map_err(|e| entry_error(&format!("invalid uri: {e}")))?;
                let opts = extract_options(&mut url, Self::URI_OPTION_KEYS);
                let uri_options = parse_uri_options(opts).map_err(|m| entry_error(&m))?;
                (
                    ConnectTarget::Uri {
                        uri: url.to_string(),
                    },
                    uri_options,
                )
            }
            (None, true) => (
                ConnectTarget::Host {
                    host: self.host.unwrap_or_default(),
                    port: self.port.unwrap_or(DEFAULT_MYSQL_PORT),
                    user: self.user.unwrap_or_default(),
                    password: self.password,
                    database: self.database.unwrap_or_default(),
                },
                UriOptions::default(),
            ),
            (None, false) => {
                return Err(entry_error("either uri or host/user/database is required"));
            }
        };

        let mut descriptor = ConnectionDescriptor::new(label.clone(), target)
            .with_read_only(self.read_only.or(uri_options.read_only).unwrap_or(true))
            .with_enabled(self.enabled.or(uri_options.enabled).unwrap_or(true))
            .with_pool_size(
                self.pool_size
                    .or(uri_options.pool_size)
                    .unwrap_or(DEFAULT_POOL_SIZE),
            );
        if let Some(tls) = self.ssl {
            descriptor = descriptor.with_tls(tls);
        }
        Ok(descriptor)
    }
}

/// Extract gateway options from URL query params, keeping others for the driver.
fn extract_options(url: &mut Url, keys: &[&str]) -> HashMap<String, String> {
    let mut opts = HashMap::new();
    let remaining: Vec<(String, String)> = url
        .query_pairs()
        .filter_map(|(k, v)| {
            let key_lower = k.to_ascii_lowercase();
            if keys.contains(&key_lower.as_str()) {
                opts.insert(key_lower, v.into_owned());
                None
            } else {
                Some((k.into_owned(), v.into_owned()))
            }
        })
        .collect();

    if remaining.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(remaining);
    }
    opts
}

fn parse_uri_options(mut opts: HashMap<String, String>) -> Result<UriOptions, String> {
    let parse_bool = |key: &str, value: String| match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(format!("{key} must be true or false, got '{value}'")),
    };
    Ok(UriOptions {
        read_only: opts
            .remove("read_only")
            .map(|v| parse_bool("read_only", v))
            .transpose()?,
        enabled: opts
            .remove("enabled")
            .map(|v| parse_bool("enabled", v))
            .transpose()?,
        pool_size: opts
            .remove("pool_size")
            .map(|v| {
                v.parse::<u32>()
                    .map_err(|_| format!("pool_size must be a number, got '{v}'"))
            })
            .transpose()?,
    })
}

fn db_name(url: &Url) -> Option<String> {
    url.path()
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Resolve raw entries into the ordered, validated descriptor list.
///
/// Steps, in order: drop disabled entries, validate the rest, keep the first
/// of any duplicated label (with a warning), then apply the `only` filter.
pub fn resolve_descriptors(
    entries: Vec<DatabaseEntry>,
    only: Option<&str>,
) -> Result<Vec<ConnectionDescriptor>, ConfigError> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(entries.len());

    for entry in entries {
        if entry.enabled == Some(false) {
            continue;
        }
        let descriptor = entry.into_descriptor()?;
        if !descriptor.enabled {
            continue;
        }
        descriptor.validate()?;
        if !seen.insert(descriptor.label.clone()) {
            warn!(
                database = %descriptor.label,
                "Duplicate database label; keeping the first definition"
            );
            continue;
        }
        resolved.push(descriptor);
    }

    if let Some(only) = only {
        let available: Vec<String> = resolved.iter().map(|d| d.label.clone()).collect();
        resolved.retain(|d| d.label == only);
        if resolved.is_empty() {
            return Err(ConfigError::OnlyNotFound {
                label: only.to_string(),
                available,
            });
        }
    }

    if resolved.is_empty() {
        return Err(ConfigError::NoDatabases);
    }
    Ok(resolved)
}

/// Configuration for the MySQL gateway.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mysql-gateway-mcp",
    about = "MCP gateway exposing read-only query tools over a fleet of MySQL databases",
    version,
    author
)]
pub struct Config {
    /// JSON config file with a "databases" list
    #[arg(short = 'c', long = "config", value_name = "FILE", env = "MCP_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Databases as LABEL=URI. Add ?read_only=false for writable sessions.
    /// Can be specified multiple times or comma-separated.
    #[arg(
        short = 'd',
        long = "database",
        value_name = "LABEL=URI",
        env = "MCP_DATABASE",
        value_delimiter = ','
    )]
    pub databases: Vec<String>,

    /// Expose only this database label
    #[arg(long = "only", value_name = "LABEL", env = "MCP_ONLY_DATABASE")]
    pub only: Option<String>,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "MCP_HTTP_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "MCP_HTTP_PORT"
    )]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_MCP_ENDPOINT,
        env = "MCP_ENDPOINT"
    )]
    pub mcp_endpoint: String,

    /// Default query timeout in seconds (max 300)
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "MCP_QUERY_TIMEOUT"
    )]
    pub query_timeout: u32,

    /// Pool acquire timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "MCP_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// How long a retired or shutting-down pool may take to drain, in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_DRAIN_TIMEOUT_SECS,
        env = "MCP_DRAIN_TIMEOUT"
    )]
    pub drain_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,

    /// Enable logging output (disabled by default to avoid interfering with stdio transport)
    #[arg(long, env = "MCP_ENABLE_LOGS")]
    pub enable_logs: bool,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            config_file: None,
            databases: Vec::new(),
            only: None,
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT_SECS,
            log_level: "info".to_string(),
            json_logs: false,
            enable_logs: false,
        }
    }

    /// Read every configured source and resolve the descriptor list.
    ///
    /// Called at startup and again on each reload signal.
    pub fn load_descriptors(&self) -> Result<Vec<ConnectionDescriptor>, ConfigError> {
        let mut entries = match &self.config_file {
            Some(path) => ConfigFile::load(path)?.databases,
            None => Vec::new(),
        };
        for (i, arg) in self.databases.iter().enumerate() {
            entries.push(DatabaseEntry::parse_arg(arg, i + 1)?);
        }
        resolve_descriptors(entries, self.only.as_deref())
    }

    /// Logs go to stderr; stdio keeps them off unless explicitly enabled.
    pub fn logging_enabled(&self) -> bool {
        self.enable_logs || self.transport == TransportMode::Http
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn drain_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.drain_timeout)
    }

    pub fn idle_timeout_duration(&self) -> Duration {
        Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

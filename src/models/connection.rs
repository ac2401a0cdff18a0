//! Connection descriptors and pool fingerprints.
//!
//! A [`ConnectionDescriptor`] is the resolved, validated configuration for one
//! database label. Descriptors are immutable once resolved; a configuration
//! reload produces a fresh list rather than mutating existing entries.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const DEFAULT_POOL_SIZE: u32 = 5;
pub const MIN_POOL_SIZE: u32 = 1;
pub const MAX_POOL_SIZE: u32 = 100;

/// Where a pool connects to: a full URI or discrete host fields.
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    Uri {
        uri: String,
    },
    Host {
        host: String,
        port: u16,
        user: String,
        password: Option<String>,
        database: String,
    },
}

impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print credentials, even in debug output.
        f.debug_tuple("ConnectTarget")
            .field(&self.masked())
            .finish()
    }
}

impl ConnectTarget {
    /// Display-safe `host:port/database`. Credentials are never included.
    pub fn masked(&self) -> String {
        match self {
            Self::Uri { uri } => match url::Url::parse(uri) {
                Ok(url) => {
                    let host = url.host_str().unwrap_or("localhost");
                    let port = url.port().unwrap_or(DEFAULT_MYSQL_PORT);
                    let database = url.path().trim_start_matches('/');
                    format!("{}:{}/{}", host, port, database)
                }
                Err(_) => "<invalid uri>".to_string(),
            },
            Self::Host {
                host,
                port,
                database,
                ..
            } => format!("{}:{}/{}", host, port, database),
        }
    }
}

/// MySQL TLS negotiation mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SslMode {
    Disabled,
    #[default]
    Preferred,
    Required,
    VerifyCa,
    VerifyIdentity,
}

impl SslMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Preferred => "preferred",
            Self::Required => "required",
            Self::VerifyCa => "verify_ca",
            Self::VerifyIdentity => "verify_identity",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsSettings {
    #[serde(default)]
    pub mode: SslMode,
    /// CA certificate (PEM)
    #[serde(default)]
    pub ca: Option<PathBuf>,
    /// Client certificate (PEM)
    #[serde(default)]
    pub cert: Option<PathBuf>,
    /// Client private key (PEM)
    #[serde(default)]
    pub key: Option<PathBuf>,
}

/// Digest of every descriptor field that affects pool construction.
///
/// Used only for equality comparison between the descriptor a pool was built
/// from and the current descriptor for the same label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolFingerprint(String);

impl PoolFingerprint {
    /// Short prefix suitable for log fields.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolved configuration for one database label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub label: String,
    pub target: ConnectTarget,
    pub tls: Option<TlsSettings>,
    /// Default: true
    pub read_only: bool,
    /// Default: true
    pub enabled: bool,
    /// Maximum connections in this label's pool (1-100)
    pub pool_size: u32,
}

impl ConnectionDescriptor {
    /// Create a descriptor with defaults (read-only, enabled, pool size 5).
    pub fn new(label: impl Into<String>, target: ConnectTarget) -> Self {
        Self {
            label: label.into(),
            target,
            tls: None,
            read_only: true,
            enabled: true,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }

    /// Convenience constructor for a URI target.
    pub fn from_uri(label: impl Into<String>, uri: impl Into<String>) -> Self {
        Self::new(label, ConnectTarget::Uri { uri: uri.into() })
    }

    pub fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Check label syntax, pool bounds and target completeness.
    pub fn validate(&self) -> Result<(), ConnectionConfigError> {
        if self.label.is_empty() {
            return Err(ConnectionConfigError::EmptyLabel);
        }
        if !self
            .label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConnectionConfigError::InvalidLabel(self.label.clone()));
        }
        if !(MIN_POOL_SIZE..=MAX_POOL_SIZE).contains(&self.pool_size) {
            return Err(ConnectionConfigError::PoolSizeOutOfRange {
                label: self.label.clone(),
                pool_size: self.pool_size,
            });
        }
        match &self.target {
            ConnectTarget::Uri { uri } => {
                let lower = uri.to_ascii_lowercase();
                if !(lower.starts_with("mysql://") || lower.starts_with("mariadb://")) {
                    return Err(ConnectionConfigError::UnsupportedScheme {
                        label: self.label.clone(),
                    });
                }
            }
            ConnectTarget::Host {
                host,
                user,
                database,
                ..
            } => {
                let missing = [("host", host), ("user", user), ("database", database)]
                    .into_iter()
                    .find(|(_, value)| value.is_empty());
                if let Some((field, _)) = missing {
                    return Err(ConnectionConfigError::MissingField {
                        label: self.label.clone(),
                        field,
                    });
                }
            }
        }
        Ok(())
    }

    /// Compute the pool fingerprint. `read_only` and `enabled` are excluded:
    /// they govern how connections are used, not how the pool is built.
    pub fn fingerprint(&self) -> PoolFingerprint {
        let mut hasher = Sha256::new();
        match &self.target {
            ConnectTarget::Uri { uri } => {
                hash_field(&mut hasher, b"uri");
                hash_field(&mut hasher, uri.as_bytes());
            }
            ConnectTarget::Host {
                host,
                port,
                user,
                password,
                database,
            } => {
                hash_field(&mut hasher, b"host");
                hash_field(&mut hasher, host.as_bytes());
                hash_field(&mut hasher, &port.to_be_bytes());
                hash_field(&mut hasher, user.as_bytes());
                hash_optional(&mut hasher, password.as_deref().map(str::as_bytes));
                hash_field(&mut hasher, database.as_bytes());
            }
        }
        match &self.tls {
            Some(tls) => {
                hash_field(&mut hasher, b"tls");
                hash_field(&mut hasher, tls.mode.as_str().as_bytes());
                for path in [&tls.ca, &tls.cert, &tls.key] {
                    let bytes = path.as_ref().map(|p| p.to_string_lossy().into_owned());
                    hash_optional(&mut hasher, bytes.as_deref().map(str::as_bytes));
                }
            }
            None => hash_field(&mut hasher, b"no-tls"),
        }
        hash_field(&mut hasher, &self.pool_size.to_be_bytes());
        PoolFingerprint(hex::encode(hasher.finalize()))
    }

    /// Display-safe target (`host:port/database`).
    pub fn masked_target(&self) -> String {
        self.target.masked()
    }
}

/// Length-prefixed so adjacent fields cannot run together.
fn hash_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

fn hash_optional(hasher: &mut Sha256, bytes: Option<&[u8]>) {
    match bytes {
        Some(bytes) => {
            hasher.update([1u8]);
            hash_field(hasher, bytes);
        }
        None => hasher.update([0u8]),
    }
}

/// Errors that can occur when validating a connection descriptor.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionConfigError {
    #[error("Database label cannot be empty")]
    EmptyLabel,

    #[error("Database label contains invalid characters: {0} (allowed: A-Z a-z 0-9 _ -)")]
    InvalidLabel(String),

    #[error("Database '{label}': pool_size {pool_size} is out of range (1-100)")]
    PoolSizeOutOfRange { label: String, pool_size: u32 },

    #[error("Database '{label}': connection URI must use the mysql:// or mariadb:// scheme")]
    UnsupportedScheme { label: String },

    #[error("Database '{label}': '{field}' is required when no uri is given")]
    MissingField { label: String, field: &'static str },
}

/// Public view of a configured database, returned by `list_databases`.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DatabaseSummary {
    pub database: String,
    /// host:port/database, credentials masked
    pub target: String,
    pub read_only: bool,
    pub pool_size: u32,
    /// Whether a pool has been built for this label yet
    pub pool_active: bool,
}

/// Outcome of probing one database.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct HealthReport {
    pub database: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

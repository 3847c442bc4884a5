//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:9008").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Base URL prefixed to every blob download URL.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// How many files of a batch upload are stored at the same time.
    #[serde(default = "default_batch_upload_concurrency")]
    pub batch_upload_concurrency: usize,
    /// Answer cross-origin requests from any origin.
    #[serde(default = "default_cors_enabled")]
    pub cors_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:9008".to_string()
}

fn default_public_base_url() -> String {
    "http://blober.io".to_string()
}

fn default_max_upload_bytes() -> u64 {
    1024 * 1024 * 1024 // 1 GiB
}

fn default_batch_upload_concurrency() -> usize {
    4
}

fn default_cors_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_base_url: default_public_base_url(),
            max_upload_bytes: default_max_upload_bytes(),
            batch_upload_concurrency: default_batch_upload_concurrency(),
            cors_enabled: default_cors_enabled(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_upload_concurrency == 0 {
            return Err("server.batch_upload_concurrency must be at least 1".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("server.max_upload_bytes must be greater than 0".to_string());
        }
        if self.public_base_url.trim().is_empty() {
            return Err("server.public_base_url cannot be empty".to_string());
        }
        Ok(())
    }

    /// Download URL base without a trailing slash.
    pub fn public_base_url(&self) -> &str {
        self.public_base_url.trim_end_matches('/')
    }
}

/// Object storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage, one directory per namespace.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// S3-compatible storage, one bucket per namespace.
    S3 {
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region, also used as the bucket location constraint.
        region: Option<String>,
        /// Optional prefix prepended to every bucket name.
        bucket_prefix: Option<String>,
        /// AWS access key ID. Falls back to the default credential chain if not set.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to the default credential chain if not set.
        secret_access_key: Option<String>,
        /// Force path-style URLs. Required for MinIO and most S3-compatible services.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                bucket_prefix,
                ..
            } => {
                match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                    (Some(_), Some(_)) | (None, None) => {}
                    _ => {
                        return Err("s3 config requires both access_key_id and \
                             secret_access_key when either is set"
                            .to_string());
                    }
                }
                let prefix_ok = bucket_prefix.as_deref().is_none_or(|prefix| {
                    prefix
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
                });
                if !prefix_ok {
                    return Err(
                        "s3 bucket_prefix may only contain lowercase letters, digits and '-'"
                            .to_string(),
                    );
                }
                Ok(())
            }
            StorageConfig::Filesystem { path } => {
                if path.as_os_str().is_empty() {
                    return Err("filesystem storage path cannot be empty".to_string());
                }
                Ok(())
            }
        }
    }
}

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Relational store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database (development and small deployments).
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL. Takes precedence over the individual fields.
        url: Option<String>,
        host: Option<String>,
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        username: Option<String>,
        /// Prefer BLOBER_METADATA__PASSWORD over storing this in a file.
        password: Option<String>,
        database: Option<String>,
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
}

fn default_max_connections() -> u32 {
    10
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/blober.db"),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { .. } => Ok(()),
            MetadataConfig::Postgres {
                url,
                host,
                database,
                max_connections,
                ..
            } => {
                if *max_connections == 0 {
                    return Err("postgres max_connections must be at least 1".to_string());
                }
                match (url.as_ref(), host.as_ref(), database.as_ref()) {
                    (Some(_), _, _) => Ok(()),
                    (None, Some(_), Some(_)) => Ok(()),
                    (None, None, _) => Err(
                        "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                    ),
                    (None, Some(_), None) => Err(
                        "postgres config requires 'database' when using individual fields"
                            .to_string(),
                    ),
                }
            }
        }
    }
}

/// Session and blob cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory of the session cache database.
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
    /// Directory of the blob metadata cache database.
    #[serde(default = "default_blob_path")]
    pub blob_path: PathBuf,
    /// Sessions older than this are removed by the sweeper.
    #[serde(default = "default_session_lifetime_secs")]
    pub session_lifetime_secs: u64,
    /// Time between two sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_session_path() -> PathBuf {
    PathBuf::from("./data/sessions")
}

fn default_blob_path() -> PathBuf {
    PathBuf::from("./data/blobs")
}

fn default_session_lifetime_secs() -> u64 {
    2 * 24 * 3600 // 2 days
}

fn default_sweep_interval_secs() -> u64 {
    20 * 60 // 20 minutes
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            session_path: default_session_path(),
            blob_path: default_blob_path(),
            session_lifetime_secs: default_session_lifetime_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl CacheConfig {
    /// Session lifetime as a `time::Duration`.
    pub fn session_lifetime(&self) -> Duration {
        // Saturate at i64::MAX to prevent overflow wrapping to negative
        let secs = i64::try_from(self.session_lifetime_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }

    /// Sweep interval as a `std::time::Duration`.
    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }

    /// Validate cache configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        // tokio::time::interval panics on a zero period
        if self.sweep_interval_secs == 0 {
            return Err("cache.sweep_interval_secs cannot be 0".to_string());
        }
        if self.session_lifetime_secs == 0 {
            return Err("cache.session_lifetime_secs cannot be 0".to_string());
        }
        if self.session_path == self.blob_path {
            return Err("cache.session_path and cache.blob_path must differ".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses filesystem storage and SQLite metadata
    /// under `./data`; tests normally point the paths at a temp directory.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig {
                public_base_url: "http://blober.test".to_string(),
                ..ServerConfig::default()
            },
            ..Self::default()
        }
    }

    /// Validate every section, prefixing errors with the section name.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.storage
            .validate()
            .map_err(|e| format!("invalid storage config: {e}"))?;
        self.metadata
            .validate()
            .map_err(|e| format!("invalid metadata config: {e}"))?;
        self.cache.validate()?;
        Ok(())
    }
}

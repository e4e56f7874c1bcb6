//! Configuration management for the server.

use colsync_engine::Schema;
use std::env;
use std::path::PathBuf;

/// Body limit for uploads when `MAX_UPLOAD_BYTES` is unset. Data values are
/// base64 encoded, so this admits a few tens of megabytes of raw bytes.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL; logs are kept in memory only when unset
    pub database_url: Option<String>,
    /// Upper bound on pooled database connections
    pub db_max_connections: u32,
    /// Largest request body accepted by the upload endpoint
    pub max_upload_bytes: usize,
    /// JSON file holding the object schema; the standard collection
    /// schema is used when unset
    pub schema_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());
        let db_max_connections = match env::var("DB_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidMaxConnections(raw))?,
            Err(_) => 10,
        };
        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidMaxUploadBytes(raw))?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };
        let schema_path = env::var("SCHEMA_PATH").ok().map(PathBuf::from);

        Ok(Self {
            host,
            port,
            database_url,
            db_max_connections,
            max_upload_bytes,
            schema_path,
        })
    }

    /// Load the schema partitions are validated against.
    pub fn load_schema(&self) -> Result<Schema, ConfigError> {
        let Some(path) = &self.schema_path else {
            return Ok(Schema::collection_sync_object());
        };
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::SchemaRead {
            path: path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            database_url: None,
            db_max_connections: 10,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            schema_path: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid DB_MAX_CONNECTIONS value: {0:?}")]
    InvalidMaxConnections(String),

    #[error("Invalid MAX_UPLOAD_BYTES value: {0:?}")]
    InvalidMaxUploadBytes(String),

    #[error("Cannot read schema file {path:?}: {source}")]
    SchemaRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid schema file: {0}")]
    SchemaParse(#[from] serde_json::Error),
}

//! Product service configuration.
//!
//! Configuration is loaded from environment variables (and a `.env` file,
//! when present) with fallback to defaults.
//!
//! | Variable                     | Default          |
//! |------------------------------|------------------|
//! | `PORT`                       | `8080`           |
//! | `HOST`                       | `0.0.0.0`        |
//! | `CATALOG_BACKEND`            | `relational`     |
//! | `CATALOG_DB_PATH`            | `./catalog.db`   |
//! | `CATALOG_DB_MAX_CONNECTIONS` | `5`              |
//! | `CATALOG_KV_TABLE_PREFIX`    | `catalog_`       |
//! | `CATALOG_KV_STORE`           | `dynamodb`       |
//! | `AWS_REGION`                 | *(AWS chain)*    |
//! | `CATALOG_KV_ENDPOINT`        | *(AWS default)*  |
//! | `CATALOG_CORS_ORIGINS`       | *(any origin)*   |

use std::env;

use catalog_db::{BackendConfig, DbConfig, KvConfig, KvStore};

/// Product service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP listen address
    pub host: String,

    /// HTTP listen port
    pub port: u16,

    /// Storage strategy and its settings
    pub backend: BackendConfig,

    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = var("PORT", "8080")
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?;

        let backend = match var("CATALOG_BACKEND", "relational").trim() {
            "relational" | "sqlite" => {
                let max_connections = var("CATALOG_DB_MAX_CONNECTIONS", "5")
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("CATALOG_DB_MAX_CONNECTIONS".to_string()))?;
                if max_connections == 0 {
                    return Err(ConfigError::InvalidValue(
                        "CATALOG_DB_MAX_CONNECTIONS".to_string(),
                    ));
                }
                BackendConfig::Relational(
                    DbConfig::new(var("CATALOG_DB_PATH", "./catalog.db"))
                        .max_connections(max_connections),
                )
            }
            "kv" => {
                let store = match var("CATALOG_KV_STORE", "dynamodb").trim() {
                    "dynamodb" => KvStore::DynamoDb,
                    "memory" => KvStore::Memory,
                    other => return Err(ConfigError::UnknownStore(other.to_string())),
                };
                let mut kv = KvConfig::new(var("CATALOG_KV_TABLE_PREFIX", "catalog_")).store(store);
                if let Some(region) = lookup("AWS_REGION").filter(|r| !r.trim().is_empty()) {
                    kv = kv.region(region.trim());
                }
                if let Some(endpoint) = lookup("CATALOG_KV_ENDPOINT").filter(|e| !e.trim().is_empty()) {
                    kv = kv.endpoint(endpoint.trim());
                }
                BackendConfig::KeyValue(kv)
            }
            other => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        let cors_origins = lookup("CATALOG_CORS_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(ServiceConfig {
            host: var("HOST", "0.0.0.0"),
            port,
            backend,
            cors_origins,
        })
    }

    /// Socket address string for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Unknown CATALOG_BACKEND '{0}' (expected relational or kv)")]
    UnknownBackend(String),

    #[error("Unknown CATALOG_KV_STORE '{0}' (expected dynamodb or memory)")]
    UnknownStore(String),
}

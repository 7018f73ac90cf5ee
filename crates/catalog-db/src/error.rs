//! # Storage Error Types
//!
//! Error types for catalog storage operations, shared by the relational
//! and key-value strategies.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error            KvError-ish failures       CoreError           │
//! │  (SQLite)               (condition, serde)         (domain rules)      │
//! │       │                        │                        │               │
//! │       └────────────┬───────────┴────────────────────────┘               │
//! │                    ▼                                                    │
//! │  DbError (this module) ← categorized, kind() → ErrorKind               │
//! │                    │                                                    │
//! │                    ▼                                                    │
//! │  ApiError (product-service) ← status code chosen from ErrorKind        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use catalog_core::{CoreError, ErrorKind};
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found, or soft deleted.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting or updating to a SKU that is already taken
    /// - Same for any slug
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A key-value conditional write found its condition false.
    ///
    /// Repositories translate this into a domain error (not found,
    /// insufficient stock, duplicate) before it leaves the crate.
    #[error("Conditional check failed on {table}/{key}")]
    ConditionFailed { table: String, key: String },

    /// Backend connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Stored data could not be converted to or from an entity.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal storage error.
    #[error("Internal storage error: {0}")]
    Internal(String),

    /// Domain rule violation detected while executing the operation.
    #[error(transparent)]
    Domain(#[from] CoreError),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// A unique attribute is taken, once the offending value is known.
    ///
    /// Raw `UNIQUE` failures arrive as [`DbError::UniqueViolation`] with the
    /// column only; repositories restate them through this constructor.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::Domain(CoreError::Duplicate {
            field: field.into(),
            value: value.into(),
        })
    }

    /// Returns the category of this error.
    ///
    /// ## Mapping
    /// ```text
    /// NotFound                         → NotFound
    /// UniqueViolation, ConditionFailed → Conflict
    /// ForeignKeyViolation              → Validation
    /// Domain(e)                        → e.kind()
    /// everything else                  → Storage
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound { .. } => ErrorKind::NotFound,
            DbError::UniqueViolation { .. } | DbError::ConditionFailed { .. } => {
                ErrorKind::Conflict
            }
            DbError::ForeignKeyViolation { .. } => ErrorKind::Validation,
            DbError::Domain(e) => e.kind(),
            DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::Serialization(_)
            | DbError::PoolExhausted
            | DbError::Internal(_) => ErrorKind::Storage,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::ColumnDecode   → DbError::Serialization
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: products.sku"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .and_then(|column| column.rsplit('.').next())
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DbError::Serialization(err.to_string())
            }

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

/// Result type for storage operations.
pub type DbResult<T> = Result<T, DbError>;

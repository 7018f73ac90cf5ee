//! # Key-Value Backend
//!
//! The catalog stored as JSON items in three key-value tables, with
//! filtering done by scan conditions plus an in-memory residual.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  KvConfig { table_prefix: "catalog_", store: DynamoDb, region, .. }     │
//! │                                                                         │
//! │  catalog_products     { "id": "...", "sku": "...", "price": 299, ... }  │
//! │  catalog_departments  { "id": "...", "slug": "...", ... }              │
//! │  catalog_categories   { "id": "...", "parent_id": null, "level": 0 }   │
//! │                                                                         │
//! │  Items are the serde_json form of the catalog-core entities, so both   │
//! │  backends share one serialized shape.                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`expr`] - Condition and update expressions
//! - [`table`] - `KvTable` contract and `MemoryTable`
//! - [`dynamo`] - `DynamoTable`, the DynamoDB store
//! - [`catalog`] - `KeyValueCatalog`, the facade implementation

pub mod catalog;
pub mod dynamo;
pub mod expr;
pub mod table;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{DbError, DbResult};

pub use catalog::KeyValueCatalog;
pub use dynamo::DynamoTable;
pub use expr::{Condition, UpdateAction, UpdateExpr};
pub use table::{KvTable, MemoryTable};

/// A stored item: a JSON object.
pub type Item = serde_json::Map<String, Value>;

/// Partition key attribute of every table.
pub const KEY_ATTR: &str = "id";

/// Where key-value tables live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KvStore {
    /// Process memory; lost on restart. Tests and local runs.
    #[default]
    Memory,
    /// Amazon DynamoDB, or an endpoint speaking its API.
    DynamoDb,
}

impl KvStore {
    pub fn name(&self) -> &'static str {
        match self {
            KvStore::Memory => "memory",
            KvStore::DynamoDb => "dynamodb",
        }
    }
}

/// Key-value backend configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = KvConfig::new("catalog_")
///     .store(KvStore::DynamoDb)
///     .region("eu-west-1")
///     .endpoint("http://localhost:8000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvConfig {
    /// Prepended to every table name.
    /// Default: "catalog_"
    pub table_prefix: String,

    /// Default: memory
    pub store: KvStore,

    /// AWS region; the provider chain decides when unset.
    pub region: Option<String>,

    /// Endpoint override, e.g. DynamoDB Local.
    pub endpoint: Option<String>,
}

impl KvConfig {
    pub fn new(table_prefix: impl Into<String>) -> Self {
        KvConfig {
            table_prefix: table_prefix.into(),
            store: KvStore::default(),
            region: None,
            endpoint: None,
        }
    }

    pub fn store(mut self, store: KvStore) -> Self {
        self.store = store;
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn table_name(&self, entity: &str) -> String {
        format!("{}{}", self.table_prefix, entity)
    }
}

impl Default for KvConfig {
    fn default() -> Self {
        KvConfig::new("catalog_")
    }
}

/// Serializes an entity into an item.
pub fn to_item<T: Serialize>(value: &T) -> DbResult<Item> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(DbError::Serialization(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Deserializes an item back into an entity.
pub fn from_item<T: DeserializeOwned>(item: Item) -> DbResult<T> {
    Ok(serde_json::from_value(Value::Object(item))?)
}

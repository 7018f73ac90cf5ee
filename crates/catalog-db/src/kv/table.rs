//! # Key-Value Tables
//!
//! The [`KvTable`] contract and its in-process implementation,
//! [`MemoryTable`]. The durable implementation lives in
//! [`dynamo`](super::dynamo).
//!
//! ## Atomicity
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update_item(key, update, condition)                                    │
//! │                                                                         │
//! │      ┌──────── write lock held ────────┐                               │
//! │      │  read item                       │                               │
//! │      │  evaluate condition ── false ──► ConditionFailed                │
//! │      │  apply update                    │                               │
//! │      │  store item                      │                               │
//! │      └──────────────────────────────────┘                               │
//! │                                                                         │
//! │  Concurrent callers on the same table serialize on the lock, so a      │
//! │  guarded stock decrement can never overdraw.                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::trace;

use super::expr::{Condition, UpdateExpr};
use super::{Item, KEY_ATTR};
use crate::error::{DbError, DbResult};

/// A table of JSON items keyed by their `id` attribute.
#[async_trait]
pub trait KvTable: Send + Sync {
    /// Table name, used in errors and logs.
    fn name(&self) -> &str;

    /// Confirms the table is reachable.
    async fn check(&self) -> DbResult<()> {
        Ok(())
    }

    async fn get_item(&self, key: &str) -> DbResult<Option<Item>>;

    /// Every item matching `filter`, in key order.
    async fn scan(&self, filter: Option<&Condition>) -> DbResult<Vec<Item>>;

    /// Stores `item`, replacing any item with the same key.
    async fn put_item(&self, item: Item, condition: Option<&Condition>) -> DbResult<()>;

    /// Applies `update` to the item under `key` and returns the new item.
    ///
    /// An absent item with no condition is created as `{ "id": key }` first.
    async fn update_item(
        &self,
        key: &str,
        update: &UpdateExpr,
        condition: Option<&Condition>,
    ) -> DbResult<Item>;

    async fn delete_item(&self, key: &str) -> DbResult<()>;
}

/// In-memory [`KvTable`]. Clones share the same data.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    items: Arc<RwLock<BTreeMap<String, Item>>>,
}

impl MemoryTable {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryTable {
            name: name.into(),
            items: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Number of stored items, soft-deleted ones included.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    fn condition_failed(&self, key: &str) -> DbError {
        DbError::ConditionFailed {
            table: self.name.clone(),
            key: key.to_string(),
        }
    }
}

pub(crate) fn item_key(item: &Item) -> DbResult<String> {
    match item.get(KEY_ATTR) {
        Some(Value::String(key)) if !key.is_empty() => Ok(key.clone()),
        _ => Err(DbError::Serialization(format!(
            "item has no string '{KEY_ATTR}' attribute"
        ))),
    }
}

#[async_trait]
impl KvTable for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_item(&self, key: &str) -> DbResult<Option<Item>> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn scan(&self, filter: Option<&Condition>) -> DbResult<Vec<Item>> {
        let items = self.items.read().await;
        let matched: Vec<Item> = items
            .values()
            .filter(|item| filter.map_or(true, |c| c.evaluate(Some(*item))))
            .cloned()
            .collect();

        trace!(table = %self.name, scanned = items.len(), matched = matched.len(), "Scan");
        Ok(matched)
    }

    async fn put_item(&self, item: Item, condition: Option<&Condition>) -> DbResult<()> {
        let key = item_key(&item)?;
        let mut items = self.items.write().await;

        if let Some(condition) = condition {
            if !condition.evaluate(items.get(&key)) {
                return Err(self.condition_failed(&key));
            }
        }

        items.insert(key, item);
        Ok(())
    }

    async fn update_item(
        &self,
        key: &str,
        update: &UpdateExpr,
        condition: Option<&Condition>,
    ) -> DbResult<Item> {
        let mut items = self.items.write().await;

        if let Some(condition) = condition {
            if !condition.evaluate(items.get(key)) {
                return Err(self.condition_failed(key));
            }
        }

        let item = items.entry(key.to_string()).or_insert_with(|| {
            let mut fresh = Item::new();
            fresh.insert(KEY_ATTR.to_string(), Value::String(key.to_string()));
            fresh
        });
        update.apply(item);

        Ok(item.clone())
    }

    async fn delete_item(&self, key: &str) -> DbResult<()> {
        self.items.write().await.remove(key);
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

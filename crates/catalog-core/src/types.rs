//! # Domain Types
//!
//! Catalog entities shared by both storage strategies.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Catalog Entities                                │
//! │                                                                         │
//! │  ┌─────────────────┐        ┌─────────────────┐                        │
//! │  │   Department    │◄───────│    Product      │                        │
//! │  │  ─────────────  │        │  ─────────────  │                        │
//! │  │  id (UUID)      │        │  id (UUID)      │                        │
//! │  │  slug (unique)  │        │  sku, slug      │                        │
//! │  └─────────────────┘        │  price (cents)  │                        │
//! │                             │  stock/min_stock│                        │
//! │  ┌─────────────────┐        │  department_id  │                        │
//! │  │    Category     │◄───────│  category_id    │                        │
//! │  │  ─────────────  │        └─────────────────┘                        │
//! │  │  parent_id ─────┼──┐                                                 │
//! │  │  level          │◄─┘  self-reference, root level = 0                │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity has an immutable `id` (UUID v4 string) plus a mutable,
//! human-readable unique key (`slug`, and `sku` for products).
//!
//! ## Timestamps
//! `created_at`/`updated_at` serialize as RFC3339 in every backend.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// Physical size of a product. All values are non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

/// A sellable catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub original_price: Option<Money>,
    pub images: Vec<String>,
    pub category_id: String,
    pub department_id: String,
    pub brand: String,
    pub unit: String,
    /// Units on hand. Never negative.
    pub stock: i64,
    /// Reorder threshold.
    pub min_stock: i64,
    pub weight: f64,
    pub weight_unit: String,
    pub dimensions: Dimensions,
    pub is_on_sale: bool,
    /// Percentage, 0-100.
    pub discount: Option<f64>,
    /// Average review score, 0-5.
    pub rating: f64,
    pub reviews: i64,
    pub is_active: bool,
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Department
// =============================================================================

/// Top-level grouping of products (e.g. "Dairy").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub image: String,
    pub slug: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Category
// =============================================================================

/// A node in the category tree.
///
/// `level` is derived, never supplied by clients. See [`crate::category`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub parent_id: Option<String>,
    pub level: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Listing
// =============================================================================

/// One page of a filtered product listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductListResponse {
    pub products: Vec<Product>,
    /// Matching records before pagination.
    pub total_count: i64,
    pub limit: i64,
    pub offset: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i64, min_stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: "p-1".into(),
            sku: "MILK-1L".into(),
            slug: "milk-1l".into(),
            name: "Whole Milk 1L".into(),
            description: String::new(),
            price: Money::from_cents(199),
            original_price: None,
            images: Vec::new(),
            category_id: "c-1".into(),
            department_id: "d-1".into(),
            brand: "Farm".into(),
            unit: "bottle".into(),
            stock,
            min_stock,
            weight: 1030.0,
            weight_unit: "g".into(),
            dimensions: Dimensions::default(),
            is_on_sale: false,
            discount: None,
            rating: 0.0,
            reviews: 0,
            is_active: true,
            tags: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_product_json_uses_cents_and_rfc3339() {
        let p = product(3, 1);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["price"], 199);
        assert!(json["original_price"].is_null());
        let created = json["created_at"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(created).is_ok());
    }
}

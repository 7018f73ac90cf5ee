//! # Product Filter
//!
//! Turns a caller's [`ProductFilter`] into a backend-neutral
//! [`ProductPredicate`] plus a clamped [`Pagination`].
//!
//! ## Translation Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ProductFilter { brand: "Farm", in_stock: true, search: "Milk" }       │
//! │       │                                                                 │
//! │       ▼  to_predicate()                                                │
//! │  ProductPredicate [Active, BrandIs("Farm"), InStock, Search("milk")]   │
//! │       │                                                                 │
//! │       ├──► relational: WHERE is_active = 1 AND brand = ?               │
//! │       │                  AND stock > 0 AND (instr(lower(name),?) > 0 ..)│
//! │       │                                                                 │
//! │       └──► key-value:  scan(is_active = true AND brand = :v AND        │
//! │                             stock > 0)  then search in memory          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - Every clause is AND-ed; absent fields add nothing.
//! - Empty strings count as absent. A search of only whitespace is absent
//!   too; any other search text is used exactly as given, spaces included.
//! - Search folds Unicode case (`str::to_lowercase`) on both sides.
//! - `in_stock = false` and `is_on_sale = false` add nothing. There is no way
//!   to ask for "definitely not on sale".
//! - `tags` is accepted but produces no clause.
//! - `Active` is always present.
//!
//! [`ProductPredicate::matches`] is the reference semantics every backend
//! translation must agree with.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::Product;

/// Page size used when the caller gives none (or a non-positive one).
pub const DEFAULT_LIMIT: i64 = 20;

/// Largest page a caller may request.
pub const MAX_LIMIT: i64 = 100;

// =============================================================================
// Filter (input)
// =============================================================================

/// Listing query as supplied by a caller. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFilter {
    pub category_id: Option<String>,
    pub department_id: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub in_stock: Option<bool>,
    pub is_on_sale: Option<bool>,
    pub min_rating: Option<f64>,
    pub search: Option<String>,
    /// Accepted for compatibility, not evaluated by any backend.
    pub tags: Vec<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl ProductFilter {
    /// Builds the predicate, always including the active-only clause.
    pub fn to_predicate(&self) -> ProductPredicate {
        let mut predicate = ProductPredicate::active_only();

        if let Some(id) = present(&self.category_id) {
            predicate.push(Clause::CategoryIs(id.to_string()));
        }
        if let Some(id) = present(&self.department_id) {
            predicate.push(Clause::DepartmentIs(id.to_string()));
        }
        if let Some(brand) = present(&self.brand) {
            predicate.push(Clause::BrandIs(brand.to_string()));
        }
        if let Some(min) = self.min_price {
            predicate.push(Clause::PriceAtLeast(min));
        }
        if let Some(max) = self.max_price {
            predicate.push(Clause::PriceAtMost(max));
        }
        if self.in_stock == Some(true) {
            predicate.push(Clause::InStock);
        }
        if self.is_on_sale == Some(true) {
            predicate.push(Clause::OnSale);
        }
        if let Some(rating) = self.min_rating.filter(|r| !r.is_nan()) {
            predicate.push(Clause::RatingAtLeast(rating));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            predicate.push(Clause::Search(search.to_lowercase()));
        }

        predicate
    }

    /// Pagination with defaults and clamping applied.
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// A normalized page window.
///
/// ## Clamping
/// ```text
/// limit:  None | <= 0  → 20
///         > 100        → 100
/// offset: None | < 0   → 0
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        let limit = match limit {
            Some(l) if l <= 0 => DEFAULT_LIMIT,
            Some(l) => l.min(MAX_LIMIT),
            None => DEFAULT_LIMIT,
        };
        let offset = offset.unwrap_or(0).max(0);
        Pagination { limit, offset }
    }

    /// Applies offset then limit to an already filtered and ordered list.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination::new(None, None)
    }
}

// =============================================================================
// Predicate (output)
// =============================================================================

/// One selection constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `is_active == true`.
    Active,
    CategoryIs(String),
    DepartmentIs(String),
    BrandIs(String),
    /// Inclusive lower price bound.
    PriceAtLeast(Money),
    /// Inclusive upper price bound.
    PriceAtMost(Money),
    /// `stock > 0`.
    InStock,
    /// `is_on_sale == true`.
    OnSale,
    RatingAtLeast(f64),
    /// Lowercased needle matched against name, description, sku, brand
    /// and slug.
    Search(String),
}

impl Clause {
    /// Evaluates the clause against a single product.
    pub fn matches(&self, product: &Product) -> bool {
        match self {
            Clause::Active => product.is_active,
            Clause::CategoryIs(id) => product.category_id == *id,
            Clause::DepartmentIs(id) => product.department_id == *id,
            Clause::BrandIs(brand) => product.brand == *brand,
            Clause::PriceAtLeast(min) => product.price >= *min,
            Clause::PriceAtMost(max) => product.price <= *max,
            Clause::InStock => product.stock > 0,
            Clause::OnSale => product.is_on_sale,
            Clause::RatingAtLeast(min) => product.rating >= *min,
            Clause::Search(needle) => search_fields(product)
                .iter()
                .any(|field| field.to_lowercase().contains(needle.as_str())),
        }
    }

    /// False only for clauses a key-value scan cannot push down.
    pub fn is_native(&self) -> bool {
        !matches!(self, Clause::Search(_))
    }
}

/// Fields covered by free-text search.
pub fn search_fields(product: &Product) -> [&str; 5] {
    [
        product.name.as_str(),
        product.description.as_str(),
        product.sku.as_str(),
        product.brand.as_str(),
        product.slug.as_str(),
    ]
}

/// Separates fields in [`search_text`].
pub const SEARCH_FIELD_SEPARATOR: char = '\u{1f}';

/// Lowercased search fields joined by [`SEARCH_FIELD_SEPARATOR`].
///
/// Storage that cannot fold Unicode case itself keeps this next to the
/// record and matches a [`Clause::Search`] needle with a substring test.
pub fn search_text(product: &Product) -> String {
    let fields: Vec<String> = search_fields(product)
        .iter()
        .map(|field| field.to_lowercase())
        .collect();
    fields.join(&SEARCH_FIELD_SEPARATOR.to_string())
}

/// Conjunction of clauses.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductPredicate {
    clauses: Vec<Clause>,
}

impl ProductPredicate {
    /// The minimal predicate: active records only.
    pub fn active_only() -> Self {
        ProductPredicate {
            clauses: vec![Clause::Active],
        }
    }

    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, clause: Clause) -> Self {
        self.push(clause);
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Clauses a backend can evaluate natively.
    pub fn native_clauses(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter().filter(|c| c.is_native())
    }

    /// Clauses that must be evaluated after retrieval on a scan backend.
    pub fn residual_clauses(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter().filter(|c| !c.is_native())
    }

    pub fn matches(&self, product: &Product) -> bool {
        self.clauses.iter().all(|c| c.matches(product))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

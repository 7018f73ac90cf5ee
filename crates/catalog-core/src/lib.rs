//! # catalog-core: Pure Domain Logic for the Catalog Service
//!
//! Entities, validation, the product predicate and the category tree rules.
//! Nothing in this crate performs I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Catalog Service Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 product-service (axum HTTP)                     │   │
//! │  │     /products  /departments  /categories  → JSON envelopes     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                   catalog-db (storage)                          │   │
//! │  │   CatalogService → CatalogRepository ─┬─ relational (SQLite)   │   │
//! │  │                                       └─ key-value (KvTable)   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ catalog-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌────────┐ │   │
//! │  │  │  types  │ │ requests │ │  filter  │ │ category │ │ money  │ │   │
//! │  │  │ Product │ │ DTOs +   │ │ Filter → │ │ levels + │ │ cents  │ │   │
//! │  │  │ Dept/Cat│ │ changes  │ │ Predicate│ │ cycles   │ │        │ │   │
//! │  │  └─────────┘ └──────────┘ └──────────┘ └──────────┘ └────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Product, Department, Category, ProductListResponse
//! - [`money`] - Integer-cent prices
//! - [`requests`] - Create/update DTOs and typed change lists
//! - [`filter`] - ProductFilter → ProductPredicate, pagination clamping
//! - [`category`] - Tree level and re-parent rules
//! - [`validation`] - Field rules
//! - [`error`] - Error kinds and domain errors
//!
//! ## Example Usage
//!
//! ```rust
//! use catalog_core::filter::{Clause, ProductFilter};
//! use catalog_core::Money;
//!
//! let filter = ProductFilter {
//!     max_price: Some(Money::from_cents(500)),
//!     in_stock: Some(true),
//!     ..Default::default()
//! };
//!
//! let predicate = filter.to_predicate();
//! assert_eq!(predicate.clauses()[0], Clause::Active);
//! assert_eq!(predicate.clauses().len(), 3);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod category;
pub mod error;
pub mod filter;
pub mod money;
pub mod requests;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError, ValidationErrors};
pub use filter::{Clause, Pagination, ProductFilter, ProductPredicate};
pub use money::Money;
pub use requests::*;
pub use types::*;

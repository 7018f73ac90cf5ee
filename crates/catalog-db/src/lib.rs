//! # catalog-db: Storage Layer for the Catalog Service
//!
//! One repository facade with two interchangeable storage strategies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Catalog Data Flow                                │
//! │                                                                         │
//! │  HTTP handler (GET /product-service/products?search=milk)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   catalog-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   CatalogService ──► Arc<dyn CatalogRepository>                 │   │
//! │  │                           │                                     │   │
//! │  │            ┌──────────────┴───────────────┐                     │   │
//! │  │            ▼                              ▼                     │   │
//! │  │   ┌─────────────────┐          ┌──────────────────────┐        │   │
//! │  │   │ RelationalCatalog│          │   KeyValueCatalog    │        │   │
//! │  │   │ (repository/)   │          │   (kv/)              │        │   │
//! │  │   │ SqlitePool      │          │   KvTable × 3        │        │   │
//! │  │   │ migrations      │          │   DynamoDB | memory  │        │   │
//! │  │   └─────────────────┘          └──────────────────────┘        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`backend`] - `BackendConfig` and `open_catalog`
//! - [`service`] - Validating `CatalogService`
//! - [`repository`] - `CatalogRepository` trait and the SQL implementation
//! - [`kv`] - Key-value tables and the key-value implementation
//! - [`pool`] - SQLite connection pool
//! - [`migrations`] - Embedded schema migrations
//! - [`error`] - Storage error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use catalog_db::{open_catalog, BackendConfig, CatalogService, DbConfig};
//!
//! let repo = open_catalog(BackendConfig::Relational(DbConfig::new("./catalog.db"))).await?;
//! let service = CatalogService::new(repo);
//!
//! let page = service.search_products("milk", ProductFilter::default()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backend;
pub mod error;
pub mod kv;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use backend::{open_catalog, BackendConfig};
pub use error::{DbError, DbResult};
pub use kv::{DynamoTable, KeyValueCatalog, KvConfig, KvStore};
pub use pool::{Database, DbConfig};
pub use repository::relational::RelationalCatalog;
pub use repository::CatalogRepository;
pub use service::CatalogService;

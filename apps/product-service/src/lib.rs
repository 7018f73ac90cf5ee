//! # product-service
//!
//! HTTP boundary for the product catalog. Handlers only translate between
//! JSON and [`catalog_db::CatalogService`]; every rule lives below them.
//!
//! ## Module Organization
//! - [`config`] - `ServiceConfig` from the environment
//! - [`routes`] - Router, CORS and tracing layers
//! - [`handlers`] - One module per resource
//! - [`error`] - `ApiError` → status + JSON envelope
//! - [`state`] - Shared handler state

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::{ConfigError, ServiceConfig};
pub use error::{ApiError, ApiResult};
pub use routes::build_router;
pub use state::AppState;

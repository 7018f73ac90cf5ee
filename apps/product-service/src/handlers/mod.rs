//! Request handlers, one module per resource.

pub mod categories;
pub mod departments;
pub mod health;
pub mod products;

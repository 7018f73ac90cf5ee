//! # Error Types
//!
//! Domain-specific error types for catalog-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  catalog-core errors (this file)                                       │
//! │  ├── ErrorKind        - Closed set of kinds the HTTP layer maps on     │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  ├── ValidationErrors - Every failing field of one request             │
//! │  └── ValidationError  - A single field rule                            │
//! │                                                                         │
//! │  catalog-db errors (separate crate)                                    │
//! │  └── DbError          - Storage failures, wraps CoreError              │
//! │                                                                         │
//! │  product-service errors (in app)                                       │
//! │  └── ApiError         - JSON envelope + status code                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Classification
//! Every error exposes [`ErrorKind`] through `kind()`. Callers branch on the
//! kind, never on the rendered message.

use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// The closed set of error categories surfaced by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad or missing input. Never retried.
    Validation,
    /// Entity is absent or inactive.
    NotFound,
    /// Request contradicts current state (duplicate, overdraft, tree cycle).
    Conflict,
    /// Backend unreachable or rejected the operation.
    Storage,
}

// =============================================================================
// Core Error
// =============================================================================

/// Catalog business rule errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// One or more request fields failed validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Entity does not exist or has been soft deleted.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A stock adjustment would drive stock below zero.
    ///
    /// ## User Workflow
    /// ```text
    /// adjust_stock(id, -12)
    ///      │
    ///      ▼
    /// Guard: stock + delta >= 0 ? (10 - 12 = -2)
    ///      │
    ///      ▼
    /// InsufficientStock { id, available: 10, requested: -12 }
    /// ```
    #[error("Insufficient stock for {id}: available {available}, requested {requested}")]
    InsufficientStock {
        id: String,
        available: i64,
        requested: i64,
    },

    /// A category was given itself as parent.
    #[error("Category {id} cannot be its own parent")]
    SelfParent { id: String },

    /// Re-parenting would place a category under one of its descendants.
    #[error("Category {id} cannot be moved under its descendant {parent_id}")]
    CategoryCycle { id: String, parent_id: String },

    /// A patch carried no fields.
    #[error("Nothing to update for {entity}")]
    NothingToUpdate { entity: String },

    /// Unique attribute already taken.
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

impl CoreError {
    /// Shorthand for a not-found error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Shorthand for a single-field validation failure.
    pub fn invalid(error: ValidationError) -> Self {
        CoreError::Validation(ValidationErrors::from(error))
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) | CoreError::NothingToUpdate { .. } => ErrorKind::Validation,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::InsufficientStock { .. }
            | CoreError::SelfParent { .. }
            | CoreError::CategoryCycle { .. }
            | CoreError::Duplicate { .. } => ErrorKind::Conflict,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// A single violated field rule.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: f64, max: f64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g. bad characters in a slug).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Name of the field this rule applies to.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::Negative { field }
            | ValidationError::InvalidFormat { field, .. } => field,
        }
    }
}

/// All rule violations collected for one request.
///
/// ## Why a collection?
/// A client fixing a form wants every bad field at once, not one per
/// round trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of a single rule check.
    pub fn check(&mut self, result: Result<(), ValidationError>) {
        if let Err(e) = result {
            self.errors.push(e);
        }
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Names of the failing fields, in the order they were checked.
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(ValidationError::field).collect()
    }

    /// `Ok(())` when nothing failed, otherwise the collected errors.
    pub fn into_result(self) -> CoreResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation(self))
        }
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        ValidationErrors {
            errors: vec![error],
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

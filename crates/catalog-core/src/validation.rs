//! # Validation Module
//!
//! Field rules for catalog requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP boundary (product-service)                              │
//! │  └── JSON shape / type checks (deserialization)                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Request DTOs (requests.rs)                                   │
//! │  └── Runs every rule below, collects ALL failures                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Storage                                                      │
//! │  ├── UNIQUE sku / slug                                                 │
//! │  └── stock + delta >= 0 guard                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each function checks one rule and returns the first violation for its
//! field. Callers aggregate with [`crate::error::ValidationErrors::check`].

use crate::error::ValidationError;
use crate::money::Money;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest product name accepted.
pub const MAX_PRODUCT_NAME_LEN: usize = 255;

/// Longest department or category name accepted.
pub const MAX_GROUP_NAME_LEN: usize = 100;

pub const MAX_SKU_LEN: usize = 50;

pub const MAX_SLUG_LEN: usize = 255;

/// Longest free-text search accepted.
pub const MAX_SEARCH_LEN: usize = 100;

// =============================================================================
// String Validators
// =============================================================================

/// Validates that a field is present and not blank.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a display name.
///
/// ## Rules
/// - Must not be blank
/// - At most `max` characters (255 for products, 100 for departments and
///   categories)
///
/// ## Example
/// ```rust
/// use catalog_core::validation::{validate_name, MAX_GROUP_NAME_LEN};
///
/// assert!(validate_name("name", "Dairy", MAX_GROUP_NAME_LEN).is_ok());
/// assert!(validate_name("name", "  ", MAX_GROUP_NAME_LEN).is_err());
/// ```
pub fn validate_name(field: &str, name: &str, max: usize) -> ValidationResult<()> {
    validate_required(field, name)?;

    if name.trim().chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use catalog_core::validation::validate_sku;
///
/// assert!(validate_sku("MILK-1L").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("MILK 1L").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    validate_required("sku", sku)?;

    if sku.len() > MAX_SKU_LEN {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: MAX_SKU_LEN,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a URL slug.
///
/// ## Rules
/// - Must not be empty
/// - At most 255 characters
/// - Lowercase ASCII letters, digits and hyphens only
pub fn validate_slug(slug: &str) -> ValidationResult<()> {
    validate_required("slug", slug)?;

    if slug.len() > MAX_SLUG_LEN {
        return Err(ValidationError::TooLong {
            field: "slug".to_string(),
            max: MAX_SLUG_LEN,
        });
    }

    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ValidationError::InvalidFormat {
            field: "slug".to_string(),
            reason: "must contain only lowercase letters, numbers, and hyphens".to_string(),
        });
    }

    Ok(())
}

/// Validates a search query.
///
/// ## Rules
/// - Can be empty (lists everything)
/// - Maximum 100 characters
///
/// ## Returns
/// The query as given, or an empty string when it is only whitespace.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    if query.chars().count() > MAX_SEARCH_LEN {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: MAX_SEARCH_LEN,
        });
    }

    // Whitespace-only means no search; anything else is kept as typed.
    if query.trim().is_empty() {
        return Ok(String::new());
    }
    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a price. Zero is allowed (free items).
pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a counter such as stock, min_stock or reviews.
pub fn validate_count(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a measurement (weight, dimensions).
///
/// NaN is rejected along with negatives.
pub fn validate_measure(field: &str, value: f64) -> ValidationResult<()> {
    if value.is_nan() || value < 0.0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates an inclusive range such as discount (0-100) or rating (0-5).
pub fn validate_range(field: &str, value: f64, min: f64, max: f64) -> ValidationResult<()> {
    if value.is_nan() || value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("MILK-1L").is_ok());
        assert!(validate_sku("abc_123").is_ok());

        assert!(matches!(
            validate_sku(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_sku(&"A".repeat(51)),
            Err(ValidationError::TooLong { max: 50, .. })
        ));
        assert!(matches!(
            validate_sku("MILK 1L"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("whole-milk-1l").is_ok());
        assert!(validate_slug("Whole-Milk").is_err());
        assert!(validate_slug("").is_err());
    }

    #[test]
    fn test_validate_name_bounds() {
        assert!(validate_name("name", &"x".repeat(255), MAX_PRODUCT_NAME_LEN).is_ok());
        assert!(validate_name("name", &"x".repeat(256), MAX_PRODUCT_NAME_LEN).is_err());
        assert!(validate_name("name", &"x".repeat(101), MAX_GROUP_NAME_LEN).is_err());
    }

    #[test]
    fn test_numeric_rules() {
        assert!(validate_price("price", Money::zero()).is_ok());
        assert!(validate_price("price", Money::from_cents(-1)).is_err());
        assert!(validate_count("stock", -1).is_err());
        assert!(validate_measure("weight", f64::NAN).is_err());
        assert!(validate_range("discount", 100.0, 0.0, 100.0).is_ok());
        assert!(validate_range("rating", 5.1, 0.0, 5.0).is_err());
    }

    #[test]
    fn test_validate_search_query_keeps_spaces() {
        assert_eq!(validate_search_query("milk ").unwrap(), "milk ");
        assert_eq!(validate_search_query("   ").unwrap(), "");
        assert!(validate_search_query(&"q".repeat(101)).is_err());
    }
}

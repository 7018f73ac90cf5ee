//! # Request DTOs
//!
//! Create and update payloads for products, departments and categories.
//!
//! ## Sparse Patch Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PUT /products/{id}   {"price": 249, "stock": 12}                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UpdateProductRequest { price: Some(249), stock: Some(12), .. None }   │
//! │       │                                                                 │
//! │       ├── validate()      every present field, all failures reported   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  into_changes() → [ProductChange::Price(249), ProductChange::Stock(12)]│
//! │       │                                                                 │
//! │       ├── relational: SET price_cents = ?, stock = ?, updated_at = ?   │
//! │       └── key-value:  SET price = :v0, stock = :v1, updated_at = :v2   │
//! │                                                                         │
//! │  Empty change list → CoreError::NothingToUpdate                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Create DTOs deserialize with `#[serde(default)]` so a missing required
//! field reaches validation (and gets reported with every other failure)
//! instead of aborting JSON parsing on the first gap.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ValidationErrors};
use crate::money::Money;
use crate::types::{Category, Department, Dimensions, Product};
use crate::validation::{
    validate_count, validate_measure, validate_name, validate_price, validate_range,
    validate_required, validate_sku, validate_slug, MAX_GROUP_NAME_LEN, MAX_PRODUCT_NAME_LEN,
};

fn check_dimensions(errors: &mut ValidationErrors, dimensions: &Dimensions) {
    errors.check(validate_measure("dimensions.length", dimensions.length));
    errors.check(validate_measure("dimensions.width", dimensions.width));
    errors.check(validate_measure("dimensions.height", dimensions.height));
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// =============================================================================
// Product Requests
// =============================================================================

/// Payload for creating a product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    pub sku: String,
    pub slug: String,
    pub price: Money,
    pub original_price: Option<Money>,
    pub category_id: String,
    pub department_id: String,
    pub brand: String,
    pub unit: String,
    pub images: Vec<String>,
    pub stock: i64,
    pub min_stock: i64,
    pub weight: f64,
    pub weight_unit: String,
    pub dimensions: Dimensions,
    pub is_on_sale: bool,
    pub discount: Option<f64>,
    pub tags: BTreeSet<String>,
}

impl CreateProductRequest {
    /// Checks every rule and reports all violations together.
    pub fn validate(&self) -> CoreResult<()> {
        let mut errors = ValidationErrors::new();

        errors.check(validate_name("name", &self.name, MAX_PRODUCT_NAME_LEN));
        errors.check(validate_sku(&self.sku));
        errors.check(validate_slug(&self.slug));
        errors.check(validate_price("price", self.price));
        if let Some(original) = self.original_price {
            errors.check(validate_price("original_price", original));
        }
        errors.check(validate_required("category_id", &self.category_id));
        errors.check(validate_required("department_id", &self.department_id));
        errors.check(validate_count("stock", self.stock));
        errors.check(validate_count("min_stock", self.min_stock));
        errors.check(validate_measure("weight", self.weight));
        check_dimensions(&mut errors, &self.dimensions);
        if let Some(discount) = self.discount {
            errors.check(validate_range("discount", discount, 0.0, 100.0));
        }

        errors.into_result()
    }

    /// Builds the stored entity. New products start active and unrated.
    pub fn into_product(self, id: String, now: DateTime<Utc>) -> Product {
        Product {
            id,
            sku: self.sku.trim().to_string(),
            slug: self.slug,
            name: self.name.trim().to_string(),
            description: self.description,
            price: self.price,
            original_price: self.original_price,
            images: self.images,
            category_id: self.category_id,
            department_id: self.department_id,
            brand: self.brand,
            unit: self.unit,
            stock: self.stock,
            min_stock: self.min_stock,
            weight: self.weight,
            weight_unit: self.weight_unit,
            dimensions: self.dimensions,
            is_on_sale: self.is_on_sale,
            discount: self.discount,
            rating: 0.0,
            reviews: 0,
            is_active: true,
            tags: self.tags,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Payload for a sparse product update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub price: Option<Money>,
    pub original_price: Option<Money>,
    pub category_id: Option<String>,
    pub department_id: Option<String>,
    pub brand: Option<String>,
    pub unit: Option<String>,
    pub images: Option<Vec<String>>,
    pub stock: Option<i64>,
    pub min_stock: Option<i64>,
    pub weight: Option<f64>,
    pub weight_unit: Option<String>,
    pub dimensions: Option<Dimensions>,
    pub is_on_sale: Option<bool>,
    pub discount: Option<f64>,
    pub rating: Option<f64>,
    pub reviews: Option<i64>,
    pub is_active: Option<bool>,
    pub tags: Option<BTreeSet<String>>,
}

impl UpdateProductRequest {
    /// Validates the fields that are present.
    pub fn validate(&self) -> CoreResult<()> {
        let mut errors = ValidationErrors::new();

        if let Some(name) = &self.name {
            errors.check(validate_name("name", name, MAX_PRODUCT_NAME_LEN));
        }
        if let Some(slug) = &self.slug {
            errors.check(validate_slug(slug));
        }
        if let Some(price) = self.price {
            errors.check(validate_price("price", price));
        }
        if let Some(original) = self.original_price {
            errors.check(validate_price("original_price", original));
        }
        if let Some(category_id) = &self.category_id {
            errors.check(validate_required("category_id", category_id));
        }
        if let Some(department_id) = &self.department_id {
            errors.check(validate_required("department_id", department_id));
        }
        if let Some(stock) = self.stock {
            errors.check(validate_count("stock", stock));
        }
        if let Some(min_stock) = self.min_stock {
            errors.check(validate_count("min_stock", min_stock));
        }
        if let Some(weight) = self.weight {
            errors.check(validate_measure("weight", weight));
        }
        if let Some(dimensions) = &self.dimensions {
            check_dimensions(&mut errors, dimensions);
        }
        if let Some(discount) = self.discount {
            errors.check(validate_range("discount", discount, 0.0, 100.0));
        }
        if let Some(rating) = self.rating {
            errors.check(validate_range("rating", rating, 0.0, 5.0));
        }
        if let Some(reviews) = self.reviews {
            errors.check(validate_count("reviews", reviews));
        }

        errors.into_result()
    }

    /// Flattens the present fields into a change list, in declaration order.
    pub fn into_changes(self) -> Vec<ProductChange> {
        let mut changes = Vec::new();

        if let Some(v) = self.name {
            changes.push(ProductChange::Name(v.trim().to_string()));
        }
        if let Some(v) = self.description {
            changes.push(ProductChange::Description(v));
        }
        if let Some(v) = self.slug {
            changes.push(ProductChange::Slug(v));
        }
        if let Some(v) = self.price {
            changes.push(ProductChange::Price(v));
        }
        if let Some(v) = self.original_price {
            changes.push(ProductChange::OriginalPrice(v));
        }
        if let Some(v) = self.category_id {
            changes.push(ProductChange::CategoryId(v));
        }
        if let Some(v) = self.department_id {
            changes.push(ProductChange::DepartmentId(v));
        }
        if let Some(v) = self.brand {
            changes.push(ProductChange::Brand(v));
        }
        if let Some(v) = self.unit {
            changes.push(ProductChange::Unit(v));
        }
        if let Some(v) = self.images {
            changes.push(ProductChange::Images(v));
        }
        if let Some(v) = self.stock {
            changes.push(ProductChange::Stock(v));
        }
        if let Some(v) = self.min_stock {
            changes.push(ProductChange::MinStock(v));
        }
        if let Some(v) = self.weight {
            changes.push(ProductChange::Weight(v));
        }
        if let Some(v) = self.weight_unit {
            changes.push(ProductChange::WeightUnit(v));
        }
        if let Some(v) = self.dimensions {
            changes.push(ProductChange::Dimensions(v));
        }
        if let Some(v) = self.is_on_sale {
            changes.push(ProductChange::IsOnSale(v));
        }
        if let Some(v) = self.discount {
            changes.push(ProductChange::Discount(v));
        }
        if let Some(v) = self.rating {
            changes.push(ProductChange::Rating(v));
        }
        if let Some(v) = self.reviews {
            changes.push(ProductChange::Reviews(v));
        }
        if let Some(v) = self.is_active {
            changes.push(ProductChange::IsActive(v));
        }
        if let Some(v) = self.tags {
            changes.push(ProductChange::Tags(v));
        }

        changes
    }
}

/// One field assignment of a product patch.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductChange {
    Name(String),
    Description(String),
    Slug(String),
    Price(Money),
    OriginalPrice(Money),
    CategoryId(String),
    DepartmentId(String),
    Brand(String),
    Unit(String),
    Images(Vec<String>),
    Stock(i64),
    MinStock(i64),
    Weight(f64),
    WeightUnit(String),
    Dimensions(Dimensions),
    IsOnSale(bool),
    Discount(f64),
    Rating(f64),
    Reviews(i64),
    IsActive(bool),
    Tags(BTreeSet<String>),
}

// =============================================================================
// Department Requests
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateDepartmentRequest {
    pub name: String,
    pub description: String,
    pub icon: String,
    pub image: String,
    pub slug: String,
}

impl CreateDepartmentRequest {
    pub fn validate(&self) -> CoreResult<()> {
        let mut errors = ValidationErrors::new();
        errors.check(validate_name("name", &self.name, MAX_GROUP_NAME_LEN));
        errors.check(validate_slug(&self.slug));
        errors.into_result()
    }

    pub fn into_department(self, id: String, now: DateTime<Utc>) -> Department {
        Department {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            icon: self.icon,
            image: self.image,
            slug: self.slug,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateDepartmentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub slug: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateDepartmentRequest {
    pub fn validate(&self) -> CoreResult<()> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            errors.check(validate_name("name", name, MAX_GROUP_NAME_LEN));
        }
        if let Some(slug) = &self.slug {
            errors.check(validate_slug(slug));
        }
        errors.into_result()
    }

    pub fn into_changes(self) -> Vec<DepartmentChange> {
        let mut changes = Vec::new();
        if let Some(v) = self.name {
            changes.push(DepartmentChange::Name(v.trim().to_string()));
        }
        if let Some(v) = self.description {
            changes.push(DepartmentChange::Description(v));
        }
        if let Some(v) = self.icon {
            changes.push(DepartmentChange::Icon(v));
        }
        if let Some(v) = self.image {
            changes.push(DepartmentChange::Image(v));
        }
        if let Some(v) = self.slug {
            changes.push(DepartmentChange::Slug(v));
        }
        if let Some(v) = self.is_active {
            changes.push(DepartmentChange::IsActive(v));
        }
        changes
    }
}

/// One field assignment of a department patch.
#[derive(Debug, Clone, PartialEq)]
pub enum DepartmentChange {
    Name(String),
    Description(String),
    Icon(String),
    Image(String),
    Slug(String),
    IsActive(bool),
}

// =============================================================================
// Category Requests
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub slug: String,
    pub description: String,
    /// Absent or empty creates a root category.
    pub parent_id: Option<String>,
}

impl CreateCategoryRequest {
    pub fn validate(&self) -> CoreResult<()> {
        let mut errors = ValidationErrors::new();
        errors.check(validate_name("name", &self.name, MAX_GROUP_NAME_LEN));
        errors.check(validate_slug(&self.slug));
        errors.into_result()
    }

    /// Parent reference with empty strings treated as "root".
    pub fn parent(&self) -> Option<&str> {
        self.parent_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Builds the stored entity at the level computed from its parent.
    pub fn into_category(self, id: String, level: i64, now: DateTime<Utc>) -> Category {
        Category {
            id,
            name: self.name.trim().to_string(),
            slug: self.slug,
            description: self.description,
            parent_id: non_empty(self.parent_id).map(|p| p.trim().to_string()),
            level,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    /// `Some("")` moves the category to the root.
    pub parent_id: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateCategoryRequest {
    pub fn validate(&self) -> CoreResult<()> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            errors.check(validate_name("name", name, MAX_GROUP_NAME_LEN));
        }
        if let Some(slug) = &self.slug {
            errors.check(validate_slug(slug));
        }
        errors.into_result()
    }

    pub fn into_changes(self) -> Vec<CategoryChange> {
        let mut changes = Vec::new();
        if let Some(v) = self.name {
            changes.push(CategoryChange::Name(v.trim().to_string()));
        }
        if let Some(v) = self.slug {
            changes.push(CategoryChange::Slug(v));
        }
        if let Some(v) = self.description {
            changes.push(CategoryChange::Description(v));
        }
        if let Some(v) = self.parent_id {
            let parent = non_empty(Some(v)).map(|p| p.trim().to_string());
            changes.push(CategoryChange::Parent(parent));
        }
        if let Some(v) = self.is_active {
            changes.push(CategoryChange::IsActive(v));
        }
        changes
    }
}

/// One field assignment of a category patch.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryChange {
    Name(String),
    Slug(String),
    Description(String),
    /// `None` makes the category a root.
    Parent(Option<String>),
    /// Derived from the tree, never taken from a client payload.
    Level(i64),
    IsActive(bool),
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, ErrorKind};

    fn valid_product() -> CreateProductRequest {
        CreateProductRequest {
            name: "Whole Milk 1L".into(),
            sku: "MILK-1L".into(),
            slug: "whole-milk-1l".into(),
            price: Money::from_cents(199),
            category_id: "c-1".into(),
            department_id: "d-1".into(),
            stock: 10,
            min_stock: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_create_passes() {
        assert!(valid_product().validate().is_ok());
    }

    #[test]
    fn test_create_reports_every_failing_field() {
        let request = CreateProductRequest {
            name: String::new(),
            sku: String::new(),
            slug: "Bad Slug".into(),
            price: Money::from_cents(-5),
            stock: -1,
            discount: Some(150.0),
            dimensions: Dimensions {
                length: -1.0,
                width: 1.0,
                height: 1.0,
            },
            ..Default::default()
        };

        let err = request.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let CoreError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.fields(),
            vec![
                "name",
                "sku",
                "slug",
                "price",
                "category_id",
                "department_id",
                "stock",
                "dimensions.length",
                "discount"
            ]
        );
    }

    #[test]
    fn test_missing_json_fields_reach_validation() {
        let request: CreateProductRequest = serde_json::from_str(r#"{"name": "Milk"}"#).unwrap();
        let CoreError::Validation(errors) = request.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert!(errors.fields().contains(&"sku"));
        assert!(errors.fields().contains(&"category_id"));
    }

    #[test]
    fn test_into_product_defaults() {
        let product = valid_product().into_product("p-1".into(), Utc::now());
        assert!(product.is_active);
        assert_eq!(product.rating, 0.0);
        assert_eq!(product.reviews, 0);
        assert_eq!(product.created_at, product.updated_at);
    }

    #[test]
    fn test_update_into_changes_only_present_fields() {
        let request: UpdateProductRequest =
            serde_json::from_str(r#"{"price": 249, "stock": 12}"#).unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(
            request.into_changes(),
            vec![
                ProductChange::Price(Money::from_cents(249)),
                ProductChange::Stock(12)
            ]
        );
    }

    #[test]
    fn test_empty_update_has_no_changes() {
        assert!(UpdateProductRequest::default().into_changes().is_empty());
        assert!(UpdateDepartmentRequest::default().into_changes().is_empty());
        assert!(UpdateCategoryRequest::default().into_changes().is_empty());
    }

    #[test]
    fn test_update_validates_present_fields() {
        let request = UpdateProductRequest {
            rating: Some(7.0),
            reviews: Some(-2),
            ..Default::default()
        };
        let CoreError::Validation(errors) = request.validate().unwrap_err() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.fields(), vec!["rating", "reviews"]);
    }

    #[test]
    fn test_category_parent_empty_means_root() {
        let create = CreateCategoryRequest {
            name: "Milk".into(),
            slug: "milk".into(),
            parent_id: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(create.parent(), None);

        let update = UpdateCategoryRequest {
            parent_id: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(update.into_changes(), vec![CategoryChange::Parent(None)]);
    }

    #[test]
    fn test_group_name_limit() {
        let request = CreateDepartmentRequest {
            name: "d".repeat(101),
            slug: "dairy".into(),
            ..Default::default()
        };
        assert!(request.validate().is_err());
    }
}

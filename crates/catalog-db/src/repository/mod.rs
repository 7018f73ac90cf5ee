//! # Repository Facade
//!
//! One capability set, two storage strategies.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Arc<dyn CatalogRepository>                            │
//! │                              │                                          │
//! │            ┌─────────────────┴──────────────────┐                       │
//! │            ▼                                    ▼                       │
//! │  RelationalCatalog (relational.rs)     KeyValueCatalog (kv/catalog.rs)  │
//! │  ├── ProductRepository   (SQL)         └── KvTable × 3                  │
//! │  ├── DepartmentRepository(SQL)             products / departments /     │
//! │  └── CategoryRepository  (SQL)             categories                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Callers hold `Arc<dyn CatalogRepository>` and never learn which strategy
//! is behind it. Both strategies share these rules:
//!
//! - `get_*` and `update_*` fail with NotFound for missing or inactive rows
//! - an empty change list fails with `NothingToUpdate`
//! - `delete_*` is a soft delete
//! - `adjust_stock` is one atomic conditional write
//! - products are listed by id; departments and categories by (name, id)

pub mod category;
pub mod department;
pub mod product;
pub mod relational;

use async_trait::async_trait;
use catalog_core::{
    Category, CategoryChange, CoreError, CreateCategoryRequest, CreateDepartmentRequest,
    CreateProductRequest, Department, DepartmentChange, Pagination, Product, ProductChange,
    ProductListResponse, ProductPredicate, ValidationError,
};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// Storage contract implemented by every backend.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    /// Active product by id.
    async fn get_product(&self, id: &str) -> DbResult<Product>;

    /// One page of products matching `predicate`, plus the unpaginated total.
    async fn list_products(
        &self,
        predicate: &ProductPredicate,
        page: Pagination,
    ) -> DbResult<ProductListResponse>;

    /// Inserts a validated product. Department and category must be active.
    async fn create_product(&self, request: CreateProductRequest) -> DbResult<Product>;

    /// Applies a sparse patch to an active product.
    async fn update_product(&self, id: &str, changes: Vec<ProductChange>) -> DbResult<Product>;

    /// Soft delete.
    async fn delete_product(&self, id: &str) -> DbResult<()>;

    /// Atomically adds `delta` to stock, refusing to go below zero.
    async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<Product>;

    /// Active products with `stock <= min_stock`, ordered by id.
    async fn list_low_stock(&self) -> DbResult<Vec<Product>>;

    // -------------------------------------------------------------------------
    // Departments
    // -------------------------------------------------------------------------

    async fn get_department(&self, id: &str) -> DbResult<Department>;

    async fn list_departments(&self) -> DbResult<Vec<Department>>;

    async fn create_department(&self, request: CreateDepartmentRequest) -> DbResult<Department>;

    async fn update_department(
        &self,
        id: &str,
        changes: Vec<DepartmentChange>,
    ) -> DbResult<Department>;

    async fn delete_department(&self, id: &str) -> DbResult<()>;

    // -------------------------------------------------------------------------
    // Categories
    // -------------------------------------------------------------------------

    async fn get_category(&self, id: &str) -> DbResult<Category>;

    /// Active categories, optionally only the direct children of `parent_id`.
    async fn list_categories(&self, parent_id: Option<&str>) -> DbResult<Vec<Category>>;

    /// Inserts a category at the level derived from its parent.
    async fn create_category(&self, request: CreateCategoryRequest) -> DbResult<Category>;

    /// Applies a patch; a parent change recomputes levels for the subtree.
    async fn update_category(&self, id: &str, changes: Vec<CategoryChange>)
        -> DbResult<Category>;

    async fn delete_category(&self, id: &str) -> DbResult<()>;

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    /// True when the backend answers.
    async fn health_check(&self) -> bool;
}

/// Generates a new entity ID (UUID v4).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Fails with NotFound unless both referenced parents exist and are active.
pub(crate) async fn ensure_product_references<R>(
    repo: &R,
    department_id: Option<&str>,
    category_id: Option<&str>,
) -> DbResult<()>
where
    R: CatalogRepository + ?Sized,
{
    if let Some(id) = department_id {
        repo.get_department(id).await?;
    }
    if let Some(id) = category_id {
        repo.get_category(id).await?;
    }
    Ok(())
}

/// The references a product patch points at, if it changes them.
pub(crate) fn changed_references(changes: &[ProductChange]) -> (Option<&str>, Option<&str>) {
    let mut department = None;
    let mut category = None;
    for change in changes {
        match change {
            ProductChange::DepartmentId(id) => department = Some(id.as_str()),
            ProductChange::CategoryId(id) => category = Some(id.as_str()),
            _ => {}
        }
    }
    (department, category)
}

/// The new parent a category patch asks for, if it moves the category.
///
/// `Some(None)` means "move to the root".
pub(crate) fn parent_change(changes: &[CategoryChange]) -> Option<Option<&str>> {
    changes.iter().rev().find_map(|change| match change {
        CategoryChange::Parent(parent) => Some(parent.as_deref()),
        _ => None,
    })
}

/// Explains why a guarded stock write on `id` matched nothing, given its
/// current `stock`.
///
/// ```text
/// stock + delta overflows i64  → Validation (quantity out of range)
/// stock + delta < 0            → InsufficientStock
/// ```
pub(crate) fn stock_rejection(id: &str, stock: i64, delta: i64) -> DbError {
    if stock.checked_add(delta).is_none() {
        return CoreError::invalid(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: -(stock as f64),
            max: i64::MAX.saturating_sub(stock) as f64,
        })
        .into();
    }
    CoreError::InsufficientStock {
        id: id.to_string(),
        available: stock,
        requested: delta,
    }
    .into()
}

/// Rejects an empty patch.
pub(crate) fn ensure_changes<T>(entity: &str, changes: &[T]) -> DbResult<()> {
    if changes.is_empty() {
        return Err(CoreError::NothingToUpdate {
            entity: entity.to_string(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_is_uuid() {
        let id = generate_id();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_ne!(id, generate_id());
    }

    #[test]
    fn test_changed_references() {
        let changes = vec![
            ProductChange::Stock(1),
            ProductChange::CategoryId("c-2".into()),
        ];
        assert_eq!(changed_references(&changes), (None, Some("c-2")));
    }

    #[test]
    fn test_parent_change() {
        assert_eq!(parent_change(&[CategoryChange::Name("x".into())]), None);
        assert_eq!(parent_change(&[CategoryChange::Parent(None)]), Some(None));
        assert_eq!(
            parent_change(&[CategoryChange::Parent(Some("c-1".into()))]),
            Some(Some("c-1"))
        );
    }

    #[test]
    fn test_stock_rejection_kinds() {
        let err = stock_rejection("p-1", 10, -11);
        assert_eq!(err.kind(), catalog_core::ErrorKind::Conflict);

        let err = stock_rejection("p-1", 10, i64::MAX);
        assert_eq!(err.kind(), catalog_core::ErrorKind::Validation);
        assert!(err.to_string().contains("quantity"));
    }

    #[test]
    fn test_ensure_changes_rejects_empty() {
        let err = ensure_changes::<ProductChange>("Product", &[]).unwrap_err();
        assert_eq!(err.kind(), catalog_core::ErrorKind::Validation);
    }
}

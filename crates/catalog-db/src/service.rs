//! # Catalog Service
//!
//! Request-level entry point over whichever backend is configured.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HTTP handler                                                           │
//! │       │  UpdateProductRequest / ProductFilter / raw ids                 │
//! │       ▼                                                                 │
//! │  CatalogService                                                         │
//! │   ├── reject empty ids / keys          (Validation)                    │
//! │   ├── request.validate()               (Validation, all fields)        │
//! │   ├── DTO → change list                                                │
//! │   ├── filter → predicate + pagination                                  │
//! │       ▼                                                                 │
//! │  Arc<dyn CatalogRepository>                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use catalog_core::validation::{validate_required, validate_search_query};
use catalog_core::{
    Category, CoreError, CreateCategoryRequest, CreateDepartmentRequest, CreateProductRequest,
    Department, Product, ProductFilter, ProductListResponse, UpdateCategoryRequest,
    UpdateDepartmentRequest, UpdateProductRequest,
};

use crate::error::DbResult;
use crate::repository::CatalogRepository;

fn require(field: &str, value: &str) -> DbResult<()> {
    validate_required(field, value).map_err(CoreError::invalid)?;
    Ok(())
}

/// Validating wrapper around a [`CatalogRepository`].
///
/// Cheap to clone; clones share the repository.
#[derive(Clone)]
pub struct CatalogService {
    repo: Arc<dyn CatalogRepository>,
}

impl CatalogService {
    pub fn new(repo: Arc<dyn CatalogRepository>) -> Self {
        CatalogService { repo }
    }

    pub fn repository(&self) -> &Arc<dyn CatalogRepository> {
        &self.repo
    }

    // =========================================================================
    // Products
    // =========================================================================

    pub async fn get_product(&self, id: &str) -> DbResult<Product> {
        require("id", id)?;
        self.repo.get_product(id).await
    }

    /// Lists products; pagination is clamped, never rejected.
    pub async fn list_products(&self, filter: &ProductFilter) -> DbResult<ProductListResponse> {
        self.repo
            .list_products(&filter.to_predicate(), filter.pagination())
            .await
    }

    pub async fn create_product(&self, request: CreateProductRequest) -> DbResult<Product> {
        request.validate()?;
        self.repo.create_product(request).await
    }

    pub async fn update_product(
        &self,
        id: &str,
        request: UpdateProductRequest,
    ) -> DbResult<Product> {
        require("id", id)?;
        request.validate()?;
        self.repo.update_product(id, request.into_changes()).await
    }

    pub async fn delete_product(&self, id: &str) -> DbResult<()> {
        require("id", id)?;
        self.repo.delete_product(id).await
    }

    /// Adds `quantity` (negative to remove) to a product's stock.
    pub async fn adjust_stock(&self, id: &str, quantity: i64) -> DbResult<Product> {
        require("id", id)?;
        self.repo.adjust_stock(id, quantity).await
    }

    pub async fn low_stock_products(&self) -> DbResult<Vec<Product>> {
        self.repo.list_low_stock().await
    }

    /// Free-text search combined with `filter`. An empty query lists
    /// everything the filter allows.
    pub async fn search_products(
        &self,
        query: &str,
        mut filter: ProductFilter,
    ) -> DbResult<ProductListResponse> {
        let query = validate_search_query(query).map_err(CoreError::invalid)?;
        filter.search = Some(query).filter(|q| !q.is_empty());
        self.list_products(&filter).await
    }

    pub async fn products_by_category(
        &self,
        category_id: &str,
        mut filter: ProductFilter,
    ) -> DbResult<ProductListResponse> {
        require("category_id", category_id)?;
        filter.category_id = Some(category_id.to_string());
        self.list_products(&filter).await
    }

    pub async fn products_by_department(
        &self,
        department_id: &str,
        mut filter: ProductFilter,
    ) -> DbResult<ProductListResponse> {
        require("department_id", department_id)?;
        filter.department_id = Some(department_id.to_string());
        self.list_products(&filter).await
    }

    pub async fn products_by_brand(
        &self,
        brand: &str,
        mut filter: ProductFilter,
    ) -> DbResult<ProductListResponse> {
        require("brand", brand)?;
        filter.brand = Some(brand.to_string());
        self.list_products(&filter).await
    }

    pub async fn products_on_sale(&self, mut filter: ProductFilter) -> DbResult<ProductListResponse> {
        filter.is_on_sale = Some(true);
        self.list_products(&filter).await
    }

    // =========================================================================
    // Departments
    // =========================================================================

    pub async fn get_department(&self, id: &str) -> DbResult<Department> {
        require("id", id)?;
        self.repo.get_department(id).await
    }

    pub async fn list_departments(&self) -> DbResult<Vec<Department>> {
        self.repo.list_departments().await
    }

    pub async fn create_department(&self, request: CreateDepartmentRequest) -> DbResult<Department> {
        request.validate()?;
        self.repo.create_department(request).await
    }

    pub async fn update_department(
        &self,
        id: &str,
        request: UpdateDepartmentRequest,
    ) -> DbResult<Department> {
        require("id", id)?;
        request.validate()?;
        self.repo.update_department(id, request.into_changes()).await
    }

    pub async fn delete_department(&self, id: &str) -> DbResult<()> {
        require("id", id)?;
        self.repo.delete_department(id).await
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub async fn get_category(&self, id: &str) -> DbResult<Category> {
        require("id", id)?;
        self.repo.get_category(id).await
    }

    /// Active categories; an empty `parent_id` means "all".
    pub async fn list_categories(&self, parent_id: Option<&str>) -> DbResult<Vec<Category>> {
        let parent_id = parent_id.map(str::trim).filter(|p| !p.is_empty());
        self.repo.list_categories(parent_id).await
    }

    pub async fn create_category(&self, request: CreateCategoryRequest) -> DbResult<Category> {
        request.validate()?;
        self.repo.create_category(request).await
    }

    pub async fn update_category(
        &self,
        id: &str,
        request: UpdateCategoryRequest,
    ) -> DbResult<Category> {
        require("id", id)?;
        request.validate()?;
        self.repo.update_category(id, request.into_changes()).await
    }

    pub async fn delete_category(&self, id: &str) -> DbResult<()> {
        require("id", id)?;
        self.repo.delete_category(id).await
    }

    pub async fn health_check(&self) -> bool {
        self.repo.health_check().await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Relational Catalog
//!
//! [`CatalogRepository`] over SQLite, composed from the three table
//! repositories.

use async_trait::async_trait;
use catalog_core::category::{level_under, plan_reparent};
use catalog_core::{
    Category, CategoryChange, CreateCategoryRequest, CreateDepartmentRequest,
    CreateProductRequest, Department, DepartmentChange, Pagination, Product, ProductChange,
    ProductListResponse, ProductPredicate,
};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use super::category::CategoryRepository;
use super::department::DepartmentRepository;
use super::product::ProductRepository;
use super::{
    changed_references, ensure_changes, ensure_product_references, generate_id, parent_change,
    CatalogRepository,
};
use crate::error::{DbError, DbResult};

/// SQLite-backed catalog.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::in_memory()).await?;
/// let catalog: Arc<dyn CatalogRepository> = Arc::new(db.catalog());
/// ```
#[derive(Debug, Clone)]
pub struct RelationalCatalog {
    pool: SqlitePool,
    products: ProductRepository,
    departments: DepartmentRepository,
    categories: CategoryRepository,
}

impl RelationalCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        RelationalCatalog {
            products: ProductRepository::new(pool.clone()),
            departments: DepartmentRepository::new(pool.clone()),
            categories: CategoryRepository::new(pool.clone()),
            pool,
        }
    }

    /// The product table repository, for operator tooling.
    pub fn products(&self) -> &ProductRepository {
        &self.products
    }
}

#[async_trait]
impl CatalogRepository for RelationalCatalog {
    // =========================================================================
    // Products
    // =========================================================================

    async fn get_product(&self, id: &str) -> DbResult<Product> {
        self.products
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    async fn list_products(
        &self,
        predicate: &ProductPredicate,
        page: Pagination,
    ) -> DbResult<ProductListResponse> {
        self.products.list(predicate, page).await
    }

    async fn create_product(&self, request: CreateProductRequest) -> DbResult<Product> {
        request.validate()?;
        ensure_product_references(
            self,
            Some(request.department_id.as_str()),
            Some(request.category_id.as_str()),
        )
        .await?;

        let product = request.into_product(generate_id(), Utc::now());
        let product = self.products.insert(&product).await?;

        info!(id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    async fn update_product(&self, id: &str, changes: Vec<ProductChange>) -> DbResult<Product> {
        self.get_product(id).await?;
        ensure_changes("Product", &changes)?;

        let (department, category) = changed_references(&changes);
        ensure_product_references(self, department, category).await?;

        self.products
            .update(id, &changes)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    async fn delete_product(&self, id: &str) -> DbResult<()> {
        self.products.soft_delete(id).await?;
        info!(id = %id, "Product deleted");
        Ok(())
    }

    async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<Product> {
        self.products.adjust_stock(id, delta).await
    }

    async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        self.products.list_low_stock().await
    }

    // =========================================================================
    // Departments
    // =========================================================================

    async fn get_department(&self, id: &str) -> DbResult<Department> {
        self.departments
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Department", id))
    }

    async fn list_departments(&self) -> DbResult<Vec<Department>> {
        self.departments.list().await
    }

    async fn create_department(&self, request: CreateDepartmentRequest) -> DbResult<Department> {
        request.validate()?;
        let department = request.into_department(generate_id(), Utc::now());
        let department = self.departments.insert(&department).await?;

        info!(id = %department.id, slug = %department.slug, "Department created");
        Ok(department)
    }

    async fn update_department(
        &self,
        id: &str,
        changes: Vec<DepartmentChange>,
    ) -> DbResult<Department> {
        self.get_department(id).await?;
        ensure_changes("Department", &changes)?;

        self.departments
            .update(id, &changes)
            .await?
            .ok_or_else(|| DbError::not_found("Department", id))
    }

    async fn delete_department(&self, id: &str) -> DbResult<()> {
        self.departments.soft_delete(id).await?;
        info!(id = %id, "Department deleted");
        Ok(())
    }

    // =========================================================================
    // Categories
    // =========================================================================

    async fn get_category(&self, id: &str) -> DbResult<Category> {
        self.categories
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))
    }

    async fn list_categories(&self, parent_id: Option<&str>) -> DbResult<Vec<Category>> {
        self.categories.list(parent_id).await
    }

    async fn create_category(&self, request: CreateCategoryRequest) -> DbResult<Category> {
        request.validate()?;
        let parent = match request.parent() {
            Some(parent_id) => Some(self.get_category(parent_id).await?),
            None => None,
        };

        let level = level_under(parent.as_ref());
        let category = request.into_category(generate_id(), level, Utc::now());
        let category = self.categories.insert(&category).await?;

        info!(id = %category.id, level = category.level, "Category created");
        Ok(category)
    }

    async fn update_category(
        &self,
        id: &str,
        mut changes: Vec<CategoryChange>,
    ) -> DbResult<Category> {
        let current = self.get_category(id).await?;
        ensure_changes("Category", &changes)?;

        let mut descendant_levels = Vec::new();
        if let Some(new_parent) = parent_change(&changes) {
            let parent = match new_parent {
                Some(parent_id) => Some(self.get_category(parent_id).await?),
                None => None,
            };
            let tree = self.categories.list_all().await?;
            let plan = plan_reparent(&current, parent.as_ref(), &tree)?;

            changes.push(CategoryChange::Level(plan.level));
            descendant_levels = plan.descendant_levels;
        }

        self.categories
            .update(id, &changes, &descendant_levels)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))
    }

    async fn delete_category(&self, id: &str) -> DbResult<()> {
        self.categories.soft_delete(id).await?;
        info!(id = %id, "Category deleted");
        Ok(())
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

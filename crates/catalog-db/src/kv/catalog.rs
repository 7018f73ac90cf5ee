//! # Key-Value Catalog
//!
//! [`CatalogRepository`] over three [`KvTable`]s.
//!
//! ## Listing Products
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ProductPredicate                                                       │
//! │    ├── native clauses ──► Condition::And([...]) ──► table.scan()       │
//! │    └── Search(q)      ──────────────────────────► retain in memory     │
//! │                                                         │               │
//! │                                      sort by id ◄───────┘               │
//! │                                          │                              │
//! │                      total_count = len ──┤                              │
//! │                                          ▼                              │
//! │                           Pagination::slice (offset, then limit)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Writes
//! Stock adjustment and soft delete are one conditional `update_item` each.
//! Uniqueness and parent checks are a read followed by a conditional put,
//! which is not atomic across the two steps.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use catalog_core::category::{level_under, plan_reparent};
use catalog_core::{
    Category, CategoryChange, Clause, CreateCategoryRequest, CreateDepartmentRequest,
    CreateProductRequest, Department, DepartmentChange, Pagination, Product, ProductChange,
    ProductListResponse, ProductPredicate,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use super::dynamo::{self, DynamoTable};
use super::expr::{Condition, UpdateAction, UpdateExpr};
use super::table::{KvTable, MemoryTable};
use super::{from_item, to_item, Item, KvConfig, KEY_ATTR};
use crate::error::{DbError, DbResult};
use crate::repository::{
    changed_references, ensure_changes, ensure_product_references, generate_id, parent_change,
    stock_rejection, CatalogRepository,
};

// =============================================================================
// Condition Helpers
// =============================================================================

fn active() -> Condition {
    Condition::eq("is_active", true)
}

fn existing_active() -> Condition {
    Condition::And(vec![Condition::Exists, active()])
}

fn is_active(item: &Item) -> bool {
    item.get("is_active") == Some(&Value::Bool(true))
}

/// Scan condition for a predicate clause; `None` for clauses that are
/// evaluated in memory.
fn clause_condition(clause: &Clause) -> Option<Condition> {
    let condition = match clause {
        Clause::Active => active(),
        Clause::CategoryIs(id) => Condition::eq("category_id", id.as_str()),
        Clause::DepartmentIs(id) => Condition::eq("department_id", id.as_str()),
        Clause::BrandIs(brand) => Condition::eq("brand", brand.as_str()),
        Clause::PriceAtLeast(min) => Condition::Ge("price".into(), min.cents() as f64),
        Clause::PriceAtMost(max) => Condition::Le("price".into(), max.cents() as f64),
        Clause::InStock => Condition::Gt("stock".into(), 0.0),
        Clause::OnSale => Condition::eq("is_on_sale", true),
        Clause::RatingAtLeast(min) => Condition::Ge("rating".into(), *min),
        Clause::Search(_) => return None,
    };
    Some(condition)
}

fn timestamp(now: DateTime<Utc>) -> DbResult<Value> {
    Ok(serde_json::to_value(now)?)
}

/// A failed `Exists`/active guard means the record is gone.
fn missing_on_condition(err: DbError, entity: &str, id: &str) -> DbError {
    match err {
        DbError::ConditionFailed { .. } => DbError::not_found(entity, id),
        other => other,
    }
}

fn decode_all<T: DeserializeOwned>(items: Vec<Item>) -> DbResult<Vec<T>> {
    items.into_iter().map(from_item).collect()
}

// =============================================================================
// Change Translation
// =============================================================================

fn product_action(change: &ProductChange) -> DbResult<UpdateAction> {
    let (attr, value) = match change {
        ProductChange::Name(v) => ("name", Value::from(v.as_str())),
        ProductChange::Description(v) => ("description", Value::from(v.as_str())),
        ProductChange::Slug(v) => ("slug", Value::from(v.as_str())),
        ProductChange::Price(v) => ("price", Value::from(v.cents())),
        ProductChange::OriginalPrice(v) => ("original_price", Value::from(v.cents())),
        ProductChange::CategoryId(v) => ("category_id", Value::from(v.as_str())),
        ProductChange::DepartmentId(v) => ("department_id", Value::from(v.as_str())),
        ProductChange::Brand(v) => ("brand", Value::from(v.as_str())),
        ProductChange::Unit(v) => ("unit", Value::from(v.as_str())),
        ProductChange::Images(v) => ("images", serde_json::to_value(v)?),
        ProductChange::Stock(v) => ("stock", Value::from(*v)),
        ProductChange::MinStock(v) => ("min_stock", Value::from(*v)),
        ProductChange::Weight(v) => ("weight", Value::from(*v)),
        ProductChange::WeightUnit(v) => ("weight_unit", Value::from(v.as_str())),
        ProductChange::Dimensions(v) => ("dimensions", serde_json::to_value(v)?),
        ProductChange::IsOnSale(v) => ("is_on_sale", Value::from(*v)),
        ProductChange::Discount(v) => ("discount", Value::from(*v)),
        ProductChange::Rating(v) => ("rating", Value::from(*v)),
        ProductChange::Reviews(v) => ("reviews", Value::from(*v)),
        ProductChange::IsActive(v) => ("is_active", Value::from(*v)),
        ProductChange::Tags(v) => ("tags", serde_json::to_value(v)?),
    };
    Ok(UpdateAction::Set(attr.to_string(), value))
}

fn department_action(change: &DepartmentChange) -> UpdateAction {
    let (attr, value) = match change {
        DepartmentChange::Name(v) => ("name", Value::from(v.as_str())),
        DepartmentChange::Description(v) => ("description", Value::from(v.as_str())),
        DepartmentChange::Icon(v) => ("icon", Value::from(v.as_str())),
        DepartmentChange::Image(v) => ("image", Value::from(v.as_str())),
        DepartmentChange::Slug(v) => ("slug", Value::from(v.as_str())),
        DepartmentChange::IsActive(v) => ("is_active", Value::from(*v)),
    };
    UpdateAction::Set(attr.to_string(), value)
}

fn category_action(change: &CategoryChange) -> UpdateAction {
    let (attr, value) = match change {
        CategoryChange::Name(v) => ("name", Value::from(v.as_str())),
        CategoryChange::Slug(v) => ("slug", Value::from(v.as_str())),
        CategoryChange::Description(v) => ("description", Value::from(v.as_str())),
        CategoryChange::Parent(v) => ("parent_id", v.as_deref().map_or(Value::Null, Value::from)),
        CategoryChange::Level(v) => ("level", Value::from(*v)),
        CategoryChange::IsActive(v) => ("is_active", Value::from(*v)),
    };
    UpdateAction::Set(attr.to_string(), value)
}

// =============================================================================
// Table Helpers
// =============================================================================

async fn get_active<T: DeserializeOwned>(table: &dyn KvTable, entity: &str, id: &str) -> DbResult<T> {
    match table.get_item(id).await? {
        Some(item) if is_active(&item) => from_item(item),
        _ => Err(DbError::not_found(entity, id)),
    }
}

/// Fails with a duplicate error when another item already holds one of
/// the `(attribute, value)` pairs. Soft-deleted items still hold theirs.
async fn ensure_unique(
    table: &dyn KvTable,
    fields: &[(&str, &str)],
    exclude_id: Option<&str>,
) -> DbResult<()> {
    if fields.is_empty() {
        return Ok(());
    }
    let any_match = Condition::Or(fields.iter().map(|(f, v)| Condition::eq(f, *v)).collect());

    for item in table.scan(Some(&any_match)).await? {
        let key = item.get(KEY_ATTR).and_then(Value::as_str);
        if exclude_id.is_some() && key == exclude_id {
            continue;
        }
        for (field, value) in fields {
            if item.get(*field).and_then(Value::as_str) == Some(*value) {
                return Err(DbError::duplicate(*field, *value));
            }
        }
    }
    Ok(())
}

async fn soft_delete(table: &dyn KvTable, entity: &str, id: &str) -> DbResult<()> {
    let update = UpdateExpr::new()
        .set("is_active", false)
        .set("updated_at", timestamp(Utc::now())?);

    table
        .update_item(id, &update, Some(&existing_active()))
        .await
        .map_err(|e| missing_on_condition(e, entity, id))?;
    Ok(())
}

/// Writes `actions` plus `updated_at` to an active item.
async fn update_active(
    table: &dyn KvTable,
    entity: &str,
    id: &str,
    actions: Vec<UpdateAction>,
) -> DbResult<Item> {
    let mut update = UpdateExpr::new();
    for action in actions {
        update.push(action);
    }
    update.push(UpdateAction::Set(
        "updated_at".into(),
        timestamp(Utc::now())?,
    ));

    table
        .update_item(id, &update, Some(&existing_active()))
        .await
        .map_err(|e| missing_on_condition(e, entity, id))
}

fn slug_of<'a, T>(changes: &'a [T], slug: impl Fn(&'a T) -> Option<&'a str>) -> Vec<(&'static str, &'a str)> {
    changes.iter().filter_map(slug).map(|s| ("slug", s)).collect()
}

// =============================================================================
// KeyValueCatalog
// =============================================================================

/// Key-value backed catalog.
///
/// ## Usage
/// ```rust,ignore
/// let catalog = KeyValueCatalog::in_memory(&KvConfig::default());
/// let page = catalog.list_products(&predicate, Pagination::default()).await?;
/// ```
#[derive(Clone)]
pub struct KeyValueCatalog {
    products: Arc<dyn KvTable>,
    departments: Arc<dyn KvTable>,
    categories: Arc<dyn KvTable>,
}

impl fmt::Debug for KeyValueCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValueCatalog")
            .field("products", &self.products.name())
            .field("departments", &self.departments.name())
            .field("categories", &self.categories.name())
            .finish()
    }
}

impl KeyValueCatalog {
    pub fn new(
        products: Arc<dyn KvTable>,
        departments: Arc<dyn KvTable>,
        categories: Arc<dyn KvTable>,
    ) -> Self {
        KeyValueCatalog {
            products,
            departments,
            categories,
        }
    }

    /// Three fresh [`MemoryTable`]s named after `config`.
    pub fn in_memory(config: &KvConfig) -> Self {
        info!(prefix = %config.table_prefix, "Creating in-memory key-value catalog");
        KeyValueCatalog::new(
            Arc::new(MemoryTable::new(config.table_name("products"))),
            Arc::new(MemoryTable::new(config.table_name("departments"))),
            Arc::new(MemoryTable::new(config.table_name("categories"))),
        )
    }

    /// Three [`DynamoTable`]s named after `config`, each confirmed to exist.
    pub async fn dynamodb(config: &KvConfig) -> DbResult<Self> {
        let client = dynamo::connect(config).await;
        let table = |entity: &str| Arc::new(DynamoTable::new(client.clone(), config.table_name(entity)));
        let catalog = KeyValueCatalog::new(table("products"), table("departments"), table("categories"));

        for table in [&catalog.products, &catalog.departments, &catalog.categories] {
            table.check().await?;
        }
        info!(prefix = %config.table_prefix, "Opened DynamoDB key-value catalog");
        Ok(catalog)
    }
}

#[async_trait]
impl CatalogRepository for KeyValueCatalog {
    // =========================================================================
    // Products
    // =========================================================================

    async fn get_product(&self, id: &str) -> DbResult<Product> {
        get_active(self.products.as_ref(), "Product", id).await
    }

    async fn list_products(
        &self,
        predicate: &ProductPredicate,
        page: Pagination,
    ) -> DbResult<ProductListResponse> {
        let filter = Condition::all(predicate.native_clauses().filter_map(clause_condition));
        let items = self.products.scan(filter.as_ref()).await?;

        let mut products: Vec<Product> = decode_all(items)?;
        let residual: Vec<&Clause> = predicate.residual_clauses().collect();
        if !residual.is_empty() {
            products.retain(|p| residual.iter().all(|c| c.matches(p)));
        }
        products.sort_by(|a, b| a.id.cmp(&b.id));

        let total_count = products.len() as i64;
        debug!(total = total_count, limit = page.limit, offset = page.offset, "Listed products");

        Ok(ProductListResponse {
            products: page.slice(products),
            total_count,
            limit: page.limit,
            offset: page.offset,
        })
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
        ensure_unique(
            self.products.as_ref(),
            &[("sku", product.sku.as_str()), ("slug", product.slug.as_str())],
            None,
        )
        .await?;

        self.products
            .put_item(to_item(&product)?, Some(&Condition::Missing))
            .await?;

        info!(id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    async fn update_product(&self, id: &str, changes: Vec<ProductChange>) -> DbResult<Product> {
        self.get_product(id).await?;
        ensure_changes("Product", &changes)?;

        let (department, category) = changed_references(&changes);
        ensure_product_references(self, department, category).await?;

        let slugs = slug_of(&changes, |c| match c {
            ProductChange::Slug(s) => Some(s.as_str()),
            _ => None,
        });
        ensure_unique(self.products.as_ref(), &slugs, Some(id)).await?;

        let actions = changes
            .iter()
            .map(product_action)
            .collect::<DbResult<Vec<_>>>()?;
        debug!(id = %id, fields = actions.len(), "Updating product");

        let item = update_active(self.products.as_ref(), "Product", id, actions).await?;
        from_item(item)
    }

    async fn delete_product(&self, id: &str) -> DbResult<()> {
        soft_delete(self.products.as_ref(), "Product", id).await?;
        info!(id = %id, "Product deleted");
        Ok(())
    }

    /// One guarded `update_item`:
    /// `Exists AND is_active AND stock + delta >= 0`, then `ADD stock delta`.
    async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<Product> {
        debug!(id = %id, delta = %delta, "Adjusting stock");

        let guard = Condition::And(vec![
            Condition::Exists,
            active(),
            Condition::SumGe {
                attr: "stock".into(),
                delta,
                min: 0,
            },
        ]);
        let update = UpdateExpr::new()
            .add("stock", delta)
            .set("updated_at", timestamp(Utc::now())?);

        match self.products.update_item(id, &update, Some(&guard)).await {
            Ok(item) => from_item(item),
            Err(DbError::ConditionFailed { .. }) => {
                let current = self.get_product(id).await?;
                Err(stock_rejection(id, current.stock, delta))
            }
            Err(other) => Err(other),
        }
    }

    async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        let filter = Condition::And(vec![
            active(),
            Condition::AttrLe("stock".into(), "min_stock".into()),
        ]);
        let mut products: Vec<Product> = decode_all(self.products.scan(Some(&filter)).await?)?;
        products.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(products)
    }

    // =========================================================================
    // Departments
    // =========================================================================

    async fn get_department(&self, id: &str) -> DbResult<Department> {
        get_active(self.departments.as_ref(), "Department", id).await
    }

    async fn list_departments(&self) -> DbResult<Vec<Department>> {
        let mut departments: Vec<Department> =
            decode_all(self.departments.scan(Some(&active())).await?)?;
        departments.sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
        Ok(departments)
    }

    async fn create_department(&self, request: CreateDepartmentRequest) -> DbResult<Department> {
        request.validate()?;
        let department = request.into_department(generate_id(), Utc::now());
        ensure_unique(self.departments.as_ref(), &[("slug", department.slug.as_str())], None).await?;

        self.departments
            .put_item(to_item(&department)?, Some(&Condition::Missing))
            .await?;

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

        let slugs = slug_of(&changes, |c| match c {
            DepartmentChange::Slug(s) => Some(s.as_str()),
            _ => None,
        });
        ensure_unique(self.departments.as_ref(), &slugs, Some(id)).await?;

        let actions = changes.iter().map(department_action).collect();
        let item = update_active(self.departments.as_ref(), "Department", id, actions).await?;
        from_item(item)
    }

    async fn delete_department(&self, id: &str) -> DbResult<()> {
        soft_delete(self.departments.as_ref(), "Department", id).await?;
        info!(id = %id, "Department deleted");
        Ok(())
    }

    // =========================================================================
    // Categories
    // =========================================================================

    async fn get_category(&self, id: &str) -> DbResult<Category> {
        get_active(self.categories.as_ref(), "Category", id).await
    }

    async fn list_categories(&self, parent_id: Option<&str>) -> DbResult<Vec<Category>> {
        let mut conditions = vec![active()];
        if let Some(parent) = parent_id {
            conditions.push(Condition::eq("parent_id", parent));
        }
        let filter = Condition::And(conditions);

        let mut categories: Vec<Category> = decode_all(self.categories.scan(Some(&filter)).await?)?;
        categories.sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
        Ok(categories)
    }

    async fn create_category(&self, request: CreateCategoryRequest) -> DbResult<Category> {
        request.validate()?;
        let parent = match request.parent() {
            Some(parent_id) => Some(self.get_category(parent_id).await?),
            None => None,
        };

        let level = level_under(parent.as_ref());
        let category = request.into_category(generate_id(), level, Utc::now());
        ensure_unique(self.categories.as_ref(), &[("slug", category.slug.as_str())], None).await?;

        self.categories
            .put_item(to_item(&category)?, Some(&Condition::Missing))
            .await?;

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

        let slugs = slug_of(&changes, |c| match c {
            CategoryChange::Slug(s) => Some(s.as_str()),
            _ => None,
        });
        ensure_unique(self.categories.as_ref(), &slugs, Some(id)).await?;

        let mut descendant_levels = Vec::new();
        if let Some(new_parent) = parent_change(&changes) {
            let parent = match new_parent {
                Some(parent_id) => Some(self.get_category(parent_id).await?),
                None => None,
            };
            let tree: Vec<Category> = decode_all(self.categories.scan(None).await?)?;
            let plan = plan_reparent(&current, parent.as_ref(), &tree)?;

            changes.push(CategoryChange::Level(plan.level));
            descendant_levels = plan.descendant_levels;
        }

        let actions = changes.iter().map(category_action).collect();
        let item = update_active(self.categories.as_ref(), "Category", id, actions).await?;

        let now = timestamp(Utc::now())?;
        for (descendant, level) in &descendant_levels {
            let update = UpdateExpr::new()
                .set("level", *level)
                .set("updated_at", now.clone());
            self.categories
                .update_item(descendant, &update, Some(&Condition::Exists))
                .await?;
        }
        debug!(id = %id, cascaded = descendant_levels.len(), "Category updated");

        from_item(item)
    }

    async fn delete_category(&self, id: &str) -> DbResult<()> {
        soft_delete(self.categories.as_ref(), "Category", id).await?;
        info!(id = %id, "Category deleted");
        Ok(())
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    async fn health_check(&self) -> bool {
        self.products.check().await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::{ErrorKind, Money};

    async fn seeded() -> (KeyValueCatalog, Product) {
        let catalog = KeyValueCatalog::in_memory(&KvConfig::new("test_"));
        let department = catalog
            .create_department(CreateDepartmentRequest {
                name: "Grocery".into(),
                slug: "grocery".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let category = catalog
            .create_category(CreateCategoryRequest {
                name: "Dairy".into(),
                slug: "dairy".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let product = catalog
            .create_product(CreateProductRequest {
                name: "Milk".into(),
                sku: "MILK-1".into(),
                slug: "milk-1".into(),
                price: Money::from_cents(199),
                department_id: department.id,
                category_id: category.id,
                stock: 10,
                min_stock: 5,
                ..Default::default()
            })
            .await
            .unwrap();
        (catalog, product)
    }

    #[test]
    fn test_search_is_not_a_scan_condition() {
        assert_eq!(clause_condition(&Clause::Search("milk".into())), None);
        assert_eq!(
            clause_condition(&Clause::PriceAtMost(Money::from_cents(500))),
            Some(Condition::Le("price".into(), 500.0))
        );
    }

    #[tokio::test]
    async fn test_item_round_trip_through_table() {
        let (catalog, product) = seeded().await;
        let fetched = catalog.get_product(&product.id).await.unwrap();
        assert_eq!(fetched, product);
    }

    #[tokio::test]
    async fn test_soft_delete_twice() {
        let (catalog, product) = seeded().await;

        catalog.delete_product(&product.id).await.unwrap();
        let err = catalog.delete_product(&product.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = catalog.get_product(&product.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_adjust_stock_on_deleted_product() {
        let (catalog, product) = seeded().await;
        catalog.delete_product(&product.id).await.unwrap();

        let err = catalog.adjust_stock(&product.id, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_slug_to_own_value_is_allowed() {
        let (catalog, product) = seeded().await;

        let updated = catalog
            .update_product(&product.id, vec![ProductChange::Slug("milk-1".into())])
            .await
            .unwrap();
        assert_eq!(updated.slug, "milk-1");
    }

    #[tokio::test]
    async fn test_update_product_writes_nested_attributes() {
        let (catalog, product) = seeded().await;
        let dims = catalog_core::Dimensions {
            length: 1.0,
            width: 2.0,
            height: 3.0,
        };

        let updated = catalog
            .update_product(
                &product.id,
                vec![
                    ProductChange::Dimensions(dims),
                    ProductChange::OriginalPrice(Money::from_cents(249)),
                ],
            )
            .await
            .unwrap();

        assert_eq!(updated.dimensions, dims);
        assert_eq!(updated.original_price, Some(Money::from_cents(249)));
    }
}

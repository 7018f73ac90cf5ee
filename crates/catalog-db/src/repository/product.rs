//! # Product Repository (relational)
//!
//! SQLite operations for products.
//!
//! ## Key Operations
//! - Filtered, paginated listing from a [`ProductPredicate`]
//! - Sparse updates from a [`ProductChange`] list
//! - Atomic conditional stock adjustment
//!
//! ## Predicate Translation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Clause                    SQL fragment                                 │
//! │  ─────────────────────     ──────────────────────────────────────────   │
//! │  Active                    is_active = 1                                │
//! │  CategoryIs(id)            category_id = ?                              │
//! │  DepartmentIs(id)          department_id = ?                            │
//! │  BrandIs(b)                brand = ?                                    │
//! │  PriceAtLeast(m)           price_cents >= ?                             │
//! │  PriceAtMost(m)            price_cents <= ?                             │
//! │  InStock                   stock > 0                                    │
//! │  OnSale                    is_on_sale = 1                               │
//! │  RatingAtLeast(r)          rating >= ?                                  │
//! │  Search(q)                 instr(search_text, ?) > 0                    │
//! │                                                                         │
//! │  COUNT(*) ─── same WHERE ───► total_count                              │
//! │  SELECT   ─── same WHERE ───► ORDER BY id LIMIT ? OFFSET ?             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `instr` instead of `LIKE` keeps `%` and `_` in a search term literal.
//! `search_text` is written by [`ProductRepository::insert`] and
//! [`ProductRepository::update`] with [`search_text`], because SQLite's
//! `lower()` only folds ASCII.

use std::collections::BTreeSet;

use catalog_core::filter::search_text;
use catalog_core::{
    Clause, Dimensions, Money, Pagination, Product, ProductChange,
    ProductListResponse, ProductPredicate,
};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::stock_rejection;

const PRODUCT_COLUMNS: &str = "id, sku, slug, name, description, price_cents, \
    original_price_cents, images, category_id, department_id, brand, unit, stock, \
    min_stock, weight, weight_unit, dim_length, dim_width, dim_height, is_on_sale, \
    discount, rating, reviews, is_active, tags, created_at, updated_at";


// =============================================================================
// Row Mapping
// =============================================================================

/// Flat row shape of the `products` table.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    sku: String,
    slug: String,
    name: String,
    description: String,
    price_cents: i64,
    original_price_cents: Option<i64>,
    images: String,
    category_id: String,
    department_id: String,
    brand: String,
    unit: String,
    stock: i64,
    min_stock: i64,
    weight: f64,
    weight_unit: String,
    dim_length: f64,
    dim_width: f64,
    dim_height: f64,
    is_on_sale: bool,
    discount: Option<f64>,
    rating: f64,
    reviews: i64,
    is_active: bool,
    tags: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = DbError;

    fn try_from(row: ProductRow) -> DbResult<Self> {
        let images: Vec<String> = serde_json::from_str(&row.images)?;
        let tags: BTreeSet<String> = serde_json::from_str(&row.tags)?;

        Ok(Product {
            id: row.id,
            sku: row.sku,
            slug: row.slug,
            name: row.name,
            description: row.description,
            price: Money::from_cents(row.price_cents),
            original_price: row.original_price_cents.map(Money::from_cents),
            images,
            category_id: row.category_id,
            department_id: row.department_id,
            brand: row.brand,
            unit: row.unit,
            stock: row.stock,
            min_stock: row.min_stock,
            weight: row.weight,
            weight_unit: row.weight_unit,
            dimensions: Dimensions {
                length: row.dim_length,
                width: row.dim_width,
                height: row.dim_height,
            },
            is_on_sale: row.is_on_sale,
            discount: row.discount,
            rating: row.rating,
            reviews: row.reviews,
            is_active: row.is_active,
            tags,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_products(rows: Vec<ProductRow>) -> DbResult<Vec<Product>> {
    rows.into_iter().map(Product::try_from).collect()
}

// =============================================================================
// SQL Builders
// =============================================================================

/// Appends ` WHERE ...` for every clause of the predicate.
fn push_predicate(qb: &mut QueryBuilder<'_, Sqlite>, predicate: &ProductPredicate) {
    if predicate.clauses().is_empty() {
        return;
    }
    qb.push(" WHERE ");
    let mut clauses = qb.separated(" AND ");
    for clause in predicate.clauses() {
        match clause {
            Clause::Active => {
                clauses.push("is_active = 1");
            }
            Clause::CategoryIs(id) => {
                clauses.push("category_id = ").push_bind_unseparated(id.clone());
            }
            Clause::DepartmentIs(id) => {
                clauses.push("department_id = ").push_bind_unseparated(id.clone());
            }
            Clause::BrandIs(brand) => {
                clauses.push("brand = ").push_bind_unseparated(brand.clone());
            }
            Clause::PriceAtLeast(min) => {
                clauses.push("price_cents >= ").push_bind_unseparated(min.cents());
            }
            Clause::PriceAtMost(max) => {
                clauses.push("price_cents <= ").push_bind_unseparated(max.cents());
            }
            Clause::InStock => {
                clauses.push("stock > 0");
            }
            Clause::OnSale => {
                clauses.push("is_on_sale = 1");
            }
            Clause::RatingAtLeast(min) => {
                clauses.push("rating >= ").push_bind_unseparated(*min);
            }
            Clause::Search(needle) => {
                clauses
                    .push("instr(search_text, ")
                    .push_bind_unseparated(needle.clone())
                    .push_unseparated(") > 0");
            }
        }
    }
}

/// Appends `col = ?` assignments for one change.
fn push_change(
    sets: &mut sqlx::query_builder::Separated<'_, '_, Sqlite, &'static str>,
    change: &ProductChange,
) -> DbResult<()> {
    match change {
        ProductChange::Name(v) => {
            sets.push("name = ").push_bind_unseparated(v.clone());
        }
        ProductChange::Description(v) => {
            sets.push("description = ").push_bind_unseparated(v.clone());
        }
        ProductChange::Slug(v) => {
            sets.push("slug = ").push_bind_unseparated(v.clone());
        }
        ProductChange::Price(v) => {
            sets.push("price_cents = ").push_bind_unseparated(v.cents());
        }
        ProductChange::OriginalPrice(v) => {
            sets.push("original_price_cents = ").push_bind_unseparated(v.cents());
        }
        ProductChange::CategoryId(v) => {
            sets.push("category_id = ").push_bind_unseparated(v.clone());
        }
        ProductChange::DepartmentId(v) => {
            sets.push("department_id = ").push_bind_unseparated(v.clone());
        }
        ProductChange::Brand(v) => {
            sets.push("brand = ").push_bind_unseparated(v.clone());
        }
        ProductChange::Unit(v) => {
            sets.push("unit = ").push_bind_unseparated(v.clone());
        }
        ProductChange::Images(v) => {
            sets.push("images = ").push_bind_unseparated(serde_json::to_string(v)?);
        }
        ProductChange::Stock(v) => {
            sets.push("stock = ").push_bind_unseparated(*v);
        }
        ProductChange::MinStock(v) => {
            sets.push("min_stock = ").push_bind_unseparated(*v);
        }
        ProductChange::Weight(v) => {
            sets.push("weight = ").push_bind_unseparated(*v);
        }
        ProductChange::WeightUnit(v) => {
            sets.push("weight_unit = ").push_bind_unseparated(v.clone());
        }
        ProductChange::Dimensions(d) => {
            sets.push("dim_length = ").push_bind_unseparated(d.length);
            sets.push("dim_width = ").push_bind_unseparated(d.width);
            sets.push("dim_height = ").push_bind_unseparated(d.height);
        }
        ProductChange::IsOnSale(v) => {
            sets.push("is_on_sale = ").push_bind_unseparated(*v);
        }
        ProductChange::Discount(v) => {
            sets.push("discount = ").push_bind_unseparated(*v);
        }
        ProductChange::Rating(v) => {
            sets.push("rating = ").push_bind_unseparated(*v);
        }
        ProductChange::Reviews(v) => {
            sets.push("reviews = ").push_bind_unseparated(*v);
        }
        ProductChange::IsActive(v) => {
            sets.push("is_active = ").push_bind_unseparated(*v);
        }
        ProductChange::Tags(v) => {
            sets.push("tags = ").push_bind_unseparated(serde_json::to_string(v)?);
        }
    }
    Ok(())
}

/// Fills in the offending value of a unique violation.
fn with_unique_value(err: DbError, sku: &str, slug: &str) -> DbError {
    match err {
        DbError::UniqueViolation { field, .. } if field == "sku" => DbError::duplicate(field, sku),
        DbError::UniqueViolation { field, .. } if field == "slug" => {
            DbError::duplicate(field, slug)
        }
        other => other,
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let page = repo.list(&filter.to_predicate(), filter.pagination()).await?;
/// let product = repo.adjust_stock("uuid-here", -2).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets an active product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ? AND is_active = 1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    /// Lists one page of products matching the predicate.
    ///
    /// ## How It Works
    /// 1. `COUNT(*)` over the predicate gives `total_count`
    /// 2. The same predicate, ordered by id, with `LIMIT`/`OFFSET` gives the page
    pub async fn list(
        &self,
        predicate: &ProductPredicate,
        page: Pagination,
    ) -> DbResult<ProductListResponse> {
        debug!(
            clauses = predicate.clauses().len(),
            limit = page.limit,
            offset = page.offset,
            "Listing products"
        );

        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM products");
        push_predicate(&mut count_qb, predicate);
        let total_count: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut page_qb = QueryBuilder::<Sqlite>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_predicate(&mut page_qb, predicate);
        page_qb
            .push(" ORDER BY id LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let rows: Vec<ProductRow> = page_qb.build_query_as().fetch_all(&self.pool).await?;

        let products = into_products(rows)?;
        debug!(total = total_count, count = products.len(), "Listed products");

        Ok(ProductListResponse {
            products,
            total_count,
            limit: page.limit,
            offset: page.offset,
        })
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - The inserted product
    /// * `Err(CoreError::Duplicate)` - SKU or slug already exists
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, slug, name, description,
                price_cents, original_price_cents, images,
                category_id, department_id, brand, unit,
                stock, min_stock, weight, weight_unit,
                dim_length, dim_width, dim_height,
                is_on_sale, discount, rating, reviews,
                is_active, tags, created_at, updated_at,
                search_text
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8,
                ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16,
                ?17, ?18, ?19,
                ?20, ?21, ?22, ?23,
                ?24, ?25, ?26, ?27,
                ?28
            )
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.slug)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(product.original_price.map(|p| p.cents()))
        .bind(serde_json::to_string(&product.images)?)
        .bind(&product.category_id)
        .bind(&product.department_id)
        .bind(&product.brand)
        .bind(&product.unit)
        .bind(product.stock)
        .bind(product.min_stock)
        .bind(product.weight)
        .bind(&product.weight_unit)
        .bind(product.dimensions.length)
        .bind(product.dimensions.width)
        .bind(product.dimensions.height)
        .bind(product.is_on_sale)
        .bind(product.discount)
        .bind(product.rating)
        .bind(product.reviews)
        .bind(product.is_active)
        .bind(serde_json::to_string(&product.tags)?)
        .bind(product.created_at)
        .bind(product.updated_at)
        .bind(search_text(product))
        .execute(&self.pool)
        .await
        .map_err(|e| with_unique_value(e.into(), &product.sku, &product.slug))?;

        Ok(product.clone())
    }

    /// Writes a non-empty change list to an active product.
    ///
    /// The field update and the `search_text` rewrite share one transaction.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - The product after the update
    /// * `Ok(None)` - No active product with this id
    pub async fn update(&self, id: &str, changes: &[ProductChange]) -> DbResult<Option<Product>> {
        debug!(id = %id, fields = changes.len(), "Updating product");

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE products SET ");
        {
            let mut sets = qb.separated(", ");
            for change in changes {
                push_change(&mut sets, change)?;
            }
            sets.push("updated_at = ").push_bind_unseparated(Utc::now());
        }
        qb.push(" WHERE id = ")
            .push_bind(id.to_string())
            .push(" AND is_active = 1 RETURNING ")
            .push(PRODUCT_COLUMNS);

        let slug = changes.iter().find_map(|c| match c {
            ProductChange::Slug(s) => Some(s.as_str()),
            _ => None,
        });

        let mut tx = self.pool.begin().await?;

        let row: Option<ProductRow> = qb
            .build_query_as()
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| with_unique_value(e.into(), "", slug.unwrap_or_default()))?;

        let Some(product) = row.map(Product::try_from).transpose()? else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query("UPDATE products SET search_text = ?1 WHERE id = ?2")
            .bind(search_text(&product))
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some(product))
    }

    /// Fills `search_text` for rows that predate the column.
    ///
    /// Returns the number of rows written.
    pub async fn backfill_search_text(&self) -> DbResult<u64> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE search_text = ''");
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        let mut written = 0;
        for product in into_products(rows)? {
            written += sqlx::query("UPDATE products SET search_text = ?1 WHERE id = ?2")
                .bind(search_text(&product))
                .bind(&product.id)
                .execute(&self.pool)
                .await?
                .rows_affected();
        }

        if written > 0 {
            debug!(rows = written, "Backfilled product search text");
        }
        Ok(written)
    }

    /// Adds `delta` to stock in a single conditional statement.
    ///
    /// ## Atomic Guard
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  ❌ WRONG: read stock, check in Rust, write stock                   │
    /// │     two concurrent -6 on stock 10 both pass the check → -2          │
    /// │                                                                     │
    /// │  ✅ CORRECT: one statement, guard in the WHERE                      │
    /// │     UPDATE products SET stock = stock + ?1                          │
    /// │     WHERE id = ?3 AND is_active = 1 AND stock + ?1 >= 0             │
    /// │     second -6 matches no row → InsufficientStock                    │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// When no row is updated, the product is re-read to tell a missing
    /// product apart from an overdraft or an overflowing delta.
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<Product> {
        debug!(id = %id, delta = %delta, "Adjusting stock");

        // The upper bound is checked first: an overflowing sum would be
        // stored as REAL and pass the lower bound.
        let sql = format!(
            "UPDATE products SET stock = stock + ?1, updated_at = ?2 \
             WHERE id = ?3 AND is_active = 1 \
             AND ?1 <= 9223372036854775807 - stock AND stock + ?1 >= 0 \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(delta)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Product::try_from(row),
            None => {
                let current = self
                    .get_by_id(id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Product", id))?;
                Err(stock_rejection(id, current.stock, delta))
            }
        }
    }

    /// Soft-deletes a product by setting is_active = false.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Active products at or below their reorder threshold.
    pub async fn list_low_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_active = 1 AND stock <= min_stock ORDER BY id"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        into_products(rows)
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

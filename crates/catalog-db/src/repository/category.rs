//! # Category Repository (relational)
//!
//! SQLite operations for the self-referencing category tree.
//!
//! A parent change is written together with the cascaded descendant
//! levels in one transaction:
//!
//! ```text
//! BEGIN
//!   UPDATE categories SET parent_id = ?, level = ?, ... WHERE id = ?   (moved)
//!   UPDATE categories SET level = ? WHERE id = ?                       (× descendants)
//! COMMIT
//! ```

use catalog_core::{Category, CategoryChange};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

const CATEGORY_COLUMNS: &str =
    "id, name, slug, description, parent_id, level, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: String,
    name: String,
    slug: String,
    description: String,
    parent_id: Option<String>,
    level: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            parent_id: row.parent_id,
            level: row.level,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn slug_conflict(err: sqlx::Error, slug: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { field, .. } => DbError::duplicate(field, slug),
        other => other,
    }
}

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// Gets an active category by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Category>> {
        let sql =
            format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ? AND is_active = 1");
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Category::from))
    }

    /// Lists active categories, optionally only the children of `parent_id`.
    pub async fn list(&self, parent_id: Option<&str>) -> DbResult<Vec<Category>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE is_active = 1"
        ));
        if let Some(parent) = parent_id {
            qb.push(" AND parent_id = ").push_bind(parent.to_string());
        }
        qb.push(" ORDER BY name, id");

        let rows: Vec<CategoryRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Every stored category, inactive ones included.
    ///
    /// The tree rules need the full parent graph, since a soft-deleted
    /// category can still have children.
    pub async fn list_all(&self) -> DbResult<Vec<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY id");
        let rows = sqlx::query_as::<_, CategoryRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Inserts a new category.
    pub async fn insert(&self, category: &Category) -> DbResult<Category> {
        debug!(slug = %category.slug, level = category.level, "Inserting category");

        sqlx::query(
            r#"
            INSERT INTO categories (
                id, name, slug, description, parent_id, level, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(&category.parent_id)
        .bind(category.level)
        .bind(category.is_active)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| slug_conflict(e, &category.slug))?;

        Ok(category.clone())
    }

    /// Writes a change list and any cascaded descendant levels atomically.
    ///
    /// ## Returns
    /// * `Ok(Some(Category))` - The category after the update
    /// * `Ok(None)` - No active category with this id (nothing written)
    pub async fn update(
        &self,
        id: &str,
        changes: &[CategoryChange],
        descendant_levels: &[(String, i64)],
    ) -> DbResult<Option<Category>> {
        debug!(
            id = %id,
            fields = changes.len(),
            cascaded = descendant_levels.len(),
            "Updating category"
        );

        let now = Utc::now();
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE categories SET ");
        {
            let mut sets = qb.separated(", ");
            for change in changes {
                match change {
                    CategoryChange::Name(v) => {
                        sets.push("name = ").push_bind_unseparated(v.clone());
                    }
                    CategoryChange::Slug(v) => {
                        sets.push("slug = ").push_bind_unseparated(v.clone());
                    }
                    CategoryChange::Description(v) => {
                        sets.push("description = ").push_bind_unseparated(v.clone());
                    }
                    CategoryChange::Parent(v) => {
                        sets.push("parent_id = ").push_bind_unseparated(v.clone());
                    }
                    CategoryChange::Level(v) => {
                        sets.push("level = ").push_bind_unseparated(*v);
                    }
                    CategoryChange::IsActive(v) => {
                        sets.push("is_active = ").push_bind_unseparated(*v);
                    }
                }
            }
            sets.push("updated_at = ").push_bind_unseparated(now);
        }
        qb.push(" WHERE id = ")
            .push_bind(id.to_string())
            .push(" AND is_active = 1 RETURNING ")
            .push(CATEGORY_COLUMNS);

        let slug = changes
            .iter()
            .find_map(|c| match c {
                CategoryChange::Slug(s) => Some(s.as_str()),
                _ => None,
            })
            .unwrap_or_default();

        let mut tx = self.pool.begin().await?;

        let row: Option<CategoryRow> = qb
            .build_query_as()
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| slug_conflict(e, slug))?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        for (descendant, level) in descendant_levels {
            sqlx::query("UPDATE categories SET level = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(level)
                .bind(now)
                .bind(descendant)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(Some(Category::from(row)))
    }

    /// Soft-deletes a category. Children keep their parent reference.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting category");

        let result = sqlx::query(
            "UPDATE categories SET is_active = 0, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        Ok(())
    }
}

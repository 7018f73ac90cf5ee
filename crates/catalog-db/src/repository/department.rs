//! # Department Repository (relational)
//!
//! SQLite operations for departments, the flat top-level grouping of
//! products.

use catalog_core::{Department, DepartmentChange};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};

const DEPARTMENT_COLUMNS: &str =
    "id, name, description, icon, image, slug, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct DepartmentRow {
    id: String,
    name: String,
    description: String,
    icon: String,
    image: String,
    slug: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DepartmentRow> for Department {
    fn from(row: DepartmentRow) -> Self {
        Department {
            id: row.id,
            name: row.name,
            description: row.description,
            icon: row.icon,
            image: row.image,
            slug: row.slug,
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

/// Repository for department database operations.
#[derive(Debug, Clone)]
pub struct DepartmentRepository {
    pool: SqlitePool,
}

impl DepartmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DepartmentRepository { pool }
    }

    /// Gets an active department by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Department>> {
        let sql = format!(
            "SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE id = ? AND is_active = 1"
        );
        let row = sqlx::query_as::<_, DepartmentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Department::from))
    }

    /// Lists active departments ordered by name, then id.
    pub async fn list(&self) -> DbResult<Vec<Department>> {
        let sql = format!(
            "SELECT {DEPARTMENT_COLUMNS} FROM departments WHERE is_active = 1 ORDER BY name, id"
        );
        let rows = sqlx::query_as::<_, DepartmentRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Department::from).collect())
    }

    /// Inserts a new department.
    pub async fn insert(&self, department: &Department) -> DbResult<Department> {
        debug!(slug = %department.slug, "Inserting department");

        sqlx::query(
            r#"
            INSERT INTO departments (
                id, name, description, icon, image, slug, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&department.id)
        .bind(&department.name)
        .bind(&department.description)
        .bind(&department.icon)
        .bind(&department.image)
        .bind(&department.slug)
        .bind(department.is_active)
        .bind(department.created_at)
        .bind(department.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| slug_conflict(e, &department.slug))?;

        Ok(department.clone())
    }

    /// Writes a non-empty change list; `None` when no active row matched.
    pub async fn update(
        &self,
        id: &str,
        changes: &[DepartmentChange],
    ) -> DbResult<Option<Department>> {
        debug!(id = %id, fields = changes.len(), "Updating department");

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE departments SET ");
        {
            let mut sets = qb.separated(", ");
            for change in changes {
                match change {
                    DepartmentChange::Name(v) => {
                        sets.push("name = ").push_bind_unseparated(v.clone());
                    }
                    DepartmentChange::Description(v) => {
                        sets.push("description = ").push_bind_unseparated(v.clone());
                    }
                    DepartmentChange::Icon(v) => {
                        sets.push("icon = ").push_bind_unseparated(v.clone());
                    }
                    DepartmentChange::Image(v) => {
                        sets.push("image = ").push_bind_unseparated(v.clone());
                    }
                    DepartmentChange::Slug(v) => {
                        sets.push("slug = ").push_bind_unseparated(v.clone());
                    }
                    DepartmentChange::IsActive(v) => {
                        sets.push("is_active = ").push_bind_unseparated(*v);
                    }
                }
            }
            sets.push("updated_at = ").push_bind_unseparated(Utc::now());
        }
        qb.push(" WHERE id = ")
            .push_bind(id.to_string())
            .push(" AND is_active = 1 RETURNING ")
            .push(DEPARTMENT_COLUMNS);

        let slug = changes
            .iter()
            .find_map(|c| match c {
                DepartmentChange::Slug(s) => Some(s.as_str()),
                _ => None,
            })
            .unwrap_or_default();

        let row: Option<DepartmentRow> = qb
            .build_query_as()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| slug_conflict(e, slug))?;

        Ok(row.map(Department::from))
    }

    /// Soft-deletes a department.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting department");

        let result = sqlx::query(
            "UPDATE departments SET is_active = 0, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Department", id));
        }

        Ok(())
    }
}

//! Product category hierarchy

use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use shared::{build_category_tree, category_path, Category, CategoryNode, CreateCategoryRequest};

#[derive(Clone)]
pub struct CategoryService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    parent_id: Option<Uuid>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            parent_id: row.parent_id,
        }
    }
}

impl CategoryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: CreateCategoryRequest) -> AppResult<Category> {
        input.validate()?;

        if let Some(parent_id) = input.parent_id {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1)",
            )
            .bind(parent_id)
            .fetch_one(&self.db)
            .await?;
            if !exists {
                return Err(AppError::NotFound("Parent category".to_string()));
            }
        }

        let row = sqlx::query_as::<_, CategoryRow>(
            "INSERT INTO categories (name, parent_id) VALUES ($1, $2) RETURNING id, name, parent_id",
        )
        .bind(input.name.trim())
        .bind(input.parent_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(category_id = %row.id, "category created");
        Ok(row.into())
    }

    pub async fn list(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, parent_id FROM categories ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn tree(&self) -> AppResult<Vec<CategoryNode>> {
        Ok(build_category_tree(&self.list().await?))
    }

    /// Ancestor chain from the root down to `id`
    pub async fn path(&self, id: Uuid) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r#"
            WITH RECURSIVE ancestors AS (
                SELECT id, name, parent_id, 0 AS depth FROM categories WHERE id = $1
                UNION
                SELECT c.id, c.name, c.parent_id, a.depth + 1
                FROM categories c
                JOIN ancestors a ON c.id = a.parent_id
                WHERE a.depth < 64
            )
            SELECT id, name, parent_id FROM ancestors
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        if rows.is_empty() {
            return Err(AppError::NotFound("Category".to_string()));
        }

        let categories: Vec<Category> = rows.into_iter().map(Into::into).collect();
        Ok(category_path(&categories, id))
    }

    /// `id` and every category below it
    pub async fn descendants(&self, id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            WITH RECURSIVE subtree AS (
                SELECT id FROM categories WHERE id = $1
                UNION
                SELECT c.id FROM categories c JOIN subtree s ON c.parent_id = s.id
            )
            SELECT id FROM subtree
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        if ids.is_empty() {
            return Err(AppError::NotFound("Category".to_string()));
        }
        Ok(ids)
    }
}

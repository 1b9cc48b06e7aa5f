//! Categories repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use super::{CategoryRepositoryTx, PgExecutor};
use crate::{
    error::{AppError, AppResult},
    models::Category,
};

#[derive(Clone)]
pub struct CategoriesRepository {
    executor: PgExecutor,
}

impl CategoriesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            executor: PgExecutor::Pool(pool),
        }
    }

    /// Get category by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<Category> {
        self.executor
            .fetch_optional(
                sqlx::query_as::<_, Category>("SELECT id, name, created_at FROM categories WHERE id = $1")
                    .bind(id),
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))
    }

    /// Rename a category
    pub async fn update(&self, id: i64, name: &str) -> AppResult<Category> {
        self.executor
            .fetch_optional(
                sqlx::query_as::<_, Category>(
                    "UPDATE categories SET name = $1 WHERE id = $2 RETURNING id, name, created_at",
                )
                .bind(name)
                .bind(id),
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))
    }

    /// Delete category (its book relations go with it)
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let result = self
            .executor
            .execute(sqlx::query("DELETE FROM categories WHERE id = $1").bind(id))
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Category {} not found", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl CategoryRepositoryTx<PgExecutor> for CategoriesRepository {
    async fn create(&self, category: &mut Category) -> AppResult<()> {
        let (id, created_at) = self
            .executor
            .fetch_one(
                sqlx::query_as::<_, (i64, DateTime<Utc>)>(
                    "INSERT INTO categories (name) VALUES ($1) RETURNING id, created_at",
                )
                .bind(&category.name),
            )
            .await?;
        category.id = id;
        category.created_at = Some(created_at);
        Ok(())
    }

    async fn get_all(&self) -> AppResult<Vec<Category>> {
        self.executor
            .fetch_all(sqlx::query_as::<_, Category>(
                "SELECT id, name, created_at FROM categories ORDER BY name",
            ))
            .await
    }

    fn with_tx(&self, executor: PgExecutor) -> Self {
        Self { executor }
    }
}

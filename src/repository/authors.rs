//! Authors repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::{AuthorRepositoryTx, PgExecutor};
use crate::{
    error::{AppError, AppResult},
    models::Author,
};

#[derive(Clone)]
pub struct AuthorsRepository {
    executor: PgExecutor,
}

impl AuthorsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            executor: PgExecutor::Pool(pool),
        }
    }

    #[cfg(test)]
    pub fn executor(&self) -> &PgExecutor {
        &self.executor
    }

    /// Get author by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<Author> {
        self.executor
            .fetch_optional(
                sqlx::query_as::<_, Author>("SELECT id, name, description FROM authors WHERE id = $1")
                    .bind(id),
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Author {} not found", id)))
    }

    /// Update author name and description
    pub async fn update(&self, author: &Author) -> AppResult<Author> {
        self.executor
            .fetch_optional(
                sqlx::query_as::<_, Author>(
                    "UPDATE authors SET name = $1, description = $2 WHERE id = $3 RETURNING id, name, description",
                )
                .bind(&author.name)
                .bind(&author.description)
                .bind(author.id),
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Author {} not found", author.id)))
    }

    /// Delete author
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let result = self
            .executor
            .execute(sqlx::query("DELETE FROM authors WHERE id = $1").bind(id))
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Author {} not found", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthorRepositoryTx<PgExecutor> for AuthorsRepository {
    async fn create(&self, author: &mut Author) -> AppResult<()> {
        author.id = self
            .executor
            .fetch_scalar(
                sqlx::query_scalar::<_, i64>(
                    "INSERT INTO authors (name, description) VALUES ($1, $2) RETURNING id",
                )
                .bind(&author.name)
                .bind(&author.description),
            )
            .await?;
        Ok(())
    }

    async fn get_all(&self) -> AppResult<Vec<Author>> {
        self.executor
            .fetch_all(sqlx::query_as::<_, Author>(
                "SELECT id, name, description FROM authors ORDER BY id",
            ))
            .await
    }

    fn with_tx(&self, executor: PgExecutor) -> Self {
        Self { executor }
    }
}

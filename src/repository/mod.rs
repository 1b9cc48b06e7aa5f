//! Repository layer for database operations

pub mod authors;
pub mod books;
pub mod categories;
pub mod executor;
#[cfg(test)]
pub mod memory;
pub mod unit_of_work;
pub mod users;

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{Author, Book, Category},
};

pub use executor::PgExecutor;
pub use unit_of_work::{PgUnitOfWork, UnitOfWork};

/// Author persistence that can be rebound onto a transaction executor `E`
#[async_trait]
pub trait AuthorRepositoryTx<E>: Send + Sync + Sized {
    /// Insert the author and store the assigned id in `author.id`
    async fn create(&self, author: &mut Author) -> AppResult<()>;

    async fn get_all(&self) -> AppResult<Vec<Author>>;

    /// New repository bound to `executor`; `self` keeps its own executor
    fn with_tx(&self, executor: E) -> Self;
}

/// Category persistence that can be rebound onto a transaction executor `E`
#[async_trait]
pub trait CategoryRepositoryTx<E>: Send + Sync + Sized {
    /// Insert the category and store the assigned id and creation date
    async fn create(&self, category: &mut Category) -> AppResult<()>;

    async fn get_all(&self) -> AppResult<Vec<Category>>;

    fn with_tx(&self, executor: E) -> Self;
}

/// Book persistence that can be rebound onto a transaction executor `E`
#[async_trait]
pub trait BookRepositoryTx<E>: Send + Sync + Sized {
    /// Insert the book row (title, description, content, author_id) and
    /// store the assigned id and timestamps
    async fn create(&self, book: &mut Book) -> AppResult<()>;

    /// All book rows, without author or categories
    async fn get_all(&self) -> AppResult<Vec<Book>>;

    /// Insert the `book_category` join row
    async fn relation_book_category(&self, book_id: i64, category_id: i64) -> AppResult<()>;

    fn with_tx(&self, executor: E) -> Self;
}

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub unit_of_work: PgUnitOfWork,
    pub authors: authors::AuthorsRepository,
    pub categories: categories::CategoriesRepository,
    pub books: books::BooksRepository,
    pub users: users::UsersRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>, transaction_timeout: Option<Duration>) -> Self {
        Self {
            unit_of_work: PgUnitOfWork::new(pool.clone(), transaction_timeout),
            authors: authors::AuthorsRepository::new(pool.clone()),
            categories: categories::CategoriesRepository::new(pool.clone()),
            books: books::BooksRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            pool,
        }
    }

    /// Check database connectivity
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

//! Books repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};

use super::{BookRepositoryTx, PgExecutor};
use crate::{
    error::{AppError, AppResult},
    models::{Author, Book, BookQuery, Category},
};

const BOOK_COLUMNS: &str = "id, title, description, content, author_id, created_at, updated_at";

const JOINED_SELECT: &str = r#"
    SELECT b.id, b.title, b.description, b.content, b.author_id,
           b.created_at, b.updated_at,
           a.name AS author_name, a.description AS author_description,
           c.id AS category_id, c.name AS category_name, c.created_at AS category_created_at
    FROM books b
    JOIN authors a ON a.id = b.author_id
"#;

#[derive(Clone)]
pub struct BooksRepository {
    executor: PgExecutor,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            executor: PgExecutor::Pool(pool),
        }
    }

    /// Books with their author and categories.
    ///
    /// Filters are case-sensitive prefix matches joined with AND. Pages of
    /// `page_size` books apply only when no filter is set and `page > 0`.
    pub async fn search(&self, query: &BookQuery, page_size: i64) -> AppResult<Vec<Book>> {
        let mut sql = format!(
            "{} JOIN book_category bc ON bc.book_id = b.id JOIN categories c ON c.id = bc.category_id",
            JOINED_SELECT
        );
        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        for (column, value) in query.filters() {
            params.push(format!("{}%", escape_like(value)));
            conditions.push(format!("{} LIKE ${} ESCAPE '\\'", column, params.len()));
        }

        let page = query.page.filter(|p| *p > 0 && !query.has_filter());
        let offset = page.map(|page| page_offset(page, page_size)).transpose()?;
        if offset.is_some() {
            conditions.push(
                "b.id IN (SELECT DISTINCT book_id FROM book_category ORDER BY book_id LIMIT $1 OFFSET $2)"
                    .to_string(),
            );
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY b.id, c.id");

        let mut statement = sqlx::query(&sql);
        if let Some(offset) = offset {
            statement = statement.bind(page_size).bind(offset);
        }
        for param in &params {
            statement = statement.bind(param);
        }

        let rows = self.executor.fetch_rows(statement).await?;
        aggregate(&rows)
    }

    /// Get one book with its author and all its categories
    pub async fn get_by_id(&self, id: i64) -> AppResult<Book> {
        let sql = format!(
            "{} LEFT JOIN book_category bc ON bc.book_id = b.id \
             LEFT JOIN categories c ON c.id = bc.category_id \
             WHERE b.id = $1 ORDER BY c.id",
            JOINED_SELECT
        );
        let rows = self.executor.fetch_rows(sqlx::query(&sql).bind(id)).await?;

        aggregate(&rows)?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
    }

    /// Update title, description, content and author
    pub async fn update(&self, book: &Book) -> AppResult<Book> {
        let sql = format!(
            "UPDATE books SET title = $1, description = $2, content = $3, author_id = $4, updated_at = NOW() \
             WHERE id = $5 RETURNING {}",
            BOOK_COLUMNS
        );
        self.executor
            .fetch_optional(
                sqlx::query_as::<_, Book>(&sql)
                    .bind(&book.title)
                    .bind(&book.description)
                    .bind(&book.content)
                    .bind(book.author_id)
                    .bind(book.id),
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book.id)))
    }

    /// Delete book (its category relations go with it)
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let result = self
            .executor
            .execute(sqlx::query("DELETE FROM books WHERE id = $1").bind(id))
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book {} not found", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl BookRepositoryTx<PgExecutor> for BooksRepository {
    async fn create(&self, book: &mut Book) -> AppResult<()> {
        let (id, created_at, updated_at) = self
            .executor
            .fetch_one(
                sqlx::query_as::<_, (i64, DateTime<Utc>, DateTime<Utc>)>(
                    r#"
                    INSERT INTO books (title, description, content, author_id)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id, created_at, updated_at
                    "#,
                )
                .bind(&book.title)
                .bind(&book.description)
                .bind(&book.content)
                .bind(book.author_id),
            )
            .await?;
        book.id = id;
        book.created_at = Some(created_at);
        book.updated_at = Some(updated_at);
        Ok(())
    }

    async fn get_all(&self) -> AppResult<Vec<Book>> {
        let sql = format!("SELECT {} FROM books ORDER BY id", BOOK_COLUMNS);
        self.executor.fetch_all(sqlx::query_as::<_, Book>(&sql)).await
    }

    async fn relation_book_category(&self, book_id: i64, category_id: i64) -> AppResult<()> {
        self.executor
            .execute(
                sqlx::query("INSERT INTO book_category (book_id, category_id) VALUES ($1, $2)")
                    .bind(book_id)
                    .bind(category_id),
            )
            .await?;
        Ok(())
    }

    fn with_tx(&self, executor: PgExecutor) -> Self {
        Self { executor }
    }
}

/// Rows skipped before `page` (1-based)
fn page_offset(page: i64, page_size: i64) -> AppResult<i64> {
    page.checked_sub(1)
        .and_then(|skipped| skipped.checked_mul(page_size))
        .ok_or_else(|| AppError::BadRequest(format!("Page {} is out of range", page)))
}

/// Escape LIKE wildcards so user input only matches literally
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Fold one row per (book, category) into books, keeping row order
fn aggregate(rows: &[PgRow]) -> AppResult<Vec<Book>> {
    let mut books: IndexMap<i64, Book> = IndexMap::new();

    for row in rows {
        let id: i64 = row.try_get("id")?;
        if !books.contains_key(&id) {
            let author_id: i64 = row.try_get("author_id")?;
            books.insert(
                id,
                Book {
                    id,
                    title: row.try_get("title")?,
                    description: row.try_get("description")?,
                    content: row.try_get("content")?,
                    author_id,
                    created_at: row.try_get("created_at")?,
                    updated_at: row.try_get("updated_at")?,
                    categories: Vec::new(),
                    author: Author {
                        id: author_id,
                        name: row.try_get("author_name")?,
                        description: row.try_get("author_description")?,
                    },
                },
            );
        }

        let category_id: Option<i64> = row.try_get("category_id")?;
        if let (Some(category_id), Some(book)) = (category_id, books.get_mut(&id)) {
            book.categories.push(Category {
                id: category_id,
                name: row.try_get("category_name")?,
                created_at: row.try_get("category_created_at")?,
            });
        }
    }

    Ok(books.into_values().collect())
}

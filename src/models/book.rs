//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use super::{
    author::{Author, CreateAuthor},
    category::{Category, CreateCategory},
};

/// Book with its author and categories.
///
/// `author` carries the author created alongside the book; on a successful
/// creation `author_id` mirrors `author.id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow, Validate, ToSchema)]
pub struct Book {
    #[serde(default)]
    pub id: i64,
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description must not be empty"))]
    pub description: String,
    #[validate(length(min = 1, message = "Content must not be empty"))]
    pub content: String,
    #[serde(default)]
    pub author_id: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    #[sqlx(skip)]
    pub categories: Vec<Category>,
    #[sqlx(skip)]
    #[validate(custom(function = "author_has_name"))]
    pub author: Author,
}

fn author_has_name(author: &Author) -> Result<(), ValidationError> {
    if author.name.is_empty() {
        let mut err = ValidationError::new("author_name");
        err.message = Some("Author name must not be empty".into());
        return Err(err);
    }
    Ok(())
}

/// Create book request: the author and categories are created with the book
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBook {
    pub title: String,
    pub description: String,
    pub content: String,
    pub author: CreateAuthor,
    #[serde(default)]
    pub categories: Vec<CreateCategory>,
}

impl From<CreateBook> for Book {
    fn from(data: CreateBook) -> Self {
        Self {
            title: data.title,
            description: data.description,
            content: data.content,
            author: data.author.into(),
            categories: data.categories.into_iter().map(Category::from).collect(),
            ..Default::default()
        }
    }
}

/// Update book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description must not be empty"))]
    pub description: String,
    #[validate(length(min = 1, message = "Content must not be empty"))]
    pub content: String,
    pub author_id: i64,
}

/// Relate an existing book to an existing category
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct BookCategory {
    pub book_id: i64,
    pub category_id: i64,
}

/// Book listing filters (prefix matches)
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    pub title: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    /// Page number, only honoured when no filter is set
    pub page: Option<i64>,
}

impl BookQuery {
    /// Non-empty filters, in (title, author, category) order
    pub fn filters(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        [
            ("b.title", self.title.as_deref()),
            ("a.name", self.author.as_deref()),
            ("c.name", self.category.as_deref()),
        ]
        .into_iter()
        .filter_map(|(column, value)| value.filter(|v| !v.is_empty()).map(|v| (column, v)))
    }

    pub fn has_filter(&self) -> bool {
        self.filters().next().is_some()
    }
}

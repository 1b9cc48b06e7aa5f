//! Author model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Full author model from database
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow, Validate, ToSchema)]
pub struct Author {
    #[serde(default)]
    pub id: i64,
    #[validate(length(min = 1, message = "Author name must not be empty"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Author description must not be empty"))]
    pub description: String,
}

/// Create author request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAuthor {
    pub name: String,
    /// Optional when the author is embedded in a new book
    #[serde(default)]
    pub description: String,
}

/// Update author request
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAuthor {
    pub name: String,
    pub description: String,
}

impl From<CreateAuthor> for Author {
    fn from(data: CreateAuthor) -> Self {
        Self {
            id: 0,
            name: data.name,
            description: data.description,
        }
    }
}

impl Author {
    /// Build the row written by an update of author `id`
    pub fn updated(id: i64, data: UpdateAuthor) -> Self {
        Self {
            id,
            name: data.name,
            description: data.description,
        }
    }
}

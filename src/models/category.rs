//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Category record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow, Validate, ToSchema)]
pub struct Category {
    #[serde(default)]
    pub id: i64,
    #[validate(length(min = 1, message = "Category name must not be empty"))]
    pub name: String,
    /// Assigned by the store on insert
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Create or rename category request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategory {
    pub name: String,
}

pub type UpdateCategory = CreateCategory;

impl From<CreateCategory> for Category {
    fn from(data: CreateCategory) -> Self {
        Self {
            id: 0,
            name: data.name,
            created_at: None,
        }
    }
}

//! Categories service

use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        category::{CreateCategory, UpdateCategory},
        Category,
    },
    repository::{CategoryRepositoryTx, Repository},
};

#[derive(Clone)]
pub struct CategoriesService {
    repository: Repository,
}

impl CategoriesService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn create(&self, data: CreateCategory) -> AppResult<Category> {
        let mut category = Category::from(data);
        category.validate()?;
        self.repository.categories.create(&mut category).await?;
        tracing::info!("Created category {}", category.id);
        Ok(category)
    }

    pub async fn get_all(&self) -> AppResult<Vec<Category>> {
        self.repository.categories.get_all().await
    }

    pub async fn get_by_id(&self, id: i64) -> AppResult<Category> {
        self.repository.categories.get_by_id(id).await
    }

    /// Rename a category
    pub async fn update(&self, id: i64, data: UpdateCategory) -> AppResult<Category> {
        let category = Category {
            id,
            ..Category::from(data)
        };
        category.validate()?;
        self.repository.categories.update(id, &category.name).await
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        self.repository.categories.delete(id).await
    }
}

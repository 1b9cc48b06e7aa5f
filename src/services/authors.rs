//! Authors service

use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        author::{CreateAuthor, UpdateAuthor},
        Author,
    },
    repository::{AuthorRepositoryTx, Repository},
};

#[derive(Clone)]
pub struct AuthorsService {
    repository: Repository,
}

impl AuthorsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn create(&self, data: CreateAuthor) -> AppResult<Author> {
        let mut author = Author::from(data);
        author.validate()?;
        self.repository.authors.create(&mut author).await?;
        tracing::info!("Created author {}", author.id);
        Ok(author)
    }

    pub async fn get_all(&self) -> AppResult<Vec<Author>> {
        self.repository.authors.get_all().await
    }

    pub async fn get_by_id(&self, id: i64) -> AppResult<Author> {
        self.repository.authors.get_by_id(id).await
    }

    pub async fn update(&self, id: i64, data: UpdateAuthor) -> AppResult<Author> {
        let author = Author::updated(id, data);
        author.validate()?;
        self.repository.authors.update(&author).await
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        self.repository.authors.delete(id).await
    }
}

//! Business logic services

pub mod authors;
pub mod books;
pub mod categories;
pub mod users;

use crate::{
    config::{AuthConfig, CatalogConfig},
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub authors: authors::AuthorsService,
    pub categories: categories::CategoriesService,
    pub books: books::BooksService,
    pub users: users::UsersService,
    pub repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig, catalog_config: CatalogConfig) -> Self {
        Self {
            authors: authors::AuthorsService::new(repository.clone()),
            categories: categories::CategoriesService::new(repository.clone()),
            books: books::BooksService::new(repository.clone(), catalog_config.page_size),
            users: users::UsersService::new(repository.clone(), auth_config),
            repository,
        }
    }
}

//! Data models for Biblioteca

pub mod author;
pub mod book;
pub mod category;
pub mod user;

// Re-export commonly used types
pub use author::Author;
pub use book::{Book, BookCategory, BookQuery};
pub use category::Category;
pub use user::{Role, User, UserClaims, UserShort};

//! Book service: atomic creation of a book with its author and categories

use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        book::{CreateBook, UpdateBook},
        Book, BookCategory, BookQuery,
    },
    repository::{
        authors::AuthorsRepository, books::BooksRepository, categories::CategoriesRepository,
        AuthorRepositoryTx, BookRepositoryTx, CategoryRepositoryTx, PgUnitOfWork, Repository,
        UnitOfWork,
    },
};

/// Creates a book, its author and its categories in one unit of work.
///
/// The author is always inserted, never looked up. Categories are created
/// and related in input order; the first failure rolls everything back.
#[derive(Clone)]
pub struct BookCreator<U, A, C, B> {
    unit_of_work: U,
    authors: A,
    categories: C,
    books: B,
}

impl<U, A, C, B> BookCreator<U, A, C, B>
where
    U: UnitOfWork,
    A: AuthorRepositoryTx<U::Executor>,
    C: CategoryRepositoryTx<U::Executor>,
    B: BookRepositoryTx<U::Executor>,
{
    pub fn new(unit_of_work: U, authors: A, categories: C, books: B) -> Self {
        Self {
            unit_of_work,
            authors,
            categories,
            books,
        }
    }

    /// Validate, then insert author, book and (category, relation) pairs.
    ///
    /// On success every id of the returned book is set, `author_id` included.
    /// Invalid input fails before any transaction is begun.
    pub async fn create(&self, mut book: Book) -> AppResult<Book> {
        book.validate()?;

        let (authors, categories, books) = (&self.authors, &self.categories, &self.books);
        let book = self
            .unit_of_work
            .execute(move |executor| {
                let authors = authors.with_tx(executor.clone());
                let categories = categories.with_tx(executor.clone());
                let books = books.with_tx(executor);

                async move {
                    authors.create(&mut book.author).await?;
                    book.author_id = book.author.id;

                    books.create(&mut book).await?;

                    let book_id = book.id;
                    for category in book.categories.iter_mut() {
                        categories.create(category).await?;
                        books.relation_book_category(book_id, category.id).await?;
                    }

                    Ok(book)
                }
            })
            .await?;

        tracing::info!(
            "Created book {} with author {} and {} categories",
            book.id,
            book.author_id,
            book.categories.len()
        );
        Ok(book)
    }
}

pub type PgBookCreator = BookCreator<PgUnitOfWork, AuthorsRepository, CategoriesRepository, BooksRepository>;

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
    creator: PgBookCreator,
    page_size: i64,
}

impl BooksService {
    pub fn new(repository: Repository, page_size: i64) -> Self {
        let creator = BookCreator::new(
            repository.unit_of_work.clone(),
            repository.authors.clone(),
            repository.categories.clone(),
            repository.books.clone(),
        );
        Self {
            repository,
            creator,
            page_size,
        }
    }

    /// Create a book together with its author and categories
    pub async fn create(&self, data: CreateBook) -> AppResult<Book> {
        self.creator.create(Book::from(data)).await
    }

    /// List books with author and categories, filtered or paginated
    pub async fn search(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        self.repository.books.search(query, self.page_size).await
    }

    pub async fn get_by_id(&self, id: i64) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Update a book row and return it with its author and categories
    pub async fn update(&self, id: i64, data: UpdateBook) -> AppResult<Book> {
        data.validate()?;
        let book = Book {
            id,
            title: data.title,
            description: data.description,
            content: data.content,
            author_id: data.author_id,
            ..Default::default()
        };
        self.repository.books.update(&book).await?;
        self.get_by_id(id).await
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        self.repository.books.delete(id).await
    }

    /// Relate an existing book and an existing category
    pub async fn relate(&self, relation: BookCategory) -> AppResult<()> {
        self.repository
            .books
            .relation_book_category(relation.book_id, relation.category_id)
            .await?;
        tracing::info!(
            "Related book {} to category {}",
            relation.book_id,
            relation.category_id
        );
        Ok(())
    }
}

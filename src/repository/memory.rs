//! In-memory store implementing the transactional repository traits.
//!
//! Used by the unit tests of the book creation flow. A [`MemoryUnitOfWork`]
//! runs its work on a private copy of the store and publishes the copy only
//! on commit, so a failed unit leaves the store untouched. Units of work are
//! serialized. The store enforces the constraints the schema declares
//! (non-empty names, foreign keys, the `book_category` primary key) and
//! accepts injected failures.

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{
    unit_of_work::with_deadline, AuthorRepositoryTx, BookRepositoryTx, CategoryRepositoryTx,
    UnitOfWork,
};
use crate::{
    error::{AppError, AppResult},
    models::{Author, Book, BookCategory, Category},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Authors,
    Categories,
    Books,
    BookCategory,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Table::Authors => "authors",
            Table::Categories => "categories",
            Table::Books => "books",
            Table::BookCategory => "book_category",
        };
        f.write_str(name)
    }
}

/// Failure injected into the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Every insert into the table fails
    Insert(Table),
    /// Inserts into the table fail for rows with this name or title
    InsertNamed(Table, String),
    Begin,
    Commit,
}

/// Rows of every table plus their id sequences
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub authors: Vec<Author>,
    pub categories: Vec<Category>,
    pub books: Vec<Book>,
    pub book_category: Vec<BookCategory>,
    sequences: HashMap<Table, i64>,
}

impl MemoryState {
    fn next_id(&mut self, table: Table) -> i64 {
        let id = self.sequences.entry(table).or_insert(0);
        *id += 1;
        *id
    }

    /// Total number of rows across all tables
    pub fn row_count(&self) -> usize {
        self.authors.len() + self.categories.len() + self.books.len() + self.book_category.len()
    }
}

fn violation(message: String) -> AppError {
    AppError::Database(sqlx::Error::Protocol(message))
}

fn check_not_empty(table: Table, column: &str, value: &str) -> AppResult<()> {
    if value.is_empty() {
        return Err(violation(format!(
            "new row for relation \"{}\" violates check constraint on \"{}\"",
            table, column
        )));
    }
    Ok(())
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<Mutex<Vec<Fault>>>,
    gate: Arc<Mutex<()>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the committed state
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    pub async fn fail_on(&self, fault: Fault) {
        self.faults.lock().await.push(fault);
    }

    async fn has_fault(&self, fault: &Fault) -> bool {
        self.faults.lock().await.contains(fault)
    }

    async fn check_insert(&self, table: Table, name: &str) -> AppResult<()> {
        let faults = self.faults.lock().await;
        let hit = faults.iter().any(|fault| match fault {
            Fault::Insert(t) => *t == table,
            Fault::InsertNamed(t, n) => *t == table && n == name,
            _ => false,
        });
        if hit {
            return Err(violation(format!(
                "duplicate key value violates unique constraint on \"{}\"",
                table
            )));
        }
        Ok(())
    }
}

/// Executor over the committed store or over the working copy of one unit of work
#[derive(Clone)]
pub struct MemoryExecutor {
    store: MemoryStore,
    working: Option<Arc<Mutex<Option<MemoryState>>>>,
}

impl MemoryExecutor {
    pub fn is_transactional(&self) -> bool {
        self.working.is_some()
    }

    async fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> AppResult<T>) -> AppResult<T> {
        match &self.working {
            Some(working) => {
                let mut guard = working.lock().await;
                let state = guard.as_mut().ok_or_else(|| {
                    AppError::Transaction("Transaction already finished".to_string())
                })?;
                f(state)
            }
            None => f(&mut *self.store.state.lock().await),
        }
    }
}

/// Unit of work over a [`MemoryStore`], counting the transactions it begins
#[derive(Clone)]
pub struct MemoryUnitOfWork {
    store: MemoryStore,
    begins: Arc<AtomicUsize>,
    timeout: Option<Duration>,
}

impl MemoryUnitOfWork {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            begins: Arc::new(AtomicUsize::new(0)),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Number of transactions begun so far
    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    type Executor = MemoryExecutor;

    async fn execute<T, F, Fut>(&self, work: F) -> AppResult<T>
    where
        T: Send,
        F: FnOnce(MemoryExecutor) -> Fut + Send,
        Fut: Future<Output = AppResult<T>> + Send,
    {
        let _serialized = self.store.gate.lock().await;

        if self.store.has_fault(&Fault::Begin).await {
            return Err(AppError::Transaction("Begin failed: injected".to_string()));
        }
        self.begins.fetch_add(1, Ordering::SeqCst);

        let working = Arc::new(Mutex::new(Some(self.store.snapshot().await)));
        let executor = MemoryExecutor {
            store: self.store.clone(),
            working: Some(working.clone()),
        };
        let outcome = with_deadline(self.timeout, work(executor)).await;

        let state = working.lock().await.take();
        let commit_fails = self.store.has_fault(&Fault::Commit).await;
        match (outcome, state) {
            (Ok(_), _) if commit_fails => {
                Err(AppError::Transaction("Commit failed: injected".to_string()))
            }
            (Ok(value), Some(state)) => {
                *self.store.state.lock().await = state;
                Ok(value)
            }
            (Ok(_), None) => Err(AppError::Transaction(
                "Transaction finished before commit".to_string(),
            )),
            (Err(err), _) => Err(err),
        }
    }
}

#[derive(Clone)]
pub struct MemoryAuthorsRepository {
    executor: MemoryExecutor,
}

impl MemoryAuthorsRepository {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            executor: MemoryExecutor {
                store,
                working: None,
            },
        }
    }

    pub fn executor(&self) -> &MemoryExecutor {
        &self.executor
    }
}

#[async_trait]
impl AuthorRepositoryTx<MemoryExecutor> for MemoryAuthorsRepository {
    async fn create(&self, author: &mut Author) -> AppResult<()> {
        self.executor.store.check_insert(Table::Authors, &author.name).await?;
        author.id = self
            .executor
            .with_state(|state| {
                check_not_empty(Table::Authors, "name", &author.name)?;
                let id = state.next_id(Table::Authors);
                state.authors.push(Author {
                    id,
                    ..author.clone()
                });
                Ok(id)
            })
            .await?;
        Ok(())
    }

    async fn get_all(&self) -> AppResult<Vec<Author>> {
        self.executor.with_state(|state| Ok(state.authors.clone())).await
    }

    fn with_tx(&self, executor: MemoryExecutor) -> Self {
        Self { executor }
    }
}

#[derive(Clone)]
pub struct MemoryCategoriesRepository {
    executor: MemoryExecutor,
}

impl MemoryCategoriesRepository {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            executor: MemoryExecutor {
                store,
                working: None,
            },
        }
    }
}

#[async_trait]
impl CategoryRepositoryTx<MemoryExecutor> for MemoryCategoriesRepository {
    async fn create(&self, category: &mut Category) -> AppResult<()> {
        self.executor
            .store
            .check_insert(Table::Categories, &category.name)
            .await?;
        let created_at = chrono::Utc::now();
        category.id = self
            .executor
            .with_state(|state| {
                check_not_empty(Table::Categories, "name", &category.name)?;
                let id = state.next_id(Table::Categories);
                state.categories.push(Category {
                    id,
                    name: category.name.clone(),
                    created_at: Some(created_at),
                });
                Ok(id)
            })
            .await?;
        category.created_at = Some(created_at);
        Ok(())
    }

    async fn get_all(&self) -> AppResult<Vec<Category>> {
        self.executor.with_state(|state| Ok(state.categories.clone())).await
    }

    fn with_tx(&self, executor: MemoryExecutor) -> Self {
        Self { executor }
    }
}

#[derive(Clone)]
pub struct MemoryBooksRepository {
    executor: MemoryExecutor,
}

impl MemoryBooksRepository {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            executor: MemoryExecutor {
                store,
                working: None,
            },
        }
    }
}

#[async_trait]
impl BookRepositoryTx<MemoryExecutor> for MemoryBooksRepository {
    async fn create(&self, book: &mut Book) -> AppResult<()> {
        self.executor.store.check_insert(Table::Books, &book.title).await?;
        let now = chrono::Utc::now();
        book.id = self
            .executor
            .with_state(|state| {
                check_not_empty(Table::Books, "title", &book.title)?;
                if !state.authors.iter().any(|a| a.id == book.author_id) {
                    return Err(violation(format!(
                        "insert on \"books\" violates foreign key: author {} does not exist",
                        book.author_id
                    )));
                }
                let id = state.next_id(Table::Books);
                state.books.push(Book {
                    id,
                    title: book.title.clone(),
                    description: book.description.clone(),
                    content: book.content.clone(),
                    author_id: book.author_id,
                    created_at: Some(now),
                    updated_at: Some(now),
                    ..Default::default()
                });
                Ok(id)
            })
            .await?;
        book.created_at = Some(now);
        book.updated_at = Some(now);
        Ok(())
    }

    async fn get_all(&self) -> AppResult<Vec<Book>> {
        self.executor.with_state(|state| Ok(state.books.clone())).await
    }

    async fn relation_book_category(&self, book_id: i64, category_id: i64) -> AppResult<()> {
        self.executor.store.check_insert(Table::BookCategory, "").await?;
        self.executor
            .with_state(|state| {
                if !state.books.iter().any(|b| b.id == book_id)
                    || !state.categories.iter().any(|c| c.id == category_id)
                {
                    return Err(violation(format!(
                        "insert on \"book_category\" violates foreign key: ({}, {})",
                        book_id, category_id
                    )));
                }
                let relation = BookCategory {
                    book_id,
                    category_id,
                };
                if state
                    .book_category
                    .iter()
                    .any(|r| r.book_id == book_id && r.category_id == category_id)
                {
                    return Err(violation(format!(
                        "duplicate key value violates primary key on \"book_category\": ({}, {})",
                        book_id, category_id
                    )));
                }
                state.book_category.push(relation);
                Ok(())
            })
            .await
    }

    fn with_tx(&self, executor: MemoryExecutor) -> Self {
        Self { executor }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author(name: &str) -> Author {
        Author {
            name: name.to_string(),
            description: "d".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_with_tx_returns_new_binding() {
        let store = MemoryStore::new();
        let uow = MemoryUnitOfWork::new(store.clone());
        let repository = MemoryAuthorsRepository::new(store.clone());

        let bound_was_transactional = uow
            .execute(|executor| {
                let bound = repository.with_tx(executor);
                async move {
                    let mut a = author("Clarice");
                    bound.create(&mut a).await?;
                    Ok(bound.executor().is_transactional())
                }
            })
            .await
            .unwrap();

        assert!(bound_was_transactional);
        assert!(!repository.executor().is_transactional());
        assert_eq!(repository.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_unit_publishes_nothing() {
        let store = MemoryStore::new();
        let uow = MemoryUnitOfWork::new(store.clone());
        let repository = MemoryAuthorsRepository::new(store.clone());

        let result: AppResult<()> = uow
            .execute(|executor| {
                let bound = repository.with_tx(executor);
                async move {
                    bound.create(&mut author("Clarice")).await?;
                    bound.create(&mut author("")).await?;
                    Ok(())
                }
            })
            .await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert_eq!(store.snapshot().await.row_count(), 0);
        assert_eq!(uow.begins(), 1);
    }

    #[tokio::test]
    async fn test_relation_requires_existing_rows() {
        let store = MemoryStore::new();
        let books = MemoryBooksRepository::new(store.clone());

        let err = books.relation_book_category(1, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[tokio::test]
    async fn test_executor_of_finished_unit_is_rejected() {
        let store = MemoryStore::new();
        let uow = MemoryUnitOfWork::new(store.clone());
        let repository = MemoryAuthorsRepository::new(store.clone());

        let leaked = uow
            .execute(|executor| async move { Ok(executor) })
            .await
            .unwrap();

        let err = repository
            .with_tx(leaked)
            .create(&mut author("Late"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Transaction(_)));
    }

    #[tokio::test]
    async fn test_injected_commit_failure() {
        let store = MemoryStore::new();
        store.fail_on(Fault::Commit).await;
        let uow = MemoryUnitOfWork::new(store.clone());
        let repository = MemoryAuthorsRepository::new(store.clone());

        let result = uow
            .execute(|executor| {
                let bound = repository.with_tx(executor);
                async move { bound.create(&mut author("Clarice")).await }
            })
            .await;

        assert!(matches!(result, Err(AppError::Transaction(_))));
        assert_eq!(store.snapshot().await.row_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_deadline_publishes_nothing() {
        let store = MemoryStore::new();
        let uow = MemoryUnitOfWork::new(store.clone()).with_timeout(Duration::from_millis(20));
        let repository = MemoryAuthorsRepository::new(store.clone());

        let result: AppResult<()> = uow
            .execute(|executor| {
                let bound = repository.with_tx(executor);
                async move {
                    bound.create(&mut author("Clarice")).await?;
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, AppError>(())
                }
            })
            .await;

        assert!(matches!(result, Err(AppError::Timeout(_))));
        assert_eq!(store.snapshot().await.row_count(), 0);
        assert_eq!(uow.begins(), 1);
    }

    #[tokio::test]
    async fn test_panicking_work_publishes_nothing() {
        let store = MemoryStore::new();
        let uow = MemoryUnitOfWork::new(store.clone());
        let repository = MemoryAuthorsRepository::new(store.clone());

        let task = {
            let uow = uow.clone();
            let repository = repository.clone();
            tokio::spawn(async move {
                uow.execute(|executor| {
                    let bound = repository.with_tx(executor);
                    async move {
                        let mut written = author("Clarice");
                        bound.create(&mut written).await?;
                        if written.id > 0 {
                            panic!("work aborted after a write");
                        }
                        Ok::<_, AppError>(())
                    }
                })
                .await
            })
        };

        assert!(task.await.is_err());
        assert_eq!(store.snapshot().await.row_count(), 0);

        // The store is still usable after the aborted unit
        uow.execute(|executor| {
            let bound = repository.with_tx(executor);
            async move { bound.create(&mut author("Lispector")).await }
        })
        .await
        .unwrap();

        let state = store.snapshot().await;
        assert_eq!(state.authors.len(), 1);
        assert_eq!(state.authors[0].name, "Lispector");
    }
}

//! Statement executor shared by the repositories.
//!
//! A [`PgExecutor`] runs parameterized statements either straight on the pool
//! or inside one open transaction. Repositories hold an executor and never
//! care which variant they got; the unit of work hands out the transactional
//! one.

use std::sync::Arc;

use sqlx::{
    postgres::{PgArguments, PgQueryResult, PgRow},
    query::{Query, QueryAs, QueryScalar},
    FromRow, Pool, Postgres, Transaction,
};
use tokio::sync::Mutex;

use crate::error::{AppError, AppResult};

/// Open transaction shared between a unit of work and the repositories bound to it.
/// `None` once the unit of work has committed or rolled back.
pub type SharedTransaction = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

#[derive(Clone)]
pub enum PgExecutor {
    Pool(Pool<Postgres>),
    Transaction(SharedTransaction),
}

fn finished() -> AppError {
    AppError::Transaction("Transaction already finished".to_string())
}

/// Run a sqlx query method against whichever connection the executor wraps.
macro_rules! run {
    ($executor:expr, $query:expr, $method:ident) => {
        match $executor {
            PgExecutor::Pool(pool) => $query.$method(pool).await.map_err(AppError::from),
            PgExecutor::Transaction(shared) => {
                let mut guard = shared.lock().await;
                let tx = guard.as_mut().ok_or_else(finished)?;
                $query.$method(&mut **tx).await.map_err(AppError::from)
            }
        }
    };
}

impl PgExecutor {
    #[cfg(test)]
    pub fn is_transactional(&self) -> bool {
        matches!(self, PgExecutor::Transaction(_))
    }

    /// Execute a statement, returning the affected rows
    pub async fn execute(&self, query: Query<'_, Postgres, PgArguments>) -> AppResult<PgQueryResult> {
        run!(self, query, execute)
    }

    /// Fetch exactly one row
    pub async fn fetch_one<'q, O>(&self, query: QueryAs<'q, Postgres, O, PgArguments>) -> AppResult<O>
    where
        O: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        run!(self, query, fetch_one)
    }

    /// Fetch at most one row; callers map `None` to their own not-found error
    pub async fn fetch_optional<'q, O>(
        &self,
        query: QueryAs<'q, Postgres, O, PgArguments>,
    ) -> AppResult<Option<O>>
    where
        O: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        run!(self, query, fetch_optional)
    }

    /// Fetch the whole row set
    pub async fn fetch_all<'q, O>(&self, query: QueryAs<'q, Postgres, O, PgArguments>) -> AppResult<Vec<O>>
    where
        O: Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        run!(self, query, fetch_all)
    }

    /// Fetch raw rows, for joins decoded by hand
    pub async fn fetch_rows(&self, query: Query<'_, Postgres, PgArguments>) -> AppResult<Vec<PgRow>> {
        run!(self, query, fetch_all)
    }

    /// Fetch a single scalar value
    pub async fn fetch_scalar<'q, O>(&self, query: QueryScalar<'q, Postgres, O, PgArguments>) -> AppResult<O>
    where
        O: Send + Unpin,
        (O,): Send + Unpin + for<'r> FromRow<'r, PgRow>,
    {
        run!(self, query, fetch_one)
    }
}

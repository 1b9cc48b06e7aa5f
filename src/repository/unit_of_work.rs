//! Unit of work: one atomic transaction around a sequence of repository calls

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Transaction};
use tokio::sync::Mutex;

use super::executor::{PgExecutor, SharedTransaction};
use crate::error::{AppError, AppResult};

/// Runs `work` inside a single transaction.
///
/// The transaction is committed when `work` succeeds and rolled back when it
/// fails, times out, panics or is dropped before completion. The error
/// returned by `work` reaches the caller unchanged.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Executor handed to `work`; repositories rebind onto it with `with_tx`
    type Executor: Clone + Send + Sync + 'static;

    async fn execute<T, F, Fut>(&self, work: F) -> AppResult<T>
    where
        T: Send,
        F: FnOnce(Self::Executor) -> Fut + Send,
        Fut: Future<Output = AppResult<T>> + Send;
}

/// Await `work`, bounded by `timeout` when one is configured
pub(crate) async fn with_deadline<T, Fut>(timeout: Option<Duration>, work: Fut) -> AppResult<T>
where
    Fut: Future<Output = AppResult<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, work).await.unwrap_or_else(|_| {
            Err(AppError::Timeout(format!(
                "Unit of work exceeded {} ms",
                limit.as_millis()
            )))
        }),
        None => work.await,
    }
}

/// PostgreSQL unit of work over the shared pool
#[derive(Clone)]
pub struct PgUnitOfWork {
    pool: Pool<Postgres>,
    timeout: Option<Duration>,
}

impl PgUnitOfWork {
    pub fn new(pool: Pool<Postgres>, timeout: Option<Duration>) -> Self {
        Self { pool, timeout }
    }

    async fn finish<T>(tx: Option<Transaction<'static, Postgres>>, outcome: AppResult<T>) -> AppResult<T> {
        match (outcome, tx) {
            (Ok(value), Some(tx)) => {
                tx.commit()
                    .await
                    .map_err(|e| AppError::Transaction(format!("Commit failed: {}", e)))?;
                tracing::debug!("Transaction committed");
                Ok(value)
            }
            (Ok(_), None) => Err(AppError::Transaction(
                "Transaction finished before commit".to_string(),
            )),
            (Err(err), Some(tx)) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!("Rollback failed after '{}': {}", err, rollback_err);
                } else {
                    tracing::warn!("Transaction rolled back: {}", err);
                }
                Err(err)
            }
            (Err(err), None) => Err(err),
        }
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    type Executor = PgExecutor;

    async fn execute<T, F, Fut>(&self, work: F) -> AppResult<T>
    where
        T: Send,
        F: FnOnce(PgExecutor) -> Fut + Send,
        Fut: Future<Output = AppResult<T>> + Send,
    {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Transaction(format!("Begin failed: {}", e)))?;
        tracing::debug!("Transaction started");

        // Dropping the last handle rolls the transaction back, which covers
        // panics and cancellation of the caller's future.
        let shared: SharedTransaction = Arc::new(Mutex::new(Some(tx)));
        let outcome = with_deadline(self.timeout, work(PgExecutor::Transaction(shared.clone()))).await;

        let tx = shared.lock().await.take();
        Self::finish(tx, outcome).await
    }
}

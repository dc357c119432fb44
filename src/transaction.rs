//! Transaction lifecycle shared by interactive, batch and implicit
//! transactions.
//!
//! Starting a transaction is bounded by `max_wait`; the work done inside it is
//! bounded by `timeout`. Whatever happens, a started transaction ends in
//! exactly one commit or rollback.

use quarry_core::{
    Executor, QuarryError, Result, TransactionHandle, TransactionOptions, quarry_trace_tx,
};
use tokio::time::error::Elapsed;

/// Starts a transaction, giving up after `options.max_wait`.
pub(crate) async fn begin<E: Executor>(
    executor: &E,
    options: &TransactionOptions,
    mode: &'static str,
) -> Result<E::Transaction> {
    match tokio::time::timeout(options.max_wait, executor.begin(options.isolation_level)).await {
        Ok(tx) => {
            let tx = tx?;
            quarry_trace_tx!("begin", mode);
            Ok(tx)
        }
        Err(_) => {
            quarry_trace_tx!("timeout", mode);
            Err(QuarryError::TransactionTimeout(format!(
                "Unable to start a transaction in the given time ({} ms)",
                options.max_wait.as_millis()
            )))
        }
    }
}

/// Commits when the work succeeded and rolls back otherwise. `outcome` is the
/// work's result wrapped in its `timeout`.
pub(crate) async fn settle<T: TransactionHandle, R>(
    tx: T,
    outcome: std::result::Result<Result<R>, Elapsed>,
    options: &TransactionOptions,
    mode: &'static str,
) -> Result<R> {
    match outcome {
        Ok(Ok(value)) => {
            tx.commit().await?;
            quarry_trace_tx!("commit", mode);
            Ok(value)
        }
        Ok(Err(e)) => {
            tx.rollback().await?;
            quarry_trace_tx!("rollback", mode);
            Err(e)
        }
        Err(_) => {
            tx.rollback().await?;
            quarry_trace_tx!("timeout", mode);
            Err(QuarryError::TransactionTimeout(format!(
                "Transaction was rolled back after exceeding its timeout ({} ms)",
                options.timeout.as_millis()
            )))
        }
    }
}

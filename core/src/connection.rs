//! The executor contract.
//!
//! An executor runs [`Statement`]s against some store. The engine only ever
//! talks to these traits, so any backend (the in-memory store used by the
//! tests, a SQL connection pool, ...) plugs in by implementing them.

use core::future::Future;
use core::time::Duration;

use serde::Deserialize;

use crate::error::Result;
use crate::statement::{QueryResult, Statement};

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// READ UNCOMMITTED isolation level
    ReadUncommitted,
    /// READ COMMITTED isolation level
    ReadCommitted,
    /// REPEATABLE READ isolation level
    RepeatableRead,
    /// SERIALIZABLE isolation level
    Serializable,
}

impl core::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let level = match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        };
        write!(f, "{level}")
    }
}

/// Limits applied to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    /// How long to wait for the store to start the transaction.
    pub max_wait: Duration,
    /// Maximum lifetime of the transaction once started.
    pub timeout: Duration,
    pub isolation_level: Option<IsolationLevel>,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_millis(2_000),
            timeout: Duration::from_millis(5_000),
            isolation_level: None,
        }
    }
}

impl TransactionOptions {
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }
}

/// Something that can run statements: a store handle or an open transaction.
pub trait Connection: Send + Sync {
    fn run(&self, statement: Statement) -> impl Future<Output = Result<QueryResult>> + Send;
}

/// A store the client can be built on.
pub trait Executor: Connection + 'static {
    type Transaction: TransactionHandle + 'static;

    /// Establishes the underlying connection. Called by `Client::connect`.
    fn connect(&self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    fn disconnect(&self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    /// Starts a transaction. May wait for a free slot; the caller bounds the
    /// wait with `max_wait`.
    fn begin(
        &self,
        isolation: Option<IsolationLevel>,
    ) -> impl Future<Output = Result<Self::Transaction>> + Send;
}

/// An open transaction. Dropping it without committing rolls it back.
pub trait TransactionHandle: Connection + Sized {
    fn commit(self) -> impl Future<Output = Result<()>> + Send;

    fn rollback(self) -> impl Future<Output = Result<()>> + Send;
}

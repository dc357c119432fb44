//! The client and its transaction-scoped counterpart.

use std::future::Future;
use std::sync::Arc;

use quarry_core::{
    Entity, Executor, GlobalOmit, QuarryError, Result, Schema, TransactionHandle,
    TransactionOptions,
};
use tokio::time::timeout;

use crate::config::ClientConfig;
use crate::engine::{Engine, Shared};
use crate::model::Model;
use crate::operation::{Operation, Payload};
use crate::transaction::{begin, settle};

/// Something operations can run against: a [`Client`] or a [`TxClient`].
pub trait Scope: Send + Sync {
    fn execute(&self, operation: Operation) -> impl Future<Output = Result<Payload>> + Send;
}

/// Entry point: one executor, one schema, shared by every model handle.
///
/// Cloning is cheap; clones share the executor and configuration.
pub struct Client<E> {
    executor: Arc<E>,
    shared: Arc<Shared>,
}

impl<E> Clone for Client<E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<E> std::fmt::Debug for Client<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tx_defaults", &self.shared.tx_defaults)
            .field("log_queries", &self.shared.log_queries)
            .finish_non_exhaustive()
    }
}

impl<E: Executor> Client<E> {
    /// A client with default configuration.
    pub fn new(executor: E, schema: Arc<Schema>) -> Result<Self> {
        Self::builder(executor, schema).build()
    }

    pub fn builder(executor: E, schema: Arc<Schema>) -> ClientBuilder<E> {
        ClientBuilder {
            executor,
            schema,
            omit: GlobalOmit::new(),
            tx_defaults: TransactionOptions::default(),
            log_queries: false,
        }
    }

    /// Verifies the executor can reach its store.
    pub async fn connect(&self) -> Result<()> {
        self.executor.connect().await.map_err(|e| match e {
            QuarryError::Initialization(_) => e,
            other => QuarryError::Initialization(other.to_string()),
        })
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.executor.disconnect().await
    }

    pub fn schema(&self) -> &Schema {
        &self.shared.schema
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Operations on the entity named `entity`. Unknown names fail when the
    /// first operation runs.
    pub fn model(&self, entity: &'static str) -> Model<'_, Self> {
        Model::new(self, entity)
    }

    pub fn entity<T: Entity>(&self) -> Model<'_, Self> {
        self.model(T::NAME)
    }

    /// Runs `f` in a transaction with the client's default options. Commits
    /// when `f` returns `Ok`, rolls back when it returns `Err` or times out.
    pub async fn transaction<F, R>(&self, f: F) -> Result<R>
    where
        F: AsyncFnOnce(&TxClient<E::Transaction>) -> Result<R>,
    {
        self.transaction_with(self.shared.tx_defaults, f).await
    }

    pub async fn transaction_with<F, R>(&self, options: TransactionOptions, f: F) -> Result<R>
    where
        F: AsyncFnOnce(&TxClient<E::Transaction>) -> Result<R>,
    {
        let tx = begin(&*self.executor, &options, "interactive").await?;
        let scoped = TxClient {
            tx,
            shared: self.shared.clone(),
        };
        let outcome = timeout(options.timeout, f(&scoped)).await;
        settle(scoped.tx, outcome, &options, "interactive").await
    }

    /// Runs `operations` in order inside one transaction. The first failure
    /// rolls back every earlier operation.
    pub async fn batch(&self, operations: Vec<Operation>) -> Result<Vec<Payload>> {
        self.batch_with(self.shared.tx_defaults, operations).await
    }

    pub async fn batch_with(
        &self,
        options: TransactionOptions,
        operations: Vec<Operation>,
    ) -> Result<Vec<Payload>> {
        let tx = begin(&*self.executor, &options, "batch").await?;
        let engine = Engine::new(&tx, &self.shared);
        let outcome = timeout(options.timeout, async {
            let mut payloads = Vec::with_capacity(operations.len());
            for operation in operations {
                payloads.push(engine.dispatch(operation).await?);
            }
            Ok(payloads)
        })
        .await;
        settle(tx, outcome, &options, "batch").await
    }
}

impl<E: Executor> Scope for Client<E> {
    async fn execute(&self, operation: Operation) -> Result<Payload> {
        if !operation.action.needs_transaction() {
            return Engine::new(&*self.executor, &self.shared)
                .dispatch(operation)
                .await;
        }
        let options = self.shared.tx_defaults;
        let tx = begin(&*self.executor, &options, "implicit").await?;
        let outcome = timeout(
            options.timeout,
            Engine::new(&tx, &self.shared).dispatch(operation),
        )
        .await;
        settle(tx, outcome, &options, "implicit").await
    }
}

/// Configures a [`Client`].
pub struct ClientBuilder<E> {
    executor: E,
    schema: Arc<Schema>,
    omit: GlobalOmit,
    tx_defaults: TransactionOptions,
    log_queries: bool,
}

impl<E: Executor> ClientBuilder<E> {
    /// Applies a loaded configuration file.
    pub fn config(mut self, config: &ClientConfig) -> Self {
        self.omit = config.global_omit();
        self.tx_defaults = config.transaction.options();
        self.log_queries = config.log_queries;
        self
    }

    /// Hides `fields` of `entity` from every payload unless a query asks for
    /// them.
    pub fn omit<I, S>(mut self, entity: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.omit.insert(entity, fields);
        self
    }

    pub fn transaction_options(mut self, options: TransactionOptions) -> Self {
        self.tx_defaults = options;
        self
    }

    pub fn log_queries(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    pub fn build(self) -> Result<Client<E>> {
        self.omit.validate(&self.schema)?;
        Ok(Client {
            executor: Arc::new(self.executor),
            shared: Arc::new(Shared {
                schema: self.schema,
                omit: self.omit,
                tx_defaults: self.tx_defaults,
                log_queries: self.log_queries,
            }),
        })
    }
}

/// A client bound to an open transaction. It cannot start transactions of
/// its own.
pub struct TxClient<T> {
    tx: T,
    shared: Arc<Shared>,
}

impl<T: TransactionHandle> TxClient<T> {
    pub fn model(&self, entity: &'static str) -> Model<'_, Self> {
        Model::new(self, entity)
    }

    pub fn entity<M: Entity>(&self) -> Model<'_, Self> {
        self.model(M::NAME)
    }

    pub fn schema(&self) -> &Schema {
        &self.shared.schema
    }
}

impl<T: TransactionHandle> Scope for TxClient<T> {
    async fn execute(&self, operation: Operation) -> Result<Payload> {
        Engine::new(&self.tx, &self.shared).dispatch(operation).await
    }
}

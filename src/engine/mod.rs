//! The query engine.
//!
//! An [`Engine`] binds one connection (the store itself or an open
//! transaction) to the client's shared state and turns [`Operation`]s into
//! statements. Argument validation always completes before the first
//! statement is issued.

mod aggregate;
mod loader;
mod mapper;
mod mutation;
mod read;
mod resolve;
mod window;

use std::sync::Arc;

use quarry_core::{
    Connection, GlobalOmit, Projection, QuarryError, QueryResult, Result, Schema, Selection,
    Statement, TransactionOptions, quarry_trace_query,
};

use crate::operation::{Action, Operation, Payload};

/// State shared by a client and every transaction it opens.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) schema: Arc<Schema>,
    pub(crate) omit: GlobalOmit,
    pub(crate) tx_defaults: TransactionOptions,
    pub(crate) log_queries: bool,
}

pub(crate) struct Engine<'a, C> {
    conn: &'a C,
    shared: &'a Shared,
}

impl<C> Clone for Engine<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Engine<'_, C> {}

impl<'a, C: Connection> Engine<'a, C> {
    pub(crate) fn new(conn: &'a C, shared: &'a Shared) -> Self {
        Self { conn, shared }
    }

    fn schema(self) -> &'a Schema {
        &self.shared.schema
    }

    fn projection(
        self,
        entity: &'static quarry_core::EntityDef,
        selection: &Selection,
    ) -> Result<Projection> {
        Projection::resolve(self.schema(), entity, selection, &self.shared.omit)
    }

    async fn run(self, statement: impl Into<Statement>) -> Result<QueryResult> {
        let statement = statement.into();
        quarry_trace_query!(statement.entity(), statement.kind());
        #[cfg(feature = "tracing")]
        if self.shared.log_queries {
            tracing::info!(statement = ?statement, "quarry.query");
        }
        self.conn.run(statement).await
    }

    pub(crate) async fn dispatch(self, operation: Operation) -> Result<Payload> {
        let entity = self.schema().entity(&operation.entity)?;
        match operation.action {
            Action::FindUnique(args) => Ok(Payload::Record(self.find_unique(entity, &args).await?)),
            Action::FindUniqueOrThrow(args) => match self.find_unique(entity, &args).await? {
                Some(record) => Ok(Payload::Record(Some(record))),
                None => Err(not_found(entity.name)),
            },
            Action::FindFirst(args) => Ok(Payload::Record(self.find_first(entity, &args).await?)),
            Action::FindFirstOrThrow(args) => match self.find_first(entity, &args).await? {
                Some(record) => Ok(Payload::Record(Some(record))),
                None => Err(not_found(entity.name)),
            },
            Action::FindMany(args) => Ok(Payload::Records(self.find_many(entity, &args).await?)),
            Action::Create(args) => Ok(Payload::Record(Some(self.create(entity, &args).await?))),
            Action::CreateMany(args) => Ok(Payload::Batch(self.create_many(entity, &args).await?)),
            Action::CreateManyAndReturn(args) => Ok(Payload::Records(
                self.create_many_and_return(entity, &args).await?,
            )),
            Action::Update(args) => Ok(Payload::Record(Some(self.update(entity, &args).await?))),
            Action::UpdateMany(args) => Ok(Payload::Batch(self.update_many(entity, &args).await?)),
            Action::UpdateManyAndReturn(args) => Ok(Payload::Records(
                self.update_many_and_return(entity, &args).await?,
            )),
            Action::Upsert(args) => Ok(Payload::Record(Some(self.upsert(entity, &args).await?))),
            Action::Delete(args) => Ok(Payload::Record(Some(self.delete(entity, &args).await?))),
            Action::DeleteMany(args) => Ok(Payload::Batch(self.delete_many(entity, &args).await?)),
            Action::Aggregate(args) => Ok(Payload::Aggregate(self.aggregate(entity, &args).await?)),
            Action::GroupBy(args) => Ok(Payload::Groups(self.group_by(entity, &args).await?)),
            Action::Count(args) => Ok(Payload::Count(self.count(entity, &args).await?)),
            Action::Fluent {
                parent,
                relation,
                args,
            } => self.fluent(entity, *parent, &relation, &args).await,
        }
    }
}

fn not_found(entity: &str) -> QuarryError {
    QuarryError::RecordNotFound(format!("No {entity} found"))
}

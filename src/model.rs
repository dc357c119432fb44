//! Per-entity operation surface.
//!
//! A [`Model`] is a cheap handle naming one entity. Each method returns a
//! [`Query`]: the operation it describes plus the scope it will run in.
//! Nothing is sent until [`Query::exec`] is awaited, and the operation can be
//! taken out with [`Query::into_operation`] to run it in a batch instead.

use std::marker::PhantomData;

use quarry_core::{
    AggregateArgs, CountArgs, CreateArgs, CreateManyArgs, DeleteArgs, DeleteManyArgs,
    FindManyArgs, FindUniqueArgs, GroupByArgs, Result, UpdateArgs, UpdateManyArgs, UpsertArgs,
};

use crate::client::Scope;
use crate::operation::{Action, BatchPayload, CountResult, FromPayload, Operation, Payload, Record};

pub struct Model<'c, S> {
    scope: &'c S,
    entity: &'static str,
}

impl<S> Clone for Model<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Model<'_, S> {}

macro_rules! operations {
    ($($(#[$meta:meta])* $method:ident($args:ty) -> $out:ty => $action:ident;)*) => {
        $(
            $(#[$meta])*
            pub fn $method(&self, args: $args) -> Query<'c, S, $out> {
                self.query(Action::$action(args))
            }
        )*
    };
}

impl<'c, S: Scope> Model<'c, S> {
    pub(crate) fn new(scope: &'c S, entity: &'static str) -> Self {
        Self { scope, entity }
    }

    pub fn name(&self) -> &'static str {
        self.entity
    }

    fn query<T>(&self, action: Action) -> Query<'c, S, T> {
        Query {
            scope: self.scope,
            operation: Operation::new(self.entity, action),
            _out: PhantomData,
        }
    }

    operations! {
        /// The record matching a unique key, or `None`.
        find_unique(FindUniqueArgs) -> Option<Record> => FindUnique;
        /// Like `find_unique`, failing with `RecordNotFound` when absent.
        find_unique_or_throw(FindUniqueArgs) -> Record => FindUniqueOrThrow;
        find_first(FindManyArgs) -> Option<Record> => FindFirst;
        find_first_or_throw(FindManyArgs) -> Record => FindFirstOrThrow;
        find_many(FindManyArgs) -> Vec<Record> => FindMany;
        create(CreateArgs) -> Record => Create;
        create_many(CreateManyArgs) -> BatchPayload => CreateMany;
        create_many_and_return(CreateManyArgs) -> Vec<Record> => CreateManyAndReturn;
        update(UpdateArgs) -> Record => Update;
        update_many(UpdateManyArgs) -> BatchPayload => UpdateMany;
        update_many_and_return(UpdateManyArgs) -> Vec<Record> => UpdateManyAndReturn;
        /// Updates the record matching a unique key, or creates it.
        upsert(UpsertArgs) -> Record => Upsert;
        delete(DeleteArgs) -> Record => Delete;
        delete_many(DeleteManyArgs) -> BatchPayload => DeleteMany;
        aggregate(AggregateArgs) -> Record => Aggregate;
        group_by(GroupByArgs) -> Vec<Record> => GroupBy;
        /// A bare total, or per-field counts when `select` is set.
        count(CountArgs) -> CountResult => Count;
    }
}

/// A deferred operation and the type its payload converts to.
pub struct Query<'c, S, T> {
    scope: &'c S,
    operation: Operation,
    _out: PhantomData<fn() -> T>,
}

impl<S, T> std::fmt::Debug for Query<'_, S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

impl<'c, S: Scope, T: FromPayload> Query<'c, S, T> {
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn into_operation(self) -> Operation {
        self.operation
    }

    pub async fn exec(self) -> Result<T> {
        T::from_payload(self.scope.execute(self.operation).await?)
    }

    /// Follows `relation` from the single record this query locates.
    fn follow(self, relation: String, args: FindManyArgs) -> Query<'c, S, Payload> {
        Query {
            scope: self.scope,
            operation: Operation::new(
                self.operation.entity,
                Action::Fluent {
                    parent: Box::new(self.operation.action),
                    relation,
                    args,
                },
            ),
            _out: PhantomData,
        }
    }
}

macro_rules! fluent {
    ($($out:ty),*) => {
        $(
            impl<'c, S: Scope> Query<'c, S, $out> {
                /// Turns this lookup into a query for one of the located
                /// record's relations: a list for to-many relations, an
                /// optional record for to-one.
                pub fn fluent(self, relation: impl Into<String>) -> Query<'c, S, Payload> {
                    self.follow(relation.into(), FindManyArgs::default())
                }

                pub fn fluent_with(
                    self,
                    relation: impl Into<String>,
                    args: FindManyArgs,
                ) -> Query<'c, S, Payload> {
                    self.follow(relation.into(), args)
                }
            }
        )*
    };
}

fluent!(Option<Record>, Record);

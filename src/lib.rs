//! # Quarry
//!
//! A typed relational query and mutation client.
//!
//! Quarry takes declarative arguments (filters, orderings, pagination,
//! projections, nested writes, aggregations) for the entities of a
//! [`Schema`] and turns them into statements for an [`Executor`]. Results come
//! back as JSON-shaped [`Record`]s that decode into the generated model types.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quarry::prelude::*;
//! use quarry_drivers::MemoryStore;
//!
//! # async fn run() -> quarry::Result<()> {
//! let schema = Arc::new(quarry_schema::schema()?);
//! let client = Client::new(MemoryStore::new(schema.clone()), schema)?;
//!
//! let component = client
//!     .model("Component")
//!     .create(CreateArgs::new(
//!         Data::new().set("name", "api").set("type", "SERVER"),
//!     ))
//!     .exec()
//!     .await?;
//!
//! let healthy = client
//!     .model("Component")
//!     .find_many(FindManyArgs::new().filter(WhereInput::new().eq("status", "HEALTHY")))
//!     .exec()
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Transactions
//!
//! Writes that touch more than one row run in an implicit transaction.
//! [`Client::transaction`] runs a closure against a [`TxClient`] and commits
//! when it returns `Ok`; [`Client::batch`] runs a list of deferred
//! [`Operation`]s all-or-nothing.

mod client;
mod config;
mod engine;
mod model;
mod operation;
mod transaction;

pub use client::{Client, ClientBuilder, Scope, TxClient};
pub use config::{ClientConfig, ConfigError, TransactionConfig};
pub use model::{Model, Query};
pub use operation::{Action, BatchPayload, CountResult, FromPayload, Operation, Payload, Record};

/// Result type for quarry operations
pub use quarry_core::{QuarryError, Result};

pub use quarry_core::{Executor, IsolationLevel, Schema, TransactionOptions};

/// Argument, filter and schema types shared with the drivers.
pub use quarry_core as core;

/// Everything needed to write queries.
pub mod prelude {
    pub use crate::{
        BatchPayload, Client, CountResult, Model, Operation, Payload, QuarryError, Query, Record,
        Result, Scope, TxClient,
    };

    pub use quarry_core::{
        AggregateArgs, AggregateFn, AggregateSelection, Condition, CountArgs, CountSelect,
        CountSelection, CreateArgs, CreateManyArgs, Data, DeleteArgs, DeleteManyArgs, Disconnect,
        FindManyArgs, FindUniqueArgs, GroupByArgs, GroupOrder, HavingInput, Include,
        IsolationLevel, JsonFilter, NullMarker, NullsOrder, Omit, OrderBy, QueryMode,
        RelationFilter, ScalarFilter, Select, SortOrder, TransactionOptions, UpdateArgs,
        UpdateManyArgs, UpsertArgs, Value, WhereInput, WhereUniqueInput,
    };
}

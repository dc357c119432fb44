//! Deferred operations and their payloads.
//!
//! Every model method produces an [`Operation`]: a plain, inspectable value
//! naming the entity and the action with its arguments. Nothing runs until the
//! operation is handed to a client, either directly or through a batch.

use quarry_core::{
    AggregateArgs, CountArgs, CreateArgs, CreateManyArgs, DeleteArgs, DeleteManyArgs, Entity,
    FindManyArgs, FindUniqueArgs, GroupByArgs, QuarryError, Result, UpdateArgs, UpdateManyArgs,
    UpsertArgs,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

#[derive(Debug, Clone)]
pub enum Action {
    FindUnique(FindUniqueArgs),
    FindUniqueOrThrow(FindUniqueArgs),
    FindFirst(FindManyArgs),
    FindFirstOrThrow(FindManyArgs),
    FindMany(FindManyArgs),
    Create(CreateArgs),
    CreateMany(CreateManyArgs),
    CreateManyAndReturn(CreateManyArgs),
    Update(UpdateArgs),
    UpdateMany(UpdateManyArgs),
    UpdateManyAndReturn(UpdateManyArgs),
    Upsert(UpsertArgs),
    Delete(DeleteArgs),
    DeleteMany(DeleteManyArgs),
    Aggregate(AggregateArgs),
    GroupBy(GroupByArgs),
    Count(CountArgs),
    /// A relation of the single record located by `parent`, which must be a
    /// `findUnique`/`findFirst` style read.
    Fluent {
        parent: Box<Action>,
        relation: String,
        args: FindManyArgs,
    },
}

impl Action {
    /// Operation name as used in error messages and traces.
    pub fn name(&self) -> &'static str {
        match self {
            Action::FindUnique(_) => "findUnique",
            Action::FindUniqueOrThrow(_) => "findUniqueOrThrow",
            Action::FindFirst(_) => "findFirst",
            Action::FindFirstOrThrow(_) => "findFirstOrThrow",
            Action::FindMany(_) => "findMany",
            Action::Create(_) => "create",
            Action::CreateMany(_) => "createMany",
            Action::CreateManyAndReturn(_) => "createManyAndReturn",
            Action::Update(_) => "update",
            Action::UpdateMany(_) => "updateMany",
            Action::UpdateManyAndReturn(_) => "updateManyAndReturn",
            Action::Upsert(_) => "upsert",
            Action::Delete(_) => "delete",
            Action::DeleteMany(_) => "deleteMany",
            Action::Aggregate(_) => "aggregate",
            Action::GroupBy(_) => "groupBy",
            Action::Count(_) => "count",
            Action::Fluent { .. } => "fluent",
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Action::Create(_)
                | Action::CreateMany(_)
                | Action::CreateManyAndReturn(_)
                | Action::Update(_)
                | Action::UpdateMany(_)
                | Action::UpdateManyAndReturn(_)
                | Action::Upsert(_)
                | Action::Delete(_)
                | Action::DeleteMany(_)
        )
    }

    /// Writes that may issue more than one statement and must run atomically
    /// when not already inside a transaction. A bulk insert is a single
    /// statement.
    pub(crate) fn needs_transaction(&self) -> bool {
        self.is_write() && !matches!(self, Action::CreateMany(_) | Action::CreateManyAndReturn(_))
    }
}

/// An entity plus the action to run against it.
#[derive(Debug, Clone)]
pub struct Operation {
    pub entity: String,
    pub action: Action,
}

impl Operation {
    pub fn new(entity: impl Into<String>, action: Action) -> Self {
        Self {
            entity: entity.into(),
            action,
        }
    }
}

/// A returned record: field name to JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Json>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Json> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decodes into a generated model type.
    pub fn into_model<T: Entity>(self) -> Result<T> {
        Ok(serde_json::from_value(Json::Object(self.0))?)
    }

    pub fn into_json(self) -> Json {
        Json::Object(self.0)
    }

    pub(crate) fn insert(&mut self, field: impl Into<String>, value: Json) {
        self.0.insert(field.into(), value);
    }
}

impl From<Map<String, Json>> for Record {
    fn from(map: Map<String, Json>) -> Self {
        Self(map)
    }
}

/// Result of a bulk write: how many rows it touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPayload {
    pub count: u64,
}

/// Result of `count`.
#[derive(Debug, Clone, PartialEq)]
pub enum CountResult {
    Total(u64),
    /// `{ _all, field: non-null count, ... }`
    Fields(Record),
}

impl CountResult {
    pub fn total(&self) -> Option<u64> {
        match self {
            CountResult::Total(n) => Some(*n),
            CountResult::Fields(r) => r.get("_all").and_then(Json::as_u64),
        }
    }

    pub fn field(&self, name: &str) -> Option<u64> {
        match self {
            CountResult::Total(_) => None,
            CountResult::Fields(r) => r.get(name).and_then(Json::as_u64),
        }
    }
}

/// Untyped result of running an [`Operation`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Record(Option<Record>),
    Records(Vec<Record>),
    Batch(BatchPayload),
    Aggregate(Record),
    Groups(Vec<Record>),
    Count(CountResult),
}

impl Payload {
    fn kind(&self) -> &'static str {
        match self {
            Payload::Record(_) => "record",
            Payload::Records(_) => "records",
            Payload::Batch(_) => "batch",
            Payload::Aggregate(_) => "aggregate",
            Payload::Groups(_) => "groups",
            Payload::Count(_) => "count",
        }
    }

    fn mismatch(&self, expected: &str) -> QuarryError {
        QuarryError::Mapping(format!("expected a {expected} payload, got {}", self.kind()))
    }

    pub fn into_record(self) -> Result<Option<Record>> {
        match self {
            Payload::Record(r) => Ok(r),
            Payload::Aggregate(r) => Ok(Some(r)),
            other => Err(other.mismatch("record")),
        }
    }

    pub fn into_records(self) -> Result<Vec<Record>> {
        match self {
            Payload::Records(r) | Payload::Groups(r) => Ok(r),
            other => Err(other.mismatch("records")),
        }
    }

    pub fn into_batch(self) -> Result<BatchPayload> {
        match self {
            Payload::Batch(b) => Ok(b),
            other => Err(other.mismatch("batch")),
        }
    }

    pub fn into_count(self) -> Result<CountResult> {
        match self {
            Payload::Count(c) => Ok(c),
            other => Err(other.mismatch("count")),
        }
    }
}

/// Conversion from an untyped payload into a query's output type.
pub trait FromPayload: Sized {
    fn from_payload(payload: Payload) -> Result<Self>;
}

impl FromPayload for Payload {
    fn from_payload(payload: Payload) -> Result<Self> {
        Ok(payload)
    }
}

impl FromPayload for Option<Record> {
    fn from_payload(payload: Payload) -> Result<Self> {
        payload.into_record()
    }
}

impl FromPayload for Record {
    fn from_payload(payload: Payload) -> Result<Self> {
        payload
            .into_record()?
            .ok_or_else(|| QuarryError::Mapping("expected a record, got none".into()))
    }
}

impl FromPayload for Vec<Record> {
    fn from_payload(payload: Payload) -> Result<Self> {
        payload.into_records()
    }
}

impl FromPayload for BatchPayload {
    fn from_payload(payload: Payload) -> Result<Self> {
        payload.into_batch()
    }
}

impl FromPayload for CountResult {
    fn from_payload(payload: Payload) -> Result<Self> {
        payload.into_count()
    }
}

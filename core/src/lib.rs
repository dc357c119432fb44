pub mod args;
pub mod connection;
pub mod error;
pub mod filter;
pub mod json;
pub mod projection;
pub mod schema;
pub mod statement;
mod tracing;
pub mod value;

// Re-export key types and traits
pub use args::*;
pub use connection::{Connection, Executor, IsolationLevel, TransactionHandle, TransactionOptions};
pub use error::{Constraint, QuarryError, Result};
pub use filter::{
    CompareOp, Condition, JsonOp, Predicate, QueryMode, RelationFilter, ScalarFilter, SubQuery,
    TextOp, UniqueLookup, WhereInput, WhereUniqueInput, coerce, compile_scalar, compile_where,
    resolve_unique,
};
pub use json::{JsonFilter, JsonTarget, NullMarker};
pub use projection::{CountLoad, GlobalOmit, Projection, RelationLoad};
pub use schema::{
    DefaultValue, Entity, EntityDef, EnumDef, FieldDef, ReferentialAction, RelCardinality,
    RelationDef, ScalarType, Schema, UniqueKey,
};
pub use statement::{
    Assignment, DeleteStatement, InsertStatement, QueryResult, SelectStatement, Statement,
    UpdateStatement, compare_rows,
};
pub use value::{KeyTuple, Row, Value};

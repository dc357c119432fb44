//! Filter inputs (`where`) and their compiled form.
//!
//! Callers build [`WhereInput`] trees; [`compile`] validates them against the
//! schema and lowers them into a [`Predicate`] that both the engine and the
//! executor can evaluate.

mod compile;
mod predicate;
mod unique;

pub use compile::{coerce, compile_scalar, compile_where};
pub use predicate::{CompareOp, JsonOp, Predicate, SubQuery, TextOp};
pub use unique::{UniqueLookup, WhereUniqueInput, resolve_unique};

use crate::json::JsonFilter;
use crate::value::Value;

/// String comparison mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    #[default]
    Default,
    Insensitive,
}

/// Operators on a single scalar field. All set operators are AND-ed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalarFilter {
    pub equals: Option<Value>,
    pub in_list: Option<Vec<Value>>,
    pub not_in: Option<Vec<Value>>,
    pub lt: Option<Value>,
    pub lte: Option<Value>,
    pub gt: Option<Value>,
    pub gte: Option<Value>,
    pub contains: Option<String>,
    pub starts_with: Option<String>,
    pub ends_with: Option<String>,
    pub mode: QueryMode,
    pub not: Option<Box<ScalarFilter>>,
}

impl ScalarFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equals(mut self, v: impl Into<Value>) -> Self {
        self.equals = Some(v.into());
        self
    }

    pub fn is_null(self) -> Self {
        self.equals(Value::Null)
    }

    pub fn is_not_null(self) -> Self {
        self.not(ScalarFilter::new().is_null())
    }

    pub fn in_list<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.in_list = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn not_in<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.not_in = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn lt(mut self, v: impl Into<Value>) -> Self {
        self.lt = Some(v.into());
        self
    }

    pub fn lte(mut self, v: impl Into<Value>) -> Self {
        self.lte = Some(v.into());
        self
    }

    pub fn gt(mut self, v: impl Into<Value>) -> Self {
        self.gt = Some(v.into());
        self
    }

    pub fn gte(mut self, v: impl Into<Value>) -> Self {
        self.gte = Some(v.into());
        self
    }

    pub fn contains(mut self, s: impl Into<String>) -> Self {
        self.contains = Some(s.into());
        self
    }

    pub fn starts_with(mut self, s: impl Into<String>) -> Self {
        self.starts_with = Some(s.into());
        self
    }

    pub fn ends_with(mut self, s: impl Into<String>) -> Self {
        self.ends_with = Some(s.into());
        self
    }

    pub fn insensitive(mut self) -> Self {
        self.mode = QueryMode::Insensitive;
        self
    }

    /// Negated nested filter (`not: { ... }`).
    pub fn not(mut self, inner: ScalarFilter) -> Self {
        self.not = Some(Box::new(inner));
        self
    }
}

/// Filters over a relation field.
#[derive(Debug, Clone)]
pub enum RelationFilter {
    /// To-many: at least one related row matches.
    Some(WhereInput),
    /// To-many: every related row matches (vacuously true when there are none).
    Every(WhereInput),
    /// To-many: no related row matches.
    None(WhereInput),
    /// To-one: the related row matches; `Is(None)` means "no related row".
    Is(Option<WhereInput>),
    /// To-one: the related row does not match; `IsNot(None)` means "a related row exists".
    IsNot(Option<WhereInput>),
}

#[derive(Debug, Clone)]
pub enum Condition {
    Scalar(ScalarFilter),
    Json(JsonFilter),
    Relation(RelationFilter),
}

impl From<ScalarFilter> for Condition {
    fn from(f: ScalarFilter) -> Self {
        Condition::Scalar(f)
    }
}

impl From<JsonFilter> for Condition {
    fn from(f: JsonFilter) -> Self {
        Condition::Json(f)
    }
}

impl From<RelationFilter> for Condition {
    fn from(f: RelationFilter) -> Self {
        Condition::Relation(f)
    }
}

/// A `where` tree. Field conditions and the three combinators are AND-ed.
///
/// `and: []` is true, `or: []` is false and `not: []` is true.
#[derive(Debug, Clone, Default)]
pub struct WhereInput {
    pub fields: Vec<(String, Condition)>,
    pub and: Option<Vec<WhereInput>>,
    pub or: Option<Vec<WhereInput>>,
    pub not: Option<Vec<WhereInput>>,
}

impl WhereInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, condition: impl Into<Condition>) -> Self {
        self.fields.push((name.into(), condition.into()));
        self
    }

    /// Shorthand for `field(name, ScalarFilter::new().equals(v))`.
    pub fn eq(self, name: impl Into<String>, v: impl Into<Value>) -> Self {
        self.field(name, ScalarFilter::new().equals(v))
    }

    pub fn and(mut self, clauses: Vec<WhereInput>) -> Self {
        self.and = Some(clauses);
        self
    }

    pub fn or(mut self, clauses: Vec<WhereInput>) -> Self {
        self.or = Some(clauses);
        self
    }

    pub fn not(mut self, clauses: Vec<WhereInput>) -> Self {
        self.not = Some(clauses);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.and.is_none() && self.or.is_none() && self.not.is_none()
    }
}

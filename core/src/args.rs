//! Argument types for every model operation.
//!
//! These mirror the query-engine argument shapes one-to-one. All of them are
//! plain data with chainable builders; validation happens when the engine
//! runs them.

use crate::filter::{ScalarFilter, WhereInput, WhereUniqueInput};
use crate::json::NullMarker;
use crate::value::Value;

// =============================================================================
// Ordering
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn reverse(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

impl NullsOrder {
    pub fn reverse(self) -> Self {
        match self {
            NullsOrder::First => NullsOrder::Last,
            NullsOrder::Last => NullsOrder::First,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub order: SortOrder,
    /// Defaults to NULLs first when ascending, last when descending.
    pub nulls: Option<NullsOrder>,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
            nulls: None,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
            nulls: None,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(NullsOrder::First);
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(NullsOrder::Last);
        self
    }

    /// Same column, opposite direction (used for negative `take`).
    pub fn reversed(&self) -> Self {
        Self {
            field: self.field.clone(),
            order: self.order.reverse(),
            nulls: Some(self.effective_nulls().reverse()),
        }
    }

    pub fn effective_nulls(&self) -> NullsOrder {
        self.nulls.unwrap_or(match self.order {
            SortOrder::Asc => NullsOrder::First,
            SortOrder::Desc => NullsOrder::Last,
        })
    }
}

// =============================================================================
// Projection inputs
// =============================================================================

/// Relation counts requested through `_count`.
#[derive(Debug, Clone, Default)]
pub struct CountSelect {
    /// `None` counts every to-many relation.
    pub relations: Option<Vec<(String, Option<WhereInput>)>>,
}

impl CountSelect {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn relation(mut self, name: impl Into<String>) -> Self {
        self.relations.get_or_insert_with(Vec::new).push((name.into(), None));
        self
    }

    /// Counts only related rows matching `filter`.
    pub fn relation_where(mut self, name: impl Into<String>, filter: WhereInput) -> Self {
        self.relations
            .get_or_insert_with(Vec::new)
            .push((name.into(), Some(filter)));
        self
    }
}

#[derive(Debug, Clone)]
pub enum SelectEntry {
    Field(bool),
    Relation(Box<FindManyArgs>),
    Count(CountSelect),
}

/// Explicit field selection. Only listed members appear in the payload.
#[derive(Debug, Clone, Default)]
pub struct Select {
    pub entries: Vec<(String, SelectEntry)>,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.entries.push((name.into(), SelectEntry::Field(true)));
        self
    }

    pub fn fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for n in names {
            self = self.field(n);
        }
        self
    }

    /// `field: false`, which is accepted and ignored.
    pub fn skip(mut self, name: impl Into<String>) -> Self {
        self.entries.push((name.into(), SelectEntry::Field(false)));
        self
    }

    pub fn relation(mut self, name: impl Into<String>, args: FindManyArgs) -> Self {
        self.entries
            .push((name.into(), SelectEntry::Relation(Box::new(args))));
        self
    }

    pub fn count(mut self, count: CountSelect) -> Self {
        self.entries.push(("_count".into(), SelectEntry::Count(count)));
        self
    }
}

#[derive(Debug, Clone)]
pub enum IncludeEntry {
    Relation(Box<FindManyArgs>),
    Skip,
    Count(CountSelect),
}

/// Relations loaded on top of the default scalar set.
#[derive(Debug, Clone, Default)]
pub struct Include {
    pub entries: Vec<(String, IncludeEntry)>,
}

impl Include {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn relation(self, name: impl Into<String>) -> Self {
        self.relation_with(name, FindManyArgs::default())
    }

    pub fn relation_with(mut self, name: impl Into<String>, args: FindManyArgs) -> Self {
        self.entries
            .push((name.into(), IncludeEntry::Relation(Box::new(args))));
        self
    }

    pub fn skip(mut self, name: impl Into<String>) -> Self {
        self.entries.push((name.into(), IncludeEntry::Skip));
        self
    }

    pub fn count(mut self, count: CountSelect) -> Self {
        self.entries.push(("_count".into(), IncludeEntry::Count(count)));
        self
    }
}

/// Scalar fields removed from the default set. `false` re-includes a field
/// that is omitted globally.
#[derive(Debug, Clone, Default)]
pub struct Omit {
    pub entries: Vec<(String, bool)>,
}

impl Omit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.entries.push((name.into(), true));
        self
    }

    pub fn keep(mut self, name: impl Into<String>) -> Self {
        self.entries.push((name.into(), false));
        self
    }
}

/// `select` / `include` / `omit` as carried by every record-returning operation.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub select: Option<Select>,
    pub include: Option<Include>,
    pub omit: Option<Omit>,
}

macro_rules! selection_builders {
    ($($ty:ident),* $(,)?) => {
        $(
            impl $ty {
                pub fn select(mut self, select: Select) -> Self {
                    self.selection.select = Some(select);
                    self
                }

                pub fn include(mut self, include: Include) -> Self {
                    self.selection.include = Some(include);
                    self
                }

                pub fn omit(mut self, omit: Omit) -> Self {
                    self.selection.omit = Some(omit);
                    self
                }
            }
        )*
    };
}

macro_rules! window_builders {
    ($($ty:ident),* $(,)?) => {
        $(
            impl $ty {
                pub fn filter(mut self, filter: WhereInput) -> Self {
                    self.r#where = Some(filter);
                    self
                }

                pub fn order_by(mut self, order: OrderBy) -> Self {
                    self.order_by.push(order);
                    self
                }

                pub fn cursor(mut self, cursor: WhereUniqueInput) -> Self {
                    self.cursor = Some(cursor);
                    self
                }

                /// Negative values take from the end of the ordered window.
                pub fn take(mut self, take: i64) -> Self {
                    self.take = Some(take);
                    self
                }

                pub fn skip(mut self, skip: u64) -> Self {
                    self.skip = Some(skip);
                    self
                }
            }
        )*
    };
}

// =============================================================================
// Reads
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct FindUniqueArgs {
    pub r#where: WhereUniqueInput,
    pub selection: Selection,
}

impl FindUniqueArgs {
    pub fn new(r#where: WhereUniqueInput) -> Self {
        Self {
            r#where,
            selection: Selection::default(),
        }
    }
}

/// Arguments of `findMany` / `findFirst`, also used for nested relation loads.
#[derive(Debug, Clone, Default)]
pub struct FindManyArgs {
    pub r#where: Option<WhereInput>,
    pub order_by: Vec<OrderBy>,
    pub cursor: Option<WhereUniqueInput>,
    pub take: Option<i64>,
    pub skip: Option<u64>,
    pub distinct: Vec<String>,
    pub selection: Selection,
}

impl FindManyArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn distinct<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.distinct = fields.into_iter().map(Into::into).collect();
        self
    }

    /// True when any windowing argument is set.
    pub fn has_window(&self) -> bool {
        self.r#where.is_some()
            || !self.order_by.is_empty()
            || self.cursor.is_some()
            || self.take.is_some()
            || self.skip.is_some()
            || !self.distinct.is_empty()
    }
}

// =============================================================================
// Writes
// =============================================================================

/// One scalar write inside `data`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldWrite {
    Set(Value),
    /// Explicit null marker for Json fields (`DbNull` / `JsonNull`).
    Null(NullMarker),
    Increment(Value),
    Decrement(Value),
    Multiply(Value),
    Divide(Value),
}

#[derive(Debug, Clone)]
pub enum Disconnect {
    /// To-one: `disconnect: true`.
    Relation,
    /// To-many: disconnect the listed rows.
    Records(Vec<WhereUniqueInput>),
}

/// Nested write on one relation slot. At most one kind may be used.
#[derive(Debug, Clone, Default)]
pub struct NestedWrite {
    pub create: Vec<Data>,
    pub connect: Vec<WhereUniqueInput>,
    pub connect_or_create: Vec<(WhereUniqueInput, Data)>,
    pub disconnect: Option<Disconnect>,
}

impl NestedWrite {
    /// Names of the kinds present, in declaration order.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        if !self.create.is_empty() {
            kinds.push("create");
        }
        if !self.connect.is_empty() {
            kinds.push("connect");
        }
        if !self.connect_or_create.is_empty() {
            kinds.push("connectOrCreate");
        }
        if self.disconnect.is_some() {
            kinds.push("disconnect");
        }
        kinds
    }
}

/// The `data` of a create or update.
#[derive(Debug, Clone, Default)]
pub struct Data {
    pub fields: Vec<(String, FieldWrite)>,
    pub relations: Vec<(String, NestedWrite)>,
}

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((field.into(), FieldWrite::Set(value.into())));
        self
    }

    pub fn json_null(mut self, field: impl Into<String>, marker: NullMarker) -> Self {
        self.fields.push((field.into(), FieldWrite::Null(marker)));
        self
    }

    pub fn increment(mut self, field: impl Into<String>, by: impl Into<Value>) -> Self {
        self.fields.push((field.into(), FieldWrite::Increment(by.into())));
        self
    }

    pub fn decrement(mut self, field: impl Into<String>, by: impl Into<Value>) -> Self {
        self.fields.push((field.into(), FieldWrite::Decrement(by.into())));
        self
    }

    pub fn multiply(mut self, field: impl Into<String>, by: impl Into<Value>) -> Self {
        self.fields.push((field.into(), FieldWrite::Multiply(by.into())));
        self
    }

    pub fn divide(mut self, field: impl Into<String>, by: impl Into<Value>) -> Self {
        self.fields.push((field.into(), FieldWrite::Divide(by.into())));
        self
    }

    fn slot(&mut self, relation: String) -> &mut NestedWrite {
        let pos = match self.relations.iter().position(|(r, _)| *r == relation) {
            Some(pos) => pos,
            None => {
                self.relations.push((relation, NestedWrite::default()));
                self.relations.len() - 1
            }
        };
        &mut self.relations[pos].1
    }

    pub fn create(mut self, relation: impl Into<String>, data: Data) -> Self {
        self.slot(relation.into()).create.push(data);
        self
    }

    pub fn connect(mut self, relation: impl Into<String>, target: WhereUniqueInput) -> Self {
        self.slot(relation.into()).connect.push(target);
        self
    }

    pub fn connect_or_create(
        mut self,
        relation: impl Into<String>,
        target: WhereUniqueInput,
        create: Data,
    ) -> Self {
        self.slot(relation.into())
            .connect_or_create
            .push((target, create));
        self
    }

    pub fn disconnect(mut self, relation: impl Into<String>, which: Disconnect) -> Self {
        self.slot(relation.into()).disconnect = Some(which);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateArgs {
    pub data: Data,
    pub selection: Selection,
}

impl CreateArgs {
    pub fn new(data: Data) -> Self {
        Self {
            data,
            selection: Selection::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateManyArgs {
    pub data: Vec<Data>,
    pub skip_duplicates: bool,
    pub selection: Selection,
}

impl CreateManyArgs {
    pub fn new(data: Vec<Data>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn skip_duplicates(mut self) -> Self {
        self.skip_duplicates = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateArgs {
    pub r#where: WhereUniqueInput,
    pub data: Data,
    pub selection: Selection,
}

impl UpdateArgs {
    pub fn new(r#where: WhereUniqueInput, data: Data) -> Self {
        Self {
            r#where,
            data,
            selection: Selection::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateManyArgs {
    pub r#where: Option<WhereInput>,
    pub data: Data,
    pub limit: Option<u64>,
    pub selection: Selection,
}

impl UpdateManyArgs {
    pub fn new(data: Data) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: WhereInput) -> Self {
        self.r#where = Some(filter);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpsertArgs {
    pub r#where: WhereUniqueInput,
    pub create: Data,
    pub update: Data,
    pub selection: Selection,
}

impl UpsertArgs {
    pub fn new(r#where: WhereUniqueInput, create: Data, update: Data) -> Self {
        Self {
            r#where,
            create,
            update,
            selection: Selection::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeleteArgs {
    pub r#where: WhereUniqueInput,
    pub selection: Selection,
}

impl DeleteArgs {
    pub fn new(r#where: WhereUniqueInput) -> Self {
        Self {
            r#where,
            selection: Selection::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeleteManyArgs {
    pub r#where: Option<WhereInput>,
    pub limit: Option<u64>,
}

impl DeleteManyArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: WhereInput) -> Self {
        self.r#where = Some(filter);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

// =============================================================================
// Aggregation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFn {
    Count,
    Avg,
    Sum,
    Min,
    Max,
}

impl AggregateFn {
    /// Key of this aggregate in payloads (`_avg`, `_count`, ...).
    pub fn key(self) -> &'static str {
        match self {
            AggregateFn::Count => "_count",
            AggregateFn::Avg => "_avg",
            AggregateFn::Sum => "_sum",
            AggregateFn::Min => "_min",
            AggregateFn::Max => "_max",
        }
    }
}

/// `_count: true` or `_count: { _all, field... }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountSelection {
    All,
    Fields { all: bool, fields: Vec<String> },
}

#[derive(Debug, Clone, Default)]
pub struct AggregateSelection {
    pub count: Option<CountSelection>,
    pub avg: Vec<String>,
    pub sum: Vec<String>,
    pub min: Vec<String>,
    pub max: Vec<String>,
}

impl AggregateSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_all(mut self) -> Self {
        self.count = Some(CountSelection::All);
        self
    }

    pub fn count_fields<I, S>(mut self, all: bool, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.count = Some(CountSelection::Fields {
            all,
            fields: fields.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn avg(mut self, field: impl Into<String>) -> Self {
        self.avg.push(field.into());
        self
    }

    pub fn sum(mut self, field: impl Into<String>) -> Self {
        self.sum.push(field.into());
        self
    }

    pub fn min(mut self, field: impl Into<String>) -> Self {
        self.min.push(field.into());
        self
    }

    pub fn max(mut self, field: impl Into<String>) -> Self {
        self.max.push(field.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.count.is_none()
            && self.avg.is_empty()
            && self.sum.is_empty()
            && self.min.is_empty()
            && self.max.is_empty()
    }

    /// `(function, field)` pairs other than `_count`, in payload order.
    pub fn field_aggregates(&self) -> impl Iterator<Item = (AggregateFn, &str)> {
        [
            (AggregateFn::Avg, &self.avg),
            (AggregateFn::Sum, &self.sum),
            (AggregateFn::Min, &self.min),
            (AggregateFn::Max, &self.max),
        ]
        .into_iter()
        .flat_map(|(func, fields)| fields.iter().map(move |f| (func, f.as_str())))
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregateArgs {
    pub r#where: Option<WhereInput>,
    pub order_by: Vec<OrderBy>,
    pub cursor: Option<WhereUniqueInput>,
    pub take: Option<i64>,
    pub skip: Option<u64>,
    pub aggregates: AggregateSelection,
}

impl AggregateArgs {
    pub fn new(aggregates: AggregateSelection) -> Self {
        Self {
            aggregates,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CountArgs {
    pub r#where: Option<WhereInput>,
    pub order_by: Vec<OrderBy>,
    pub cursor: Option<WhereUniqueInput>,
    pub take: Option<i64>,
    pub skip: Option<u64>,
    /// `None` returns a bare number.
    pub select: Option<CountSelection>,
}

impl CountArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, select: CountSelection) -> Self {
        self.select = Some(select);
        self
    }
}

#[derive(Debug, Clone)]
pub enum HavingCondition {
    /// Filter on a `by` field's group value.
    Scalar(ScalarFilter),
    /// Filter on an aggregate of any field.
    Aggregate(AggregateFn, ScalarFilter),
}

#[derive(Debug, Clone, Default)]
pub struct HavingInput {
    pub fields: Vec<(String, HavingCondition)>,
    pub and: Option<Vec<HavingInput>>,
    pub or: Option<Vec<HavingInput>>,
    pub not: Option<Vec<HavingInput>>,
}

impl HavingInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, filter: ScalarFilter) -> Self {
        self.fields.push((name.into(), HavingCondition::Scalar(filter)));
        self
    }

    pub fn aggregate(mut self, name: impl Into<String>, func: AggregateFn, filter: ScalarFilter) -> Self {
        self.fields
            .push((name.into(), HavingCondition::Aggregate(func, filter)));
        self
    }

    pub fn and(mut self, clauses: Vec<HavingInput>) -> Self {
        self.and = Some(clauses);
        self
    }

    pub fn or(mut self, clauses: Vec<HavingInput>) -> Self {
        self.or = Some(clauses);
        self
    }

    pub fn not(mut self, clauses: Vec<HavingInput>) -> Self {
        self.not = Some(clauses);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOrder {
    Field(OrderBy),
    /// Order by an aggregate, e.g. `{ _avg: { health: desc } }`; `_count` may use `_all`.
    Aggregate {
        func: AggregateFn,
        field: String,
        order: SortOrder,
    },
}

impl From<OrderBy> for GroupOrder {
    fn from(o: OrderBy) -> Self {
        GroupOrder::Field(o)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroupByArgs {
    pub by: Vec<String>,
    pub r#where: Option<WhereInput>,
    pub having: Option<HavingInput>,
    pub order_by: Vec<GroupOrder>,
    pub take: Option<u64>,
    pub skip: Option<u64>,
    pub aggregates: AggregateSelection,
}

impl GroupByArgs {
    pub fn new<I, S>(by: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            by: by.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: WhereInput) -> Self {
        self.r#where = Some(filter);
        self
    }

    pub fn having(mut self, having: HavingInput) -> Self {
        self.having = Some(having);
        self
    }

    pub fn order_by(mut self, order: impl Into<GroupOrder>) -> Self {
        self.order_by.push(order.into());
        self
    }

    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn aggregates(mut self, aggregates: AggregateSelection) -> Self {
        self.aggregates = aggregates;
        self
    }
}

selection_builders!(
    FindUniqueArgs,
    FindManyArgs,
    CreateArgs,
    CreateManyArgs,
    UpdateArgs,
    UpdateManyArgs,
    UpsertArgs,
    DeleteArgs,
);

window_builders!(FindManyArgs, AggregateArgs, CountArgs);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_writes_accumulate_per_slot() {
        let data = Data::new()
            .set("name", "db-1")
            .create("metrics", Data::new().set("value", 1.0))
            .create("metrics", Data::new().set("value", 2.0))
            .connect("alerts", WhereUniqueInput::by("id", "a1"));
        assert_eq!(data.relations.len(), 2);
        assert_eq!(data.relations[0].1.create.len(), 2);
        assert_eq!(data.relations[1].1.kinds(), vec!["connect"]);
    }

    #[test]
    fn reversed_order_flips_nulls() {
        let o = OrderBy::asc("score");
        assert_eq!(o.effective_nulls(), NullsOrder::First);
        let r = o.reversed();
        assert_eq!(r.order, SortOrder::Desc);
        assert_eq!(r.effective_nulls(), NullsOrder::Last);
    }
}

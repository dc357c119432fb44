//! `aggregate`, `count` and `groupBy`.
//!
//! Aggregates are computed by the engine over the filtered (and, for
//! `aggregate`/`count`, windowed) rows. `groupBy` builds one synthetic row per
//! group holding the `by` values and every aggregate it needs under dotted
//! column names (`_avg.health`), so `having` compiles to an ordinary
//! [`Predicate`] and `orderBy` to an ordinary row ordering.

use hashbrown::HashMap;
use quarry_core::{
    AggregateArgs, AggregateFn, AggregateSelection, Connection, CountArgs, CountSelection,
    EntityDef, FieldDef, GroupByArgs, GroupOrder, HavingCondition, HavingInput, KeyTuple, OrderBy,
    Predicate, QuarryError, Result, Row, ScalarType, Schema, SelectStatement, Value,
    compare_rows, compile_scalar,
};

use super::window::{Window, total_order};
use super::{Engine, mapper};
use crate::operation::{CountResult, Record};

const ALL: &str = "_all";

impl<'a, C: Connection> Engine<'a, C> {
    pub(super) async fn aggregate(
        self,
        entity: &'static EntityDef,
        args: &AggregateArgs,
    ) -> Result<Record> {
        check_selection(entity, &args.aggregates)?;
        let rows = self
            .select_window(entity, args.r#where.as_ref(), Window::from(args), None)
            .await?;
        let columns = selected_columns(&args.aggregates);
        let mut out = Vec::with_capacity(columns.len());
        for (column, func, field) in &columns {
            out.push((column.clone(), compute(entity, *func, field, &rows)?));
        }
        Ok(mapper::nest(out.iter().map(|(k, v)| (k.as_str(), v))))
    }

    pub(super) async fn count(self, entity: &'static EntityDef, args: &CountArgs) -> Result<CountResult> {
        let fields: Vec<&str> = match &args.select {
            Some(CountSelection::Fields { fields, .. }) => {
                for f in fields {
                    entity.field_or_err(f)?;
                }
                fields.iter().map(String::as_str).collect()
            }
            _ => Vec::new(),
        };
        let mut columns = vec![entity.primary_key.to_owned()];
        columns.extend(fields.iter().map(|f| (*f).to_owned()));
        let rows = self
            .select_window(entity, args.r#where.as_ref(), Window::from(args), Some(columns))
            .await?;

        let Some(select) = &args.select else {
            return Ok(CountResult::Total(rows.len() as u64));
        };
        let mut record = Record::new();
        let with_all = match select {
            CountSelection::All => true,
            CountSelection::Fields { all, .. } => *all,
        };
        if with_all {
            record.insert(ALL, rows.len().into());
        }
        for f in fields {
            let n = rows.iter().filter(|r| !r.get(f).is_null()).count();
            record.insert(f, n.into());
        }
        Ok(CountResult::Fields(record))
    }

    pub(super) async fn group_by(
        self,
        entity: &'static EntityDef,
        args: &GroupByArgs,
    ) -> Result<Vec<Record>> {
        let schema = self.schema();
        if args.by.is_empty() {
            return Err(QuarryError::validation(
                "Argument `by` of groupBy must contain at least one field",
            ));
        }
        for f in &args.by {
            entity.field_or_err(f)?;
        }
        check_selection(entity, &args.aggregates)?;

        // Every aggregate a group row must carry: selected, filtered on, ordered by.
        let mut needed: Vec<(AggregateFn, String)> = args
            .aggregates
            .field_aggregates()
            .map(|(func, f)| (func, f.to_owned()))
            .collect();
        needed.extend(count_fields(&args.aggregates).map(|f| (AggregateFn::Count, f)));

        let having = match &args.having {
            Some(having) => compile_having(schema, entity, &args.by, having, &mut needed)?,
            None => Predicate::Const(true),
        };
        let order = group_order(entity, &args.by, &args.order_by, &mut needed)?;
        if order.is_empty() && (args.skip.is_some() || args.take.is_some()) {
            return Err(QuarryError::validation(
                "Every groupBy using `take` or `skip` must also specify `orderBy`",
            ));
        }

        let filter = self.filter(entity, args.r#where.as_ref()).await?;
        let mut select = SelectStatement::new(entity.name, filter);
        select.order_by = total_order(entity, &[]);
        let rows = self.run(select).await?.rows;

        let by: Vec<&str> = args.by.iter().map(String::as_str).collect();
        let mut index: HashMap<KeyTuple, usize> = HashMap::new();
        let mut groups: Vec<Vec<Row>> = Vec::new();
        for row in rows {
            let slot = *index.entry(row.key(&by)).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(row);
        }

        let mut summaries = Vec::with_capacity(groups.len());
        for members in &groups {
            let mut summary = Row::new();
            for f in &by {
                summary.set(*f, members[0].get(f).clone());
            }
            for (func, field) in &needed {
                summary.set(column(*func, field), compute(entity, *func, field, members)?);
            }
            if having.matches(&summary) {
                summaries.push(summary);
            }
        }
        if !order.is_empty() {
            summaries.sort_by(|a, b| compare_rows(a, b, &order));
        }

        let skip = args.skip.map_or(0, |s| s as usize);
        let take = args.take.map_or(usize::MAX, |t| t as usize);
        let columns = selected_columns(&args.aggregates);
        Ok(summaries
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|summary| {
                let by_values = by.iter().map(|f| (*f, summary.get(f)));
                let aggregates = columns.iter().map(|(key, func, field)| {
                    (key.as_str(), summary.get(&column(*func, field)))
                });
                mapper::nest(by_values.chain(aggregates))
            })
            .collect())
    }
}

fn column(func: AggregateFn, field: &str) -> String {
    format!("{}.{field}", func.key())
}

/// `_count` fields implied by a selection, `_all` included.
fn count_fields(selection: &AggregateSelection) -> impl Iterator<Item = String> + '_ {
    let (all, fields): (bool, &[String]) = match &selection.count {
        None => (false, &[]),
        Some(CountSelection::All) => (true, &[]),
        Some(CountSelection::Fields { all, fields }) => (*all, fields.as_slice()),
    };
    all.then(|| ALL.to_owned())
        .into_iter()
        .chain(fields.iter().cloned())
}

/// Output keys of a selection with the aggregate behind each. `_count: true`
/// is a bare number under `_count`.
fn selected_columns(selection: &AggregateSelection) -> Vec<(String, AggregateFn, String)> {
    let mut out = Vec::new();
    match &selection.count {
        Some(CountSelection::All) => out.push(("_count".to_owned(), AggregateFn::Count, ALL.to_owned())),
        Some(CountSelection::Fields { .. }) => {
            for f in count_fields(selection) {
                out.push((column(AggregateFn::Count, &f), AggregateFn::Count, f));
            }
        }
        None => {}
    }
    for (func, f) in selection.field_aggregates() {
        out.push((column(func, f), func, f.to_owned()));
    }
    out
}

fn check_selection(entity: &EntityDef, selection: &AggregateSelection) -> Result<()> {
    for f in count_fields(selection) {
        check_aggregate(entity, AggregateFn::Count, &f)?;
    }
    for (func, f) in selection.field_aggregates() {
        check_aggregate(entity, func, f)?;
    }
    Ok(())
}

/// The field an aggregate runs over, `None` for `_count._all`.
fn check_aggregate(entity: &EntityDef, func: AggregateFn, field: &str) -> Result<Option<&'static FieldDef>> {
    if field == ALL {
        return match func {
            AggregateFn::Count => Ok(None),
            _ => Err(QuarryError::validation(format!(
                "`_all` is only valid inside `_count`, not `{}`",
                func.key()
            ))),
        };
    }
    let def = entity.field_or_err(field)?;
    let ok = match func {
        AggregateFn::Count => true,
        AggregateFn::Avg | AggregateFn::Sum => def.ty.is_numeric(),
        AggregateFn::Min | AggregateFn::Max => def.ty.is_orderable(),
    };
    if !ok {
        return Err(QuarryError::validation(format!(
            "`{}` cannot be applied to `{}.{field}` of type {}",
            func.key(),
            entity.name,
            def.ty.name()
        )));
    }
    Ok(Some(def))
}

/// One aggregate over `rows`. NULLs are skipped; an aggregate over no non-null
/// values is NULL, except counts which are zero.
fn compute(entity: &EntityDef, func: AggregateFn, field: &str, rows: &[Row]) -> Result<Value> {
    if field == ALL {
        return Ok(Value::Int(rows.len() as i64));
    }
    let values: Vec<&Value> = rows.iter().map(|r| r.get(field)).filter(|v| !v.is_null()).collect();
    Ok(match func {
        AggregateFn::Count => Value::Int(values.len() as i64),
        _ if values.is_empty() => Value::Null,
        AggregateFn::Avg => {
            let total: f64 = values.iter().filter_map(|v| v.as_f64()).sum();
            Value::Float(total / values.len() as f64)
        }
        AggregateFn::Sum => match entity.field(field).map(|f| f.ty) {
            Some(ScalarType::Int) => values
                .iter()
                .filter_map(|v| v.as_i64())
                .try_fold(0i64, i64::checked_add)
                .map(Value::Int)
                .ok_or_else(|| QuarryError::UnknownStore(format!("`_sum` of `{field}` overflowed")))?,
            _ => Value::Float(values.iter().filter_map(|v| v.as_f64()).sum()),
        },
        AggregateFn::Min => values
            .into_iter()
            .min_by(|a, b| a.sort_cmp(b))
            .cloned()
            .unwrap_or_default(),
        AggregateFn::Max => values
            .into_iter()
            .max_by(|a, b| a.sort_cmp(b))
            .cloned()
            .unwrap_or_default(),
    })
}

/// Lowers `having` to a predicate over group rows, recording the aggregates
/// it reads.
fn compile_having(
    schema: &Schema,
    entity: &EntityDef,
    by: &[String],
    having: &HavingInput,
    needed: &mut Vec<(AggregateFn, String)>,
) -> Result<Predicate> {
    let mut parts = Vec::new();
    for (name, condition) in &having.fields {
        match condition {
            HavingCondition::Scalar(filter) => {
                let def = entity.field_or_err(name)?;
                if !by.contains(name) {
                    return Err(QuarryError::validation(format!(
                        "Field `{name}` used in `having` must either be in `by` or be wrapped in an aggregate"
                    )));
                }
                parts.push(compile_scalar(schema, name, def.ty, def.optional, filter)?);
            }
            HavingCondition::Aggregate(func, filter) => {
                let def = check_aggregate(entity, *func, name)?;
                let (ty, nullable) = match (func, def) {
                    (AggregateFn::Count, _) => (ScalarType::Int, false),
                    (AggregateFn::Avg, _) => (ScalarType::Float, true),
                    (_, Some(def)) => (def.ty, true),
                    (_, None) => (ScalarType::Int, false),
                };
                parts.push(compile_scalar(schema, &column(*func, name), ty, nullable, filter)?);
                if !needed.iter().any(|(f, n)| f == func && n == name) {
                    needed.push((*func, name.clone()));
                }
            }
        }
    }
    if let Some(clauses) = &having.and {
        let compiled = clauses
            .iter()
            .map(|c| compile_having(schema, entity, by, c, needed))
            .collect::<Result<Vec<_>>>()?;
        parts.push(Predicate::all(compiled));
    }
    if let Some(clauses) = &having.or {
        let compiled = clauses
            .iter()
            .map(|c| compile_having(schema, entity, by, c, needed))
            .collect::<Result<Vec<_>>>()?;
        parts.push(Predicate::any(compiled));
    }
    if let Some(clauses) = &having.not {
        let compiled = clauses
            .iter()
            .map(|c| compile_having(schema, entity, by, c, needed).map(Predicate::negate))
            .collect::<Result<Vec<_>>>()?;
        parts.push(Predicate::all(compiled));
    }
    Ok(Predicate::all(parts))
}

/// Row ordering over group rows. Plain fields must be grouped on.
fn group_order(
    entity: &EntityDef,
    by: &[String],
    order_by: &[GroupOrder],
    needed: &mut Vec<(AggregateFn, String)>,
) -> Result<Vec<OrderBy>> {
    order_by
        .iter()
        .map(|o| match o {
            GroupOrder::Field(o) => {
                entity.field_or_err(&o.field)?;
                if !by.contains(&o.field) {
                    return Err(QuarryError::validation(format!(
                        "Field `{}` used in `orderBy` of groupBy must be in `by`",
                        o.field
                    )));
                }
                Ok(o.clone())
            }
            GroupOrder::Aggregate { func, field, order } => {
                check_aggregate(entity, *func, field)?;
                if !needed.iter().any(|(f, n)| f == func && n == field) {
                    needed.push((*func, field.clone()));
                }
                Ok(OrderBy {
                    field: column(*func, field),
                    order: *order,
                    nulls: None,
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    static READING: EntityDef = EntityDef {
        name: "Reading",
        fields: &[
            FieldDef::new("id", ScalarType::String),
            FieldDef::new("score", ScalarType::Int).optional(),
            FieldDef::new("payload", ScalarType::Json).optional(),
        ],
        relations: &[],
        primary_key: "id",
        unique_keys: &[],
    };

    fn rows() -> Vec<Row> {
        vec![
            Row::new().with("id", "a").with("score", 10),
            Row::new().with("id", "b").with("score", Value::Null),
            Row::new().with("id", "c").with("score", 30),
        ]
    }

    #[test]
    fn numeric_aggregates_skip_nulls() {
        let rows = rows();
        assert_eq!(compute(&READING, AggregateFn::Avg, "score", &rows).unwrap(), Value::Float(20.0));
        assert_eq!(compute(&READING, AggregateFn::Sum, "score", &rows).unwrap(), Value::Int(40));
        assert_eq!(compute(&READING, AggregateFn::Count, "score", &rows).unwrap(), Value::Int(2));
        assert_eq!(compute(&READING, AggregateFn::Count, ALL, &rows).unwrap(), Value::Int(3));
        assert_eq!(compute(&READING, AggregateFn::Min, "score", &rows[1..2]).unwrap(), Value::Null);
    }

    #[test]
    fn aggregates_are_checked_against_field_types() {
        assert!(check_aggregate(&READING, AggregateFn::Avg, "payload").is_err());
        assert!(check_aggregate(&READING, AggregateFn::Max, "payload").is_err());
        assert!(check_aggregate(&READING, AggregateFn::Sum, ALL).is_err());
        assert!(check_aggregate(&READING, AggregateFn::Count, "payload").is_ok());
    }
}

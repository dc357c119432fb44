use chrono::{DateTime, Utc};

use super::predicate::{CompareOp, JsonOp, Predicate, SubQuery, TextOp};
use super::{Condition, QueryMode, RelationFilter, ScalarFilter, WhereInput};
use crate::error::{QuarryError, Result};
use crate::json::{JsonFilter, JsonTarget};
use crate::schema::{EntityDef, RelCardinality, RelationDef, ScalarType, Schema};
use crate::value::Value;

/// Validates `input` against `entity` and lowers it to a [`Predicate`].
pub fn compile_where(schema: &Schema, entity: &EntityDef, input: &WhereInput) -> Result<Predicate> {
    let mut parts = Vec::with_capacity(input.fields.len() + 3);

    for (name, condition) in &input.fields {
        parts.push(compile_condition(schema, entity, name, condition)?);
    }

    if let Some(clauses) = &input.and {
        let compiled = clauses
            .iter()
            .map(|c| compile_where(schema, entity, c))
            .collect::<Result<Vec<_>>>()?;
        parts.push(Predicate::all(compiled));
    }
    if let Some(clauses) = &input.or {
        let compiled = clauses
            .iter()
            .map(|c| compile_where(schema, entity, c))
            .collect::<Result<Vec<_>>>()?;
        parts.push(Predicate::any(compiled));
    }
    if let Some(clauses) = &input.not {
        // NOT over a list negates each clause: none of them may hold.
        let compiled = clauses
            .iter()
            .map(|c| compile_where(schema, entity, c).map(Predicate::negate))
            .collect::<Result<Vec<_>>>()?;
        parts.push(Predicate::all(compiled));
    }

    Ok(Predicate::all(parts))
}

fn compile_condition(
    schema: &Schema,
    entity: &EntityDef,
    name: &str,
    condition: &Condition,
) -> Result<Predicate> {
    if let Some(rel) = entity.relation(name) {
        return match condition {
            Condition::Relation(filter) => compile_relation(schema, entity, rel, filter),
            _ => Err(QuarryError::validation(format!(
                "Relation field `{}.{name}` needs a relation filter (some/every/none/is/isNot)",
                entity.name
            ))),
        };
    }

    let field = entity.field_or_err(name)?;
    match (condition, field.ty) {
        (Condition::Json(filter), ScalarType::Json) => compile_json(name, filter),
        (Condition::Scalar(filter), ty) if ty != ScalarType::Json => {
            compile_scalar(schema, name, ty, field.optional, filter)
        }
        (Condition::Relation(_), _) => Err(QuarryError::validation(format!(
            "`{}.{name}` is a scalar field and cannot take a relation filter",
            entity.name
        ))),
        (_, ScalarType::Json) => Err(QuarryError::validation(format!(
            "`{}.{name}` is a Json field; use a Json filter",
            entity.name
        ))),
        _ => Err(QuarryError::validation(format!(
            "`{}.{name}` does not accept a Json filter",
            entity.name
        ))),
    }
}

/// Compiles the operator set of one scalar column.
///
/// `column` may name a synthetic column (aggregate results in `having`).
pub fn compile_scalar(
    schema: &Schema,
    column: &str,
    ty: ScalarType,
    nullable: bool,
    filter: &ScalarFilter,
) -> Result<Predicate> {
    let insensitive = filter.mode == QueryMode::Insensitive;
    if insensitive && ty != ScalarType::String {
        return Err(QuarryError::validation(format!(
            "`mode: insensitive` is only valid on String fields, not `{column}`"
        )));
    }

    let mut parts = Vec::new();

    if let Some(v) = &filter.equals {
        if v.is_null() {
            if !nullable {
                return Err(QuarryError::validation(format!(
                    "`{column}` is required and can never be null"
                )));
            }
            parts.push(Predicate::IsNull(column.to_owned()));
        } else {
            parts.push(Predicate::Compare {
                field: column.to_owned(),
                op: CompareOp::Eq,
                value: coerce(schema, ty, v, column)?,
                insensitive,
            });
        }
    }

    for (list, negated) in [(&filter.in_list, false), (&filter.not_in, true)] {
        if let Some(values) = list {
            let values = values
                .iter()
                .map(|v| {
                    if v.is_null() {
                        Err(QuarryError::validation(format!(
                            "`in`/`notIn` on `{column}` cannot contain null"
                        )))
                    } else {
                        coerce(schema, ty, v, column)
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            let p = Predicate::In {
                field: column.to_owned(),
                values,
                insensitive,
            };
            parts.push(if negated { p.negate() } else { p });
        }
    }

    for (bound, op) in [
        (&filter.lt, CompareOp::Lt),
        (&filter.lte, CompareOp::Lte),
        (&filter.gt, CompareOp::Gt),
        (&filter.gte, CompareOp::Gte),
    ] {
        if let Some(v) = bound {
            if !ty.is_orderable() || ty == ScalarType::Boolean {
                return Err(QuarryError::validation(format!(
                    "range filters are not supported on {} field `{column}`",
                    ty.name()
                )));
            }
            if v.is_null() {
                return Err(QuarryError::validation(format!(
                    "range filter on `{column}` needs a non-null bound"
                )));
            }
            parts.push(Predicate::Compare {
                field: column.to_owned(),
                op,
                value: coerce(schema, ty, v, column)?,
                insensitive,
            });
        }
    }

    for (pattern, op) in [
        (&filter.contains, TextOp::Contains),
        (&filter.starts_with, TextOp::StartsWith),
        (&filter.ends_with, TextOp::EndsWith),
    ] {
        if let Some(pattern) = pattern {
            if ty != ScalarType::String {
                return Err(QuarryError::validation(format!(
                    "string filters are only valid on String fields, not `{column}`"
                )));
            }
            parts.push(Predicate::Text {
                field: column.to_owned(),
                op,
                pattern: pattern.clone(),
                insensitive,
            });
        }
    }

    if let Some(inner) = &filter.not {
        let mut inner = (**inner).clone();
        if insensitive {
            inner.mode = QueryMode::Insensitive;
        }
        parts.push(compile_scalar(schema, column, ty, nullable, &inner)?.negate());
    }

    Ok(Predicate::all(parts))
}

fn compile_json(column: &str, filter: &JsonFilter) -> Result<Predicate> {
    let insensitive = filter.mode == QueryMode::Insensitive;
    let mut parts = Vec::new();
    let json = |op: JsonOp| Predicate::Json {
        field: column.to_owned(),
        path: filter.path.clone(),
        op,
    };

    let target_predicate = |target: &JsonTarget| -> Result<Predicate> {
        match target {
            JsonTarget::Null(marker) => Ok(Predicate::JsonNull {
                field: column.to_owned(),
                path: filter.path.clone(),
                marker: *marker,
            }),
            JsonTarget::Value(serde_json::Value::Null) => Err(QuarryError::validation(format!(
                "ambiguous null for Json field `{column}`; use DbNull, JsonNull or AnyNull"
            ))),
            JsonTarget::Value(v) => Ok(json(JsonOp::Equals(v.clone()))),
        }
    };

    if let Some(target) = &filter.equals {
        parts.push(target_predicate(target)?);
    }
    if let Some(target) = &filter.not {
        parts.push(target_predicate(target)?.negate());
    }

    for (pattern, op) in [
        (&filter.string_contains, TextOp::Contains),
        (&filter.string_starts_with, TextOp::StartsWith),
        (&filter.string_ends_with, TextOp::EndsWith),
    ] {
        if let Some(pattern) = pattern {
            parts.push(json(JsonOp::String {
                op,
                pattern: pattern.clone(),
                insensitive,
            }));
        }
    }

    if let Some(v) = &filter.array_contains {
        parts.push(json(JsonOp::ArrayContains(v.clone())));
    }
    if let Some(v) = &filter.array_starts_with {
        parts.push(json(JsonOp::ArrayStartsWith(v.clone())));
    }
    if let Some(v) = &filter.array_ends_with {
        parts.push(json(JsonOp::ArrayEndsWith(v.clone())));
    }

    for (bound, op) in [
        (&filter.lt, CompareOp::Lt),
        (&filter.lte, CompareOp::Lte),
        (&filter.gt, CompareOp::Gt),
        (&filter.gte, CompareOp::Gte),
    ] {
        if let Some(v) = bound {
            parts.push(json(JsonOp::Compare(op, v.clone())));
        }
    }

    Ok(Predicate::all(parts))
}

fn compile_relation(
    schema: &Schema,
    entity: &EntityDef,
    rel: &RelationDef,
    filter: &RelationFilter,
) -> Result<Predicate> {
    let target = schema.entity(rel.target)?;
    let [(local, remote)] = rel.fk_columns else {
        return Err(QuarryError::validation(format!(
            "relation filters on composite relation `{}.{}` are not supported",
            entity.name, rel.name
        )));
    };
    let sub = |filter: Predicate, negated: bool| {
        Predicate::SubQuery(Box::new(SubQuery {
            local_field: (*local).to_owned(),
            target: target.name,
            remote_field: (*remote).to_owned(),
            filter,
            negated,
        }))
    };
    let wrong_kind = |kind: &str| {
        QuarryError::validation(format!(
            "`{kind}` is not valid on {} relation `{}.{}`",
            if rel.is_many() { "to-many" } else { "to-one" },
            entity.name,
            rel.name
        ))
    };

    match (filter, rel.is_many()) {
        (RelationFilter::Some(w), true) => Ok(sub(compile_where(schema, target, w)?, false)),
        (RelationFilter::None(w), true) => Ok(sub(compile_where(schema, target, w)?, true)),
        (RelationFilter::Every(w), true) => {
            Ok(sub(compile_where(schema, target, w)?.negate(), true))
        }
        (RelationFilter::Is(Some(w)), false) => Ok(sub(compile_where(schema, target, w)?, false)),
        (RelationFilter::Is(None), false) => {
            if rel.cardinality == RelCardinality::One {
                return Err(QuarryError::validation(format!(
                    "required relation `{}.{}` can never be null",
                    entity.name, rel.name
                )));
            }
            if rel.owns_fk {
                Ok(Predicate::IsNull((*local).to_owned()))
            } else {
                Ok(sub(Predicate::Const(true), true))
            }
        }
        (RelationFilter::IsNot(Some(w)), false) => {
            let excluded = sub(compile_where(schema, target, w)?, true);
            if rel.owns_fk && rel.cardinality == RelCardinality::OptionalOne {
                Ok(Predicate::any(vec![
                    Predicate::IsNull((*local).to_owned()),
                    excluded,
                ]))
            } else {
                Ok(excluded)
            }
        }
        (RelationFilter::IsNot(None), false) => {
            if rel.owns_fk {
                Ok(Predicate::IsNull((*local).to_owned()).negate())
            } else {
                Ok(sub(Predicate::Const(true), false))
            }
        }
        (RelationFilter::Some(_), false) => Err(wrong_kind("some")),
        (RelationFilter::None(_), false) => Err(wrong_kind("none")),
        (RelationFilter::Every(_), false) => Err(wrong_kind("every")),
        (RelationFilter::Is(_), true) => Err(wrong_kind("is")),
        (RelationFilter::IsNot(_), true) => Err(wrong_kind("isNot")),
    }
}

/// Converts a caller-supplied value into the column's storage representation.
///
/// Enum tags are checked against their domain; ints widen to floats; RFC 3339
/// strings parse into timestamps. NULL is rejected; callers handle it first.
pub fn coerce(schema: &Schema, ty: ScalarType, value: &Value, column: &str) -> Result<Value> {
    let mismatch = || {
        QuarryError::validation(format!(
            "Invalid value for `{column}`: expected {}, got {}",
            ty.name(),
            value.type_name()
        ))
    };
    match (ty, value) {
        (_, Value::Null) => Err(mismatch()),
        (ScalarType::String, Value::String(_)) => Ok(value.clone()),
        (ScalarType::Int, Value::Int(_)) => Ok(value.clone()),
        (ScalarType::Float, Value::Float(_)) => Ok(value.clone()),
        (ScalarType::Float, Value::Int(i)) => Ok(Value::Float(*i as f64)),
        (ScalarType::Boolean, Value::Bool(_)) => Ok(value.clone()),
        (ScalarType::DateTime, Value::DateTime(_)) => Ok(value.clone()),
        (ScalarType::DateTime, Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
            .map_err(|_| mismatch()),
        (ScalarType::Json, Value::Json(_)) => Ok(value.clone()),
        (ScalarType::Enum(name), Value::String(tag) | Value::Enum(tag)) => {
            let domain = schema
                .enum_def(name)
                .ok_or_else(|| QuarryError::validation(format!("Unknown enum `{name}`")))?;
            if domain.contains(tag) {
                Ok(Value::Enum(tag.clone()))
            } else {
                Err(QuarryError::validation(format!(
                    "Value `{tag}` is not a valid `{name}` for `{column}`; expected one of: {}",
                    domain.values.join(", ")
                )))
            }
        }
        _ => Err(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::NullMarker;
    use crate::schema::fixtures::{self, AUTHOR, POST};
    use crate::value::Row;

    #[test]
    fn empty_or_matches_nothing_and_empty_and_matches_everything() {
        let schema = fixtures::schema();
        let row = Row::new().with("title", "x");
        let or = compile_where(&schema, &POST, &WhereInput::new().or(vec![])).unwrap();
        let and = compile_where(&schema, &POST, &WhereInput::new().and(vec![])).unwrap();
        let not = compile_where(&schema, &POST, &WhereInput::new().not(vec![])).unwrap();
        assert!(!or.matches(&row));
        assert!(and.matches(&row));
        assert!(not.matches(&row));
    }

    #[test]
    fn equals_null_becomes_is_null() {
        let schema = fixtures::schema();
        let p = compile_where(
            &schema,
            &AUTHOR,
            &WhereInput::new().field("name", ScalarFilter::new().is_null()),
        )
        .unwrap();
        assert_eq!(p, Predicate::IsNull("name".into()));
    }

    #[test]
    fn enum_values_outside_domain_are_rejected() {
        let schema = fixtures::schema();
        let err = compile_where(&schema, &POST, &WhereInput::new().eq("status", "ARCHIVED"))
            .unwrap_err();
        assert!(matches!(err, QuarryError::Validation(_)));

        let ok = compile_where(&schema, &POST, &WhereInput::new().eq("status", "DRAFT")).unwrap();
        assert!(ok.matches(&Row::new().with("status", Value::Enum("DRAFT".into()))));
    }

    #[test]
    fn unknown_fields_and_wrong_filters_are_rejected() {
        let schema = fixtures::schema();
        let cases: [(&EntityDef, WhereInput); 6] = [
            (&AUTHOR, WhereInput::new().eq("nope", 1)),
            (&POST, WhereInput::new().field("title", ScalarFilter::new().gt(Value::Bool(true)))),
            (&POST, WhereInput::new().field("score", ScalarFilter::new().contains("x"))),
            (&POST, WhereInput::new().field("meta", ScalarFilter::new().equals(1))),
            (&AUTHOR, WhereInput::new().field("posts", RelationFilter::Is(None))),
            (&AUTHOR, WhereInput::new().field("email", ScalarFilter::new().is_null())),
        ];
        for (entity, input) in cases {
            let err = compile_where(&schema, entity, &input).unwrap_err();
            assert!(matches!(err, QuarryError::Validation(_)), "{input:?}");
        }
    }

    #[test]
    fn not_with_null_excludes_null_rows() {
        let schema = fixtures::schema();
        let p = compile_where(
            &schema,
            &AUTHOR,
            &WhereInput::new().field("age", ScalarFilter::new().not(ScalarFilter::new().equals(30))),
        )
        .unwrap();
        assert!(p.matches(&Row::new().with("age", 20)));
        assert!(!p.matches(&Row::new().with("age", Value::Null)));
    }

    #[test]
    fn json_filters_require_explicit_null_marker() {
        let schema = fixtures::schema();
        let ambiguous = WhereInput::new().field(
            "meta",
            JsonFilter::new().equals(serde_json::Value::Null),
        );
        assert!(compile_where(&schema, &POST, &ambiguous).is_err());

        let db_null = compile_where(
            &schema,
            &POST,
            &WhereInput::new().field("meta", JsonFilter::new().equals(NullMarker::DbNull)),
        )
        .unwrap();
        assert!(db_null.matches(&Row::new().with("meta", Value::Null)));
    }

    #[test]
    fn relation_filters_compile_to_subqueries() {
        let schema = fixtures::schema();
        let p = compile_where(
            &schema,
            &AUTHOR,
            &WhereInput::new().field(
                "posts",
                RelationFilter::Every(WhereInput::new().eq("status", "PUBLISHED")),
            ),
        )
        .unwrap();
        let Predicate::SubQuery(sub) = p else {
            panic!("expected subquery, got {p:?}");
        };
        assert!(sub.negated);
        assert_eq!(sub.local_field, "id");
        assert_eq!(sub.remote_field, "authorId");
        assert!(matches!(sub.filter, Predicate::Not(_)));

        let orphan = compile_where(
            &schema,
            &POST,
            &WhereInput::new().field("author", RelationFilter::Is(None)),
        )
        .unwrap();
        assert_eq!(orphan, Predicate::IsNull("authorId".into()));
    }
}

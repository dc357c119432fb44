use core::cmp::Ordering;

use crate::json::{self, NullMarker};
use crate::value::{Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    fn holds(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Lte => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Gte => ord != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOp {
    Contains,
    StartsWith,
    EndsWith,
}

impl TextOp {
    fn holds(self, haystack: &str, needle: &str) -> bool {
        match self {
            TextOp::Contains => haystack.contains(needle),
            TextOp::StartsWith => haystack.starts_with(needle),
            TextOp::EndsWith => haystack.ends_with(needle),
        }
    }
}

/// Operators applied to the JSON value found at a path.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonOp {
    Equals(serde_json::Value),
    String {
        op: TextOp,
        pattern: String,
        insensitive: bool,
    },
    ArrayContains(serde_json::Value),
    ArrayStartsWith(serde_json::Value),
    ArrayEndsWith(serde_json::Value),
    Compare(CompareOp, serde_json::Value),
}

/// A relation filter not yet lowered to a key set.
///
/// Matches when `local_field IN (SELECT remote_field FROM target WHERE filter)`,
/// or the negation when `negated` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct SubQuery {
    pub local_field: String,
    pub target: &'static str,
    pub remote_field: String,
    pub filter: Predicate,
    pub negated: bool,
}

/// A compiled, schema-checked filter over a single row.
///
/// Evaluation is three-valued: `None` is SQL UNKNOWN, produced by comparisons
/// involving NULL. Only rows evaluating to `Some(true)` match.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Const(bool),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
        insensitive: bool,
    },
    In {
        field: String,
        values: Vec<Value>,
        insensitive: bool,
    },
    IsNull(String),
    Text {
        field: String,
        op: TextOp,
        pattern: String,
        insensitive: bool,
    },
    Json {
        field: String,
        path: Vec<String>,
        op: JsonOp,
    },
    JsonNull {
        field: String,
        path: Vec<String>,
        marker: NullMarker,
    },
    SubQuery(Box<SubQuery>),
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op: CompareOp::Eq,
            value: value.into(),
            insensitive: false,
        }
    }

    pub fn in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In {
            field: field.into(),
            values,
            insensitive: false,
        }
    }

    pub fn negate(self) -> Self {
        match self {
            Predicate::Const(b) => Predicate::Const(!b),
            Predicate::Not(inner) => *inner,
            other => Predicate::Not(Box::new(other)),
        }
    }

    /// Conjunction with constant folding. An empty list is `true`.
    pub fn all(parts: Vec<Predicate>) -> Self {
        let mut out = Vec::with_capacity(parts.len());
        for p in parts {
            match p {
                Predicate::Const(true) => {}
                Predicate::Const(false) => return Predicate::Const(false),
                Predicate::And(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Predicate::Const(true),
            1 => out.pop().unwrap_or(Predicate::Const(true)),
            _ => Predicate::And(out),
        }
    }

    /// Disjunction with constant folding. An empty list is `false`.
    pub fn any(parts: Vec<Predicate>) -> Self {
        let mut out = Vec::with_capacity(parts.len());
        for p in parts {
            match p {
                Predicate::Const(false) => {}
                Predicate::Const(true) => return Predicate::Const(true),
                Predicate::Or(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Predicate::Const(false),
            1 => out.pop().unwrap_or(Predicate::Const(false)),
            _ => Predicate::Or(out),
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.eval(row) == Some(true)
    }

    /// Kleene evaluation against `row`.
    pub fn eval(&self, row: &Row) -> Option<bool> {
        match self {
            Predicate::Const(b) => Some(*b),
            Predicate::And(parts) => {
                let mut unknown = false;
                for p in parts {
                    match p.eval(row) {
                        Some(false) => return Some(false),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                if unknown { None } else { Some(true) }
            }
            Predicate::Or(parts) => {
                let mut unknown = false;
                for p in parts {
                    match p.eval(row) {
                        Some(true) => return Some(true),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                if unknown { None } else { Some(false) }
            }
            Predicate::Not(inner) => inner.eval(row).map(|b| !b),
            Predicate::Compare {
                field,
                op,
                value,
                insensitive,
            } => {
                let current = row.get(field);
                let ord = if *insensitive {
                    fold_compare(current, value)
                } else {
                    current.compare(value)
                };
                ord.map(|o| op.holds(o))
            }
            Predicate::In {
                field,
                values,
                insensitive,
            } => {
                let current = row.get(field);
                if values.is_empty() {
                    return Some(false);
                }
                if current.is_null() {
                    return None;
                }
                let mut unknown = false;
                for candidate in values {
                    let ord = if *insensitive {
                        fold_compare(current, candidate)
                    } else {
                        current.compare(candidate)
                    };
                    match ord {
                        Some(Ordering::Equal) => return Some(true),
                        Some(_) => {}
                        None => unknown = true,
                    }
                }
                if unknown { None } else { Some(false) }
            }
            Predicate::IsNull(field) => Some(row.get(field).is_null()),
            Predicate::Text {
                field,
                op,
                pattern,
                insensitive,
            } => {
                let current = row.get(field).as_str()?;
                Some(if *insensitive {
                    op.holds(&current.to_lowercase(), &pattern.to_lowercase())
                } else {
                    op.holds(current, pattern)
                })
            }
            Predicate::Json { field, path, op } => {
                let Value::Json(doc) = row.get(field) else {
                    return None;
                };
                let target = json::lookup_path(doc, path)?;
                Some(eval_json(target, op))
            }
            Predicate::JsonNull {
                field,
                path,
                marker,
            } => Some(eval_json_null(row.get(field), path, *marker)),
            // Unresolved relation filters are lowered by the engine before
            // evaluation; seeing one here means the row cannot be decided.
            Predicate::SubQuery(_) => None,
        }
    }

    /// True when the tree still contains an unresolved relation filter.
    pub fn has_subquery(&self) -> bool {
        match self {
            Predicate::SubQuery(_) => true,
            Predicate::And(parts) | Predicate::Or(parts) => parts.iter().any(Self::has_subquery),
            Predicate::Not(inner) => inner.has_subquery(),
            _ => false,
        }
    }
}

fn fold_compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a.as_str(), b.as_str()) {
        (Some(x), Some(y)) => Some(x.to_lowercase().cmp(&y.to_lowercase())),
        _ => a.compare(b),
    }
}

fn eval_json(target: &serde_json::Value, op: &JsonOp) -> bool {
    match op {
        JsonOp::Equals(v) => target == v,
        JsonOp::String {
            op,
            pattern,
            insensitive,
        } => match target.as_str() {
            Some(s) if *insensitive => op.holds(&s.to_lowercase(), &pattern.to_lowercase()),
            Some(s) => op.holds(s, pattern),
            None => false,
        },
        JsonOp::ArrayContains(v) => json::array_contains(target, v),
        JsonOp::ArrayStartsWith(v) => json::array_starts_with(target, v),
        JsonOp::ArrayEndsWith(v) => json::array_ends_with(target, v),
        JsonOp::Compare(cmp, v) => Value::Json(target.clone())
            .compare(&Value::Json(v.clone()))
            .is_some_and(|o| cmp.holds(o)),
    }
}

fn eval_json_null(column: &Value, path: &[String], marker: NullMarker) -> bool {
    let (db_null, json_null) = match column {
        Value::Null => (true, false),
        Value::Json(doc) if path.is_empty() => (false, doc.is_null()),
        Value::Json(doc) => match json::lookup_path(doc, path) {
            // A missing path reads as SQL NULL.
            None => (true, false),
            Some(v) => (false, v.is_null()),
        },
        _ => (false, false),
    };
    match marker {
        NullMarker::DbNull => db_null,
        NullMarker::JsonNull => json_null,
        NullMarker::AnyNull => db_null || json_null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row() -> Row {
        Row::new()
            .with("name", "Alice")
            .with("age", Value::Null)
            .with("score", 7)
    }

    #[test]
    fn comparisons_with_null_are_unknown() {
        let p = Predicate::Compare {
            field: "age".into(),
            op: CompareOp::Gt,
            value: Value::Int(3),
            insensitive: false,
        };
        assert_eq!(p.eval(&row()), None);
        assert_eq!(p.clone().negate().eval(&row()), None);
        assert!(!p.matches(&row()));
    }

    #[test]
    fn kleene_connectives() {
        let unknown = Predicate::eq("age", 1);
        let yes = Predicate::eq("score", 7);
        let no = Predicate::eq("score", 8);
        let r = row();
        assert_eq!(Predicate::And(vec![unknown.clone(), no.clone()]).eval(&r), Some(false));
        assert_eq!(Predicate::And(vec![unknown.clone(), yes.clone()]).eval(&r), None);
        assert_eq!(Predicate::Or(vec![unknown.clone(), yes]).eval(&r), Some(true));
        assert_eq!(Predicate::Or(vec![unknown, no]).eval(&r), None);
    }

    #[test]
    fn empty_connectives_fold_to_constants() {
        assert_eq!(Predicate::all(vec![]), Predicate::Const(true));
        assert_eq!(Predicate::any(vec![]), Predicate::Const(false));
        assert_eq!(
            Predicate::all(vec![Predicate::eq("a", 1), Predicate::Const(false)]),
            Predicate::Const(false)
        );
    }

    #[test]
    fn insensitive_text_match() {
        let p = Predicate::Text {
            field: "name".into(),
            op: TextOp::StartsWith,
            pattern: "al".into(),
            insensitive: true,
        };
        assert!(p.matches(&row()));
    }

    #[test]
    fn in_list_with_empty_values_is_false() {
        assert_eq!(Predicate::in_list("age", vec![]).eval(&row()), Some(false));
        assert_eq!(Predicate::in_list("age", vec![Value::Int(1)]).eval(&row()), None);
    }

    #[test]
    fn json_null_markers() {
        let db = Row::new().with("meta", Value::Null);
        let js = Row::new().with("meta", Value::Json(serde_json::Value::Null));
        let obj = Row::new().with("meta", json!({"k": null}));
        let marker = |m| Predicate::JsonNull {
            field: "meta".into(),
            path: vec![],
            marker: m,
        };
        assert!(marker(NullMarker::DbNull).matches(&db));
        assert!(!marker(NullMarker::DbNull).matches(&js));
        assert!(marker(NullMarker::JsonNull).matches(&js));
        assert!(!marker(NullMarker::JsonNull).matches(&db));
        assert!(marker(NullMarker::AnyNull).matches(&db));
        assert!(marker(NullMarker::AnyNull).matches(&js));
        assert!(!marker(NullMarker::AnyNull).matches(&obj));

        let at_path = Predicate::JsonNull {
            field: "meta".into(),
            path: vec!["k".into()],
            marker: NullMarker::JsonNull,
        };
        assert!(at_path.matches(&obj));
    }

    #[test]
    fn json_path_ops() {
        let r = Row::new().with("meta", json!({"tags": ["a", "b"], "cpu": 80}));
        let contains = Predicate::Json {
            field: "meta".into(),
            path: vec!["tags".into()],
            op: JsonOp::ArrayContains(json!(["b"])),
        };
        let gt = Predicate::Json {
            field: "meta".into(),
            path: vec!["cpu".into()],
            op: JsonOp::Compare(CompareOp::Gt, json!(50)),
        };
        let missing = Predicate::Json {
            field: "meta".into(),
            path: vec!["nope".into()],
            op: JsonOp::Equals(json!(1)),
        };
        assert!(contains.matches(&r));
        assert!(gt.matches(&r));
        assert_eq!(missing.eval(&r), None);
    }
}

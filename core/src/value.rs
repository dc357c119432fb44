//! Runtime values flowing between the engine and the executor.

use core::cmp::Ordering;
use core::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use smallvec::SmallVec;

/// A single column value.
///
/// `Null` is the SQL NULL ("no column value"). A JSON column holding the JSON
/// literal `null` is `Json(serde_json::Value::Null)`; the two are never merged.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Json(serde_json::Value),
    /// A tag from a closed enum domain.
    Enum(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short type name used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "Boolean",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::DateTime(_) => "DateTime",
            Value::Json(_) => "Json",
            Value::Enum(_) => "Enum",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// SQL-style comparison. `None` when either side is NULL or the types
    /// have no common ordering.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a) | Value::Enum(a), Value::String(b) | Value::Enum(b)) => {
                Some(a.cmp(b))
            }
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Json(a), Value::Json(b)) => json_compare(a, b),
            _ => None,
        }
    }

    /// Equality in the SQL sense: NULL is never equal to anything.
    pub fn sql_eq(&self, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Json(a), Value::Json(b)) => Some(a == b),
            _ => self.compare(other).map(|o| o == Ordering::Equal),
        }
    }

    /// Total order used for sorting; NULL sorts before every other value.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            _ => self
                .compare(other)
                .unwrap_or_else(|| self.rank().cmp(&other.rank())),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) | Value::Enum(_) => 3,
            Value::DateTime(_) => 4,
            Value::Json(_) => 5,
        }
    }

    /// Converts into the JSON shape returned in payloads.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) | Value::Enum(s) => serde_json::Value::String(s.clone()),
            Value::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
            Value::Json(v) => v.clone(),
        }
    }
}

fn json_compare(a: &serde_json::Value, b: &serde_json::Value) -> Option<Ordering> {
    use serde_json::Value as J;
    match (a, b) {
        (J::Number(x), J::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (J::String(x), J::String(y)) => Some(x.cmp(y)),
        (J::Bool(x), J::Bool(y)) => Some(x.cmp(y)),
        _ if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

// =============================================================================
// Conversions
// =============================================================================

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v $(as $cast)?)
                }
            }
        )*
    };
}

impl_from_value! {
    bool => Bool,
    i64 => Int,
    i32 => Int as i64,
    u32 => Int as i64,
    f64 => Float,
    f32 => Float as f64,
    String => String,
    DateTime<Utc> => DateTime,
    serde_json::Value => Json,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<uuid::Uuid> for Value {
    fn from(v: uuid::Uuid) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// =============================================================================
// Hashable key
// =============================================================================

/// A tuple of values usable as a hash key (grouping, distinct, relation keys).
///
/// Floats hash by bit pattern after normalising `-0.0`; integers hash as
/// their float value so `1` and `1.0` land in one group.
#[derive(Debug, Clone)]
pub struct KeyTuple(pub SmallVec<[Value; 2]>);

impl PartialEq for KeyTuple {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(a, b)| a.sort_cmp(b) == Ordering::Equal && a.rank() == b.rank())
    }
}

impl Eq for KeyTuple {}

impl Hash for KeyTuple {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for v in &self.0 {
            v.rank().hash(state);
            match v {
                Value::Null => {}
                Value::Bool(b) => b.hash(state),
                Value::Int(i) => (*i as f64).to_bits().hash(state),
                Value::Float(f) => {
                    let f = if *f == 0.0 { 0.0 } else { *f };
                    f.to_bits().hash(state)
                }
                Value::String(s) | Value::Enum(s) => s.hash(state),
                Value::DateTime(dt) => dt.hash(state),
                Value::Json(_) => {}
            }
        }
    }
}

// =============================================================================
// Row
// =============================================================================

/// A raw row as exchanged with the executor, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: HashMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `field`, or `Value::Null` when the column is absent.
    pub fn get(&self, field: &str) -> &Value {
        const NULL: &Value = &Value::Null;
        self.values.get(field).unwrap_or(NULL)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.values.remove(field)
    }

    /// Values of `fields`, in order, as a hashable key.
    pub fn key(&self, fields: &[&str]) -> KeyTuple {
        KeyTuple(fields.iter().map(|f| self.get(f).clone()).collect())
    }

    /// Keeps only the listed fields.
    pub fn retain_fields(&mut self, fields: &[String]) {
        self.values.retain(|k, _| fields.iter().any(|f| f == k));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_never_compares() {
        assert_eq!(Value::Null.compare(&Value::Int(1)), None);
        assert_eq!(Value::Null.sql_eq(&Value::Null), None);
    }

    #[test]
    fn numbers_compare_across_int_and_float() {
        assert_eq!(
            Value::Int(2).compare(&Value::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Float(3.0).sql_eq(&Value::Int(3)), Some(true));
    }

    #[test]
    fn sort_puts_null_first() {
        let mut values = vec![Value::Int(3), Value::Null, Value::Int(1)];
        values.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(values, vec![Value::Null, Value::Int(1), Value::Int(3)]);
    }

    #[test]
    fn json_null_and_sql_null_stay_distinct() {
        let db_null = Value::Null;
        let json_null = Value::Json(serde_json::Value::Null);
        assert_ne!(db_null, json_null);
        assert_eq!(db_null.to_json(), json_null.to_json());
    }

    #[test]
    fn key_tuple_groups_equal_values() {
        use hashbrown::HashSet;
        let mut set = HashSet::new();
        set.insert(KeyTuple(smallvec::smallvec![Value::from("a"), Value::Null]));
        set.insert(KeyTuple(smallvec::smallvec![Value::from("a"), Value::Null]));
        set.insert(KeyTuple(smallvec::smallvec![Value::Enum("a".into()), Value::Int(1)]));
        assert_eq!(set.len(), 2);
    }
}

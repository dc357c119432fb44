//! JSON column filters and the three-way null markers.

use crate::filter::QueryMode;

/// Null markers for nullable JSON columns.
///
/// `DbNull` is the column itself being SQL NULL, `JsonNull` is the column
/// holding the JSON literal `null`, `AnyNull` (filters only) matches either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullMarker {
    DbNull,
    JsonNull,
    AnyNull,
}

/// Right-hand side of a JSON `equals` / `not`.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonTarget {
    Value(serde_json::Value),
    Null(NullMarker),
}

impl From<serde_json::Value> for JsonTarget {
    fn from(v: serde_json::Value) -> Self {
        JsonTarget::Value(v)
    }
}

impl From<NullMarker> for JsonTarget {
    fn from(m: NullMarker) -> Self {
        JsonTarget::Null(m)
    }
}

/// Filter dialect for `Json` fields, optionally scoped to a path inside the document.
#[derive(Debug, Clone, Default)]
pub struct JsonFilter {
    pub path: Vec<String>,
    pub equals: Option<JsonTarget>,
    pub not: Option<JsonTarget>,
    pub string_contains: Option<String>,
    pub string_starts_with: Option<String>,
    pub string_ends_with: Option<String>,
    pub array_contains: Option<serde_json::Value>,
    pub array_starts_with: Option<serde_json::Value>,
    pub array_ends_with: Option<serde_json::Value>,
    pub lt: Option<serde_json::Value>,
    pub lte: Option<serde_json::Value>,
    pub gt: Option<serde_json::Value>,
    pub gte: Option<serde_json::Value>,
    pub mode: QueryMode,
}

impl JsonFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path<I, S>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }

    pub fn equals(mut self, target: impl Into<JsonTarget>) -> Self {
        self.equals = Some(target.into());
        self
    }

    pub fn not(mut self, target: impl Into<JsonTarget>) -> Self {
        self.not = Some(target.into());
        self
    }

    pub fn string_contains(mut self, s: impl Into<String>) -> Self {
        self.string_contains = Some(s.into());
        self
    }

    pub fn string_starts_with(mut self, s: impl Into<String>) -> Self {
        self.string_starts_with = Some(s.into());
        self
    }

    pub fn string_ends_with(mut self, s: impl Into<String>) -> Self {
        self.string_ends_with = Some(s.into());
        self
    }

    pub fn array_contains(mut self, v: serde_json::Value) -> Self {
        self.array_contains = Some(v);
        self
    }

    pub fn array_starts_with(mut self, v: serde_json::Value) -> Self {
        self.array_starts_with = Some(v);
        self
    }

    pub fn array_ends_with(mut self, v: serde_json::Value) -> Self {
        self.array_ends_with = Some(v);
        self
    }

    pub fn lt(mut self, v: serde_json::Value) -> Self {
        self.lt = Some(v);
        self
    }

    pub fn lte(mut self, v: serde_json::Value) -> Self {
        self.lte = Some(v);
        self
    }

    pub fn gt(mut self, v: serde_json::Value) -> Self {
        self.gt = Some(v);
        self
    }

    pub fn gte(mut self, v: serde_json::Value) -> Self {
        self.gte = Some(v);
        self
    }

    pub fn insensitive(mut self) -> Self {
        self.mode = QueryMode::Insensitive;
        self
    }
}

/// Walks `path` (object keys, or array indices given as digits) inside `doc`.
pub fn lookup_path<'a>(doc: &'a serde_json::Value, path: &[String]) -> Option<&'a serde_json::Value> {
    path.iter().try_fold(doc, |cur, seg| match cur {
        serde_json::Value::Object(map) => map.get(seg),
        serde_json::Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// `array_contains`: every element of an array needle (or the scalar needle
/// itself) occurs in `haystack`.
pub fn array_contains(haystack: &serde_json::Value, needle: &serde_json::Value) -> bool {
    let Some(items) = haystack.as_array() else {
        return false;
    };
    match needle {
        serde_json::Value::Array(wanted) => wanted.iter().all(|w| items.contains(w)),
        other => items.contains(other),
    }
}

pub fn array_starts_with(haystack: &serde_json::Value, needle: &serde_json::Value) -> bool {
    let Some(items) = haystack.as_array() else {
        return false;
    };
    match needle {
        serde_json::Value::Array(prefix) => items.starts_with(prefix),
        other => items.first() == Some(other),
    }
}

pub fn array_ends_with(haystack: &serde_json::Value, needle: &serde_json::Value) -> bool {
    let Some(items) = haystack.as_array() else {
        return false;
    };
    match needle {
        serde_json::Value::Array(suffix) => items.ends_with(suffix),
        other => items.last() == Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn path_lookup_walks_objects_and_arrays() {
        let doc = json!({"a": {"b": [10, {"c": "x"}]}});
        let path: Vec<String> = ["a", "b", "1", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(lookup_path(&doc, &path), Some(&json!("x")));
        assert_eq!(lookup_path(&doc, &["missing".to_string()]), None);
    }

    #[test]
    fn array_predicates() {
        let doc = json!(["a", "b", "c"]);
        assert!(array_contains(&doc, &json!(["c", "a"])));
        assert!(array_contains(&doc, &json!("b")));
        assert!(!array_contains(&doc, &json!(["z"])));
        assert!(array_starts_with(&doc, &json!("a")));
        assert!(array_ends_with(&doc, &json!(["b", "c"])));
        assert!(!array_contains(&json!({"a": 1}), &json!("a")));
    }
}

//! Raw rows to payload records.

use quarry_core::{Projection, Row, Value};
use serde_json::{Map, Value as Json};

use crate::operation::Record;

/// The projected scalar fields of `row`.
pub(super) fn scalars(projection: &Projection, row: &Row) -> Record {
    let mut record = Record::new();
    for field in &projection.scalars {
        record.insert(*field, row.get(field).to_json());
    }
    record
}

/// Builds nested objects from dotted keys: `("_avg.health", v)` becomes
/// `{ "_avg": { "health": v } }`. Undotted keys are stored as is.
pub(super) fn nest<'k>(entries: impl IntoIterator<Item = (&'k str, &'k Value)>) -> Record {
    let mut record = Record::new();
    let mut groups: Vec<(&str, Map<String, Json>)> = Vec::new();
    for (key, value) in entries {
        match key.split_once('.') {
            Some((outer, inner)) => {
                let pos = match groups.iter().position(|(g, _)| *g == outer) {
                    Some(pos) => pos,
                    None => {
                        groups.push((outer, Map::new()));
                        groups.len() - 1
                    }
                };
                groups[pos].1.insert(inner.to_owned(), value.to_json());
            }
            None => record.insert(key, value.to_json()),
        }
    }
    for (outer, map) in groups {
        record.insert(outer, Json::Object(map));
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_keys_nest_one_level() {
        let avg = Value::Float(20.0);
        let count = Value::Int(3);
        let status = Value::Enum("HEALTHY".into());
        let record = nest([("status", &status), ("_avg.health", &avg), ("_count._all", &count)]);
        assert_eq!(
            record.into_json(),
            serde_json::json!({ "status": "HEALTHY", "_avg": { "health": 20.0 }, "_count": { "_all": 3 } })
        );
    }
}

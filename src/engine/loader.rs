//! Relation loading.
//!
//! Each requested relation costs one statement for all parent rows at once:
//! the parents' join keys become an `IN` filter on the related entity, and the
//! related rows are grouped back per parent. Per-parent windows (cursor,
//! skip, take, distinct) are applied after grouping. `_count` works the same
//! way but only fetches the join columns.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use hashbrown::{HashMap, HashSet};
use quarry_core::{
    Connection, CountLoad, EntityDef, KeyTuple, Predicate, Projection, QuarryError,
    RelCardinality, RelationLoad, Result, Row, SelectStatement, resolve_unique,
};
use serde_json::{Map, Value as Json};

use super::window::{Window, total_order};
use super::{Engine, mapper};
use crate::operation::Record;

impl<'a, C: Connection> Engine<'a, C> {
    /// Maps rows to records under `projection`, loading its relations and
    /// counts.
    pub(super) fn shape<'p>(
        self,
        projection: &'p Projection,
        rows: Vec<Row>,
    ) -> BoxFuture<'p, Result<Vec<Record>>>
    where
        'a: 'p,
    {
        async move {
            let mut records: Vec<Record> =
                rows.iter().map(|r| mapper::scalars(projection, r)).collect();
            if rows.is_empty() {
                return Ok(records);
            }

            for load in &projection.relations {
                let related = self.load_relation(projection.entity, load, &rows).await?;
                for (record, children) in records.iter_mut().zip(related) {
                    let value = if load.relation.is_many() {
                        Json::Array(children.into_iter().map(Record::into_json).collect())
                    } else {
                        children
                            .into_iter()
                            .next()
                            .map_or(Json::Null, Record::into_json)
                    };
                    record.insert(load.relation.name, value);
                }
            }

            if !projection.counts.is_empty() {
                let mut counts = vec![Map::new(); rows.len()];
                for count in &projection.counts {
                    let tallies = self.count_relation(count, &rows).await?;
                    for (map, n) in counts.iter_mut().zip(tallies) {
                        map.insert(count.relation.name.to_owned(), Json::from(n));
                    }
                }
                for (record, map) in records.iter_mut().zip(counts) {
                    record.insert("_count", Json::Object(map));
                }
            }
            Ok(records)
        }
        .boxed()
    }

    /// Related records for each parent, in parent order. To-one relations
    /// yield at most one record per parent.
    pub(super) async fn load_relation(
        self,
        entity: &'static EntityDef,
        load: &RelationLoad,
        parents: &[Row],
    ) -> Result<Vec<Vec<Record>>> {
        let rel = load.relation;
        let target = self.schema().entity(rel.target)?;
        let locals: Vec<&str> = rel.local_fields().collect();
        let remotes: Vec<&str> = rel.remote_fields().collect();
        let window = Window::from(&load.args);
        window.validate(target)?;
        let cursor = window
            .cursor
            .map(|c| resolve_unique(self.schema(), target, c))
            .transpose()?;

        let keys = parent_keys(parents, &locals);
        let mut groups: HashMap<KeyTuple, Vec<Row>> = HashMap::new();
        let order = total_order(target, window.order_by);
        if !keys.is_empty() {
            let filter = Predicate::all(vec![
                key_filter(&remotes, keys),
                self.filter(target, load.args.r#where.as_ref()).await?,
            ]);
            let mut select = SelectStatement::new(target.name, filter);
            select.order_by = order.clone();
            for row in self.run(select).await?.rows {
                groups.entry(row.key(&remotes)).or_default().push(row);
            }
        }
        let cursor = match cursor {
            Some(lookup) => Some(self.resolve(lookup.predicate).await?),
            None => None,
        };

        let mut owners = Vec::new();
        let mut flat = Vec::new();
        for (i, parent) in parents.iter().enumerate() {
            let children = groups.get(&parent.key(&locals)).cloned().unwrap_or_default();
            let children = if rel.is_many() {
                window.apply(children, &order, cursor.as_ref())
            } else {
                children.into_iter().take(1).collect()
            };
            if children.is_empty() && rel.cardinality == RelCardinality::One {
                return Err(QuarryError::InconsistentResult(format!(
                    "The required connected record `{}` of a `{}` record was not found",
                    rel.name, entity.name
                )));
            }
            owners.extend(std::iter::repeat_n(i, children.len()));
            flat.extend(children);
        }

        let records = self.shape(&load.projection, flat).await?;
        let mut per_parent = vec![Vec::new(); parents.len()];
        for (owner, record) in owners.into_iter().zip(records) {
            per_parent[owner].push(record);
        }
        Ok(per_parent)
    }

    async fn count_relation(self, count: &CountLoad, parents: &[Row]) -> Result<Vec<u64>> {
        let rel = count.relation;
        let target = self.schema().entity(rel.target)?;
        let locals: Vec<&str> = rel.local_fields().collect();
        let remotes: Vec<&str> = rel.remote_fields().collect();
        let extra = self.filter(target, count.filter.as_ref()).await?;

        let keys = parent_keys(parents, &locals);
        let mut tally: HashMap<KeyTuple, u64> = HashMap::new();
        if !keys.is_empty() {
            let mut select =
                SelectStatement::new(target.name, Predicate::all(vec![key_filter(&remotes, keys), extra]));
            select.columns = Some(remotes.iter().map(|r| (*r).to_owned()).collect());
            for row in self.run(select).await?.rows {
                *tally.entry(row.key(&remotes)).or_default() += 1;
            }
        }
        Ok(parents
            .iter()
            .map(|p| tally.get(&p.key(&locals)).copied().unwrap_or(0))
            .collect())
    }
}

/// Distinct, fully non-null join keys of `rows`.
fn parent_keys(rows: &[Row], fields: &[&str]) -> Vec<KeyTuple> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|r| r.key(fields))
        .filter(|k| !k.0.iter().any(|v| v.is_null()))
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

fn key_filter(fields: &[&str], keys: Vec<KeyTuple>) -> Predicate {
    match fields {
        [single] => Predicate::in_list(*single, keys.into_iter().filter_map(|k| k.0.into_iter().next()).collect()),
        _ => Predicate::any(
            keys.into_iter()
                .map(|k| {
                    Predicate::all(
                        fields
                            .iter()
                            .zip(k.0)
                            .map(|(f, v)| Predicate::eq(*f, v))
                            .collect(),
                    )
                })
                .collect(),
        ),
    }
}

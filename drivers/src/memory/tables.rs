//! Statement execution against an in-memory table set.

use hashbrown::{HashMap, HashSet};
use quarry_core::schema::{EntityDef, ReferentialAction, Schema};
use quarry_core::statement::{
    DeleteStatement, InsertStatement, SelectStatement, UpdateStatement, compare_rows,
};
use quarry_core::{Constraint, KeyTuple, Predicate, QuarryError, QueryResult, Result, Row, Statement, Value};

/// All rows of every entity, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    rows: HashMap<&'static str, Vec<Row>>,
}

impl Tables {
    pub fn rows(&self, entity: &str) -> &[Row] {
        self.rows.get(entity).map_or(&[], Vec::as_slice)
    }

    fn rows_mut(&mut self, entity: &'static str) -> &mut Vec<Row> {
        self.rows.entry(entity).or_default()
    }

    /// Runs one statement. The caller applies it to a scratch copy so a
    /// failing statement leaves no partial effects.
    pub fn execute(&mut self, schema: &Schema, statement: Statement) -> Result<QueryResult> {
        match statement {
            Statement::Select(s) => self.select(s),
            Statement::Insert(s) => self.insert(schema, s),
            Statement::Update(s) => self.update(schema, s),
            Statement::Delete(s) => self.delete(schema, s),
        }
    }

    fn select(&self, s: SelectStatement) -> Result<QueryResult> {
        check_resolved(&s.filter)?;
        let mut rows: Vec<Row> = self
            .rows(s.entity)
            .iter()
            .filter(|r| s.filter.matches(r))
            .cloned()
            .collect();
        if !s.order_by.is_empty() {
            rows.sort_by(|a, b| compare_rows(a, b, &s.order_by));
        }
        let skip = s.skip.map_or(0, |n| n as usize);
        let take = s.take.map_or(usize::MAX, |n| n as usize);
        let mut rows: Vec<Row> = rows.into_iter().skip(skip).take(take).collect();
        if let Some(columns) = &s.columns {
            for row in &mut rows {
                row.retain_fields(columns);
            }
        }
        Ok(QueryResult {
            affected: rows.len() as u64,
            rows,
        })
    }

    fn insert(&mut self, schema: &Schema, s: InsertStatement) -> Result<QueryResult> {
        let entity = schema.entity(s.entity)?;
        let keys: Vec<&[&'static str]> = entity.lookup_keys().collect();
        let mut seen: Vec<HashSet<KeyTuple>> = keys
            .iter()
            .map(|k| {
                self.rows(entity.name)
                    .iter()
                    .filter_map(|r| non_null_key(r, k))
                    .collect()
            })
            .collect();

        let mut inserted = Vec::with_capacity(s.rows.len());
        'rows: for row in s.rows {
            for (key, set) in keys.iter().zip(&seen) {
                if let Some(k) = non_null_key(&row, key) {
                    if set.contains(&k) {
                        if s.skip_duplicates {
                            continue 'rows;
                        }
                        return Err(unique_violation(entity, key));
                    }
                }
            }
            self.check_foreign_keys(schema, entity, &row, None)?;
            for (key, set) in keys.iter().zip(&mut seen) {
                if let Some(k) = non_null_key(&row, key) {
                    set.insert(k);
                }
            }
            self.rows_mut(entity.name).push(row.clone());
            inserted.push(row);
        }

        Ok(QueryResult {
            affected: inserted.len() as u64,
            rows: inserted,
        })
    }

    fn update(&mut self, schema: &Schema, s: UpdateStatement) -> Result<QueryResult> {
        check_resolved(&s.filter)?;
        let entity = schema.entity(s.entity)?;
        let mut changed = Vec::new();
        let mut updated = Vec::new();
        for (i, row) in self.rows(entity.name).iter().enumerate() {
            if !s.filter.matches(row) {
                continue;
            }
            let mut next = row.clone();
            for (column, assignment) in &s.assignments {
                let value = assignment.apply(row.get(column))?;
                next.set(column.clone(), value);
            }
            changed.push(i);
            updated.push(next);
        }

        let touched: Vec<&str> = s.assignments.iter().map(|(c, _)| c.as_str()).collect();
        for row in &updated {
            self.check_foreign_keys(schema, entity, row, Some(&touched))?;
        }
        let table = self.rows_mut(entity.name);
        for (i, row) in changed.iter().zip(&updated) {
            table[*i] = row.clone();
        }
        for key in entity.lookup_keys() {
            let mut set = HashSet::new();
            for row in self.rows(entity.name) {
                if let Some(k) = non_null_key(row, key) {
                    if !set.insert(k) {
                        return Err(unique_violation(entity, key));
                    }
                }
            }
        }

        Ok(QueryResult {
            affected: updated.len() as u64,
            rows: updated,
        })
    }

    fn delete(&mut self, schema: &Schema, s: DeleteStatement) -> Result<QueryResult> {
        check_resolved(&s.filter)?;
        let entity = schema.entity(s.entity)?;
        let gone = self.remove_where(entity.name, |r| s.filter.matches(r));
        self.apply_referential_actions(schema, entity, &gone)?;
        Ok(QueryResult {
            affected: gone.len() as u64,
            rows: gone,
        })
    }

    fn remove_where(&mut self, entity: &'static str, mut pred: impl FnMut(&Row) -> bool) -> Vec<Row> {
        let table = self.rows_mut(entity);
        let (gone, kept): (Vec<Row>, Vec<Row>) = table.drain(..).partition(|r| pred(r));
        *table = kept;
        gone
    }

    /// Applies `on_delete` of every relation pointing at the removed rows.
    fn apply_referential_actions(
        &mut self,
        schema: &Schema,
        entity: &EntityDef,
        gone: &[Row],
    ) -> Result<()> {
        if gone.is_empty() {
            return Ok(());
        }
        let referencing: Vec<_> = schema.referencing(entity.name).collect();
        for (child, rel) in referencing {
            let remote: Vec<&str> = rel.remote_fields().collect();
            let local: Vec<&str> = rel.local_fields().collect();
            let keys: HashSet<KeyTuple> = gone.iter().filter_map(|r| non_null_key(r, &remote)).collect();
            let points_at_gone = |r: &Row| non_null_key(r, &local).is_some_and(|k| keys.contains(&k));

            match rel.on_delete {
                ReferentialAction::Restrict => {
                    if self.rows(child.name).iter().any(points_at_gone) {
                        return Err(QuarryError::ConstraintViolation {
                            entity: child.name.to_owned(),
                            constraint: Constraint::ForeignKey(local.join(", ")),
                        });
                    }
                }
                ReferentialAction::SetNull => {
                    for row in self.rows_mut(child.name) {
                        if points_at_gone(row) {
                            for f in &local {
                                row.set(*f, Value::Null);
                            }
                        }
                    }
                }
                ReferentialAction::Cascade => {
                    let removed = self.remove_where(child.name, points_at_gone);
                    self.apply_referential_actions(schema, child, &removed)?;
                }
            }
        }
        Ok(())
    }

    /// Every owning relation with a fully non-null foreign key must point at
    /// an existing row. With `touched`, only relations whose columns were
    /// assigned are checked.
    fn check_foreign_keys(
        &self,
        schema: &Schema,
        entity: &EntityDef,
        row: &Row,
        touched: Option<&[&str]>,
    ) -> Result<()> {
        for rel in entity.relations.iter().filter(|r| r.owns_fk) {
            let local: Vec<&str> = rel.local_fields().collect();
            if let Some(touched) = touched {
                if !local.iter().any(|l| touched.contains(l)) {
                    continue;
                }
            }
            let Some(key) = non_null_key(row, &local) else {
                continue;
            };
            let remote: Vec<&str> = rel.remote_fields().collect();
            let target = schema.entity(rel.target)?;
            let exists = self
                .rows(target.name)
                .iter()
                .any(|r| r.key(&remote) == key);
            if !exists {
                return Err(QuarryError::ConstraintViolation {
                    entity: entity.name.to_owned(),
                    constraint: Constraint::ForeignKey(local.join(", ")),
                });
            }
        }
        Ok(())
    }
}

fn non_null_key(row: &Row, fields: &[&str]) -> Option<KeyTuple> {
    let key = row.key(fields);
    if key.0.iter().any(Value::is_null) {
        None
    } else {
        Some(key)
    }
}

fn unique_violation(entity: &EntityDef, key: &[&str]) -> QuarryError {
    QuarryError::ConstraintViolation {
        entity: entity.name.to_owned(),
        constraint: Constraint::Unique(key.iter().map(|s| (*s).to_owned()).collect()),
    }
}

fn check_resolved(filter: &Predicate) -> Result<()> {
    if filter.has_subquery() {
        return Err(QuarryError::UnknownStore(
            "relation filters must be resolved before reaching the store".into(),
        ));
    }
    Ok(())
}

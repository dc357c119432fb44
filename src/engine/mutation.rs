//! Create, update, upsert and delete, nested relation writes included.
//!
//! `data` is checked in full before the first statement is issued. A nested
//! write on a relation whose foreign key lives on the written row (an owning
//! to-one) is resolved first, so the key can be stored with the row; writes
//! on the inverse side run after the row exists.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use quarry_core::{
    Assignment, Connection, CreateArgs, CreateManyArgs, Data, DefaultValue, DeleteArgs,
    DeleteManyArgs, DeleteStatement, Disconnect, EntityDef, FieldDef, FieldWrite, InsertStatement,
    NestedWrite, NullMarker, Predicate, QuarryError, RelCardinality, RelationDef, Result, Row,
    ScalarType, Schema, SelectStatement, UpdateArgs, UpdateManyArgs, UpdateStatement, UpsertArgs,
    Value, coerce,
};
use serde_json::Value as Json;

use super::Engine;
use super::window::total_order;
use crate::operation::{BatchPayload, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Create,
    Update,
}

/// Where an owning to-one slot points after its nested write ran.
enum Link {
    To(Row),
    Cleared,
}

impl<'a, C: Connection> Engine<'a, C> {
    pub(super) async fn create(self, entity: &'static EntityDef, args: &CreateArgs) -> Result<Record> {
        let projection = self.projection(entity, &args.selection)?;
        check_data(self.schema(), entity, &args.data, WriteMode::Create, &[])?;
        let row = self.create_row(entity, &args.data, Row::new()).await?;
        self.shape_one(&projection, row).await
    }

    pub(super) async fn create_many(
        self,
        entity: &'static EntityDef,
        args: &CreateManyArgs,
    ) -> Result<BatchPayload> {
        let rows = self.insert_many(entity, args).await?;
        Ok(BatchPayload {
            count: rows.len() as u64,
        })
    }

    pub(super) async fn create_many_and_return(
        self,
        entity: &'static EntityDef,
        args: &CreateManyArgs,
    ) -> Result<Vec<Record>> {
        let projection = self.projection(entity, &args.selection)?;
        let rows = self.insert_many(entity, args).await?;
        self.shape(&projection, rows).await
    }

    async fn insert_many(self, entity: &'static EntityDef, args: &CreateManyArgs) -> Result<Vec<Row>> {
        let schema = self.schema();
        let mut rows = Vec::with_capacity(args.data.len());
        for data in &args.data {
            reject_nested(entity, data, "createMany")?;
            check_data(schema, entity, data, WriteMode::Create, &[])?;
            rows.push(insert_row(schema, entity, data, Row::new())?);
        }
        if rows.is_empty() {
            return Ok(rows);
        }
        let insert = InsertStatement {
            entity: entity.name,
            rows,
            skip_duplicates: args.skip_duplicates,
        };
        Ok(self.run(insert).await?.rows)
    }

    pub(super) async fn update(self, entity: &'static EntityDef, args: &UpdateArgs) -> Result<Record> {
        let projection = self.projection(entity, &args.selection)?;
        check_data(self.schema(), entity, &args.data, WriteMode::Update, &[])?;
        let current = self
            .unique_row(entity, &args.r#where)
            .await?
            .ok_or_else(|| QuarryError::RecordNotFound("No record was found for an update.".into()))?;
        let row = self.update_row(entity, current, &args.data).await?;
        self.shape_one(&projection, row).await
    }

    pub(super) async fn update_many(
        self,
        entity: &'static EntityDef,
        args: &UpdateManyArgs,
    ) -> Result<BatchPayload> {
        let rows = self.update_where(entity, args).await?;
        Ok(BatchPayload {
            count: rows.len() as u64,
        })
    }

    pub(super) async fn update_many_and_return(
        self,
        entity: &'static EntityDef,
        args: &UpdateManyArgs,
    ) -> Result<Vec<Record>> {
        let projection = self.projection(entity, &args.selection)?;
        let rows = self.update_where(entity, args).await?;
        self.shape(&projection, rows).await
    }

    async fn update_where(self, entity: &'static EntityDef, args: &UpdateManyArgs) -> Result<Vec<Row>> {
        reject_nested(entity, &args.data, "updateMany")?;
        check_data(self.schema(), entity, &args.data, WriteMode::Update, &[])?;
        let assignments = self.assignments(entity, &args.data)?;
        let filter = self.filter(entity, args.r#where.as_ref()).await?;
        let filter = self.limited(entity, filter, args.limit).await?;
        if assignments.is_empty() {
            let mut select = SelectStatement::new(entity.name, filter);
            select.order_by = total_order(entity, &[]);
            return Ok(self.run(select).await?.rows);
        }
        let update = UpdateStatement {
            entity: entity.name,
            filter,
            assignments,
        };
        Ok(self.run(update).await?.rows)
    }

    pub(super) async fn upsert(self, entity: &'static EntityDef, args: &UpsertArgs) -> Result<Record> {
        let projection = self.projection(entity, &args.selection)?;
        let schema = self.schema();
        check_data(schema, entity, &args.create, WriteMode::Create, &[])?;
        check_data(schema, entity, &args.update, WriteMode::Update, &[])?;
        let row = match self.unique_row(entity, &args.r#where).await? {
            Some(current) => self.update_row(entity, current, &args.update).await?,
            None => self.create_row(entity, &args.create, Row::new()).await?,
        };
        self.shape_one(&projection, row).await
    }

    pub(super) async fn delete(self, entity: &'static EntityDef, args: &DeleteArgs) -> Result<Record> {
        let projection = self.projection(entity, &args.selection)?;
        let row = self
            .unique_row(entity, &args.r#where)
            .await?
            .ok_or_else(|| QuarryError::RecordNotFound("No record was found for a delete.".into()))?;
        let filter = Predicate::eq(entity.primary_key, row.get(entity.primary_key).clone());
        let record = self.shape_one(&projection, row).await?;
        let delete = DeleteStatement {
            entity: entity.name,
            filter,
        };
        self.run(delete).await?;
        Ok(record)
    }

    pub(super) async fn delete_many(
        self,
        entity: &'static EntityDef,
        args: &DeleteManyArgs,
    ) -> Result<BatchPayload> {
        let filter = self.filter(entity, args.r#where.as_ref()).await?;
        let filter = self.limited(entity, filter, args.limit).await?;
        let delete = DeleteStatement {
            entity: entity.name,
            filter,
        };
        Ok(BatchPayload {
            count: self.run(delete).await?.affected,
        })
    }

    async fn shape_one(self, projection: &quarry_core::Projection, row: Row) -> Result<Record> {
        self.shape(projection, vec![row]).await?.pop().ok_or_else(|| {
            QuarryError::InconsistentResult(format!("written `{}` row could not be read back", projection.entity.name))
        })
    }

    /// Restricts `filter` to the first `limit` matching rows in primary-key
    /// order.
    async fn limited(self, entity: &'static EntityDef, filter: Predicate, limit: Option<u64>) -> Result<Predicate> {
        let Some(limit) = limit else {
            return Ok(filter);
        };
        let mut select = SelectStatement::new(entity.name, filter);
        select.order_by = total_order(entity, &[]);
        select.take = Some(limit);
        select.columns = Some(vec![entity.primary_key.to_owned()]);
        let keys = self
            .run(select)
            .await?
            .rows
            .iter()
            .map(|r| r.get(entity.primary_key).clone())
            .collect();
        Ok(Predicate::in_list(entity.primary_key, keys))
    }

    /// Inserts one row of `entity` on top of `base` (foreign keys set by a
    /// parent), running every nested write in `data`.
    fn create_row<'d>(
        self,
        entity: &'static EntityDef,
        data: &'d Data,
        mut base: Row,
    ) -> BoxFuture<'d, Result<Row>>
    where
        'a: 'd,
    {
        async move {
            for (name, nested) in &data.relations {
                let rel = entity.relation_or_err(name)?;
                if rel.owns_fk {
                    if let Link::To(target) = self.link_owned(entity, rel, nested).await? {
                        for (local, remote) in rel.fk_columns {
                            base.set(*local, target.get(remote).clone());
                        }
                    }
                }
            }

            let row = insert_row(self.schema(), entity, data, base)?;
            let insert = InsertStatement {
                entity: entity.name,
                rows: vec![row],
                skip_duplicates: false,
            };
            let row = self.run(insert).await?.rows.pop().ok_or_else(|| {
                QuarryError::InconsistentResult(format!("insert into `{}` returned no row", entity.name))
            })?;

            for (name, nested) in &data.relations {
                let rel = entity.relation_or_err(name)?;
                if !rel.owns_fk {
                    self.write_inverse(entity, &row, rel, nested).await?;
                }
            }
            Ok(row)
        }
        .boxed()
    }

    async fn update_row(self, entity: &'static EntityDef, current: Row, data: &Data) -> Result<Row> {
        let mut assignments = self.assignments(entity, data)?;
        for (name, nested) in &data.relations {
            let rel = entity.relation_or_err(name)?;
            if !rel.owns_fk {
                continue;
            }
            let link = self.link_owned(entity, rel, nested).await?;
            for (local, remote) in rel.fk_columns {
                let value = match &link {
                    Link::To(target) => target.get(remote).clone(),
                    Link::Cleared => Value::Null,
                };
                assignments.push(((*local).to_owned(), Assignment::Set(value)));
            }
        }

        let row = if assignments.is_empty() {
            current
        } else {
            let update = UpdateStatement {
                entity: entity.name,
                filter: Predicate::eq(entity.primary_key, current.get(entity.primary_key).clone()),
                assignments,
            };
            self.run(update).await?.rows.pop().ok_or_else(|| {
                QuarryError::RecordNotFound("No record was found for an update.".into())
            })?
        };

        for (name, nested) in &data.relations {
            let rel = entity.relation_or_err(name)?;
            if !rel.owns_fk {
                self.write_inverse(entity, &row, rel, nested).await?;
            }
        }
        Ok(row)
    }

    /// Column assignments for the scalar part of `data`, with `@updatedAt`
    /// fields refreshed unless set explicitly.
    fn assignments(self, entity: &EntityDef, data: &Data) -> Result<Vec<(String, Assignment)>> {
        let mut out = Vec::with_capacity(data.fields.len() + 1);
        for (name, write) in &data.fields {
            let def = entity.field_or_err(name)?;
            out.push((name.clone(), field_write(self.schema(), entity, def, write, WriteMode::Update)?));
        }
        if !data.fields.is_empty() || !data.relations.is_empty() {
            for def in entity.fields.iter().filter(|f| f.updated_at) {
                if !data.fields.iter().any(|(n, _)| n == def.name) {
                    out.push((def.name.to_owned(), Assignment::Set(DefaultValue::Now.generate())));
                }
            }
        }
        Ok(out)
    }

    /// Runs the nested write of an owning to-one slot.
    async fn link_owned(
        self,
        entity: &'static EntityDef,
        rel: &'static RelationDef,
        nested: &NestedWrite,
    ) -> Result<Link> {
        let target = self.schema().entity(rel.target)?;
        if let Some(data) = nested.create.first() {
            return Ok(Link::To(self.create_row(target, data, Row::new()).await?));
        }
        if let Some(r#where) = nested.connect.first() {
            return match self.unique_row(target, r#where).await? {
                Some(row) => Ok(Link::To(row)),
                None => Err(connect_not_found(entity, rel)),
            };
        }
        if let Some((r#where, data)) = nested.connect_or_create.first() {
            return Ok(Link::To(match self.unique_row(target, r#where).await? {
                Some(row) => row,
                None => self.create_row(target, data, Row::new()).await?,
            }));
        }
        Ok(Link::Cleared)
    }

    /// Runs a nested write on the inverse side of a relation: the related rows
    /// hold the foreign key pointing at `parent`.
    async fn write_inverse(
        self,
        entity: &'static EntityDef,
        parent: &Row,
        rel: &'static RelationDef,
        nested: &NestedWrite,
    ) -> Result<()> {
        let target = self.schema().entity(rel.target)?;
        let mut link = Row::new();
        let mut owned_by_parent = Vec::with_capacity(rel.fk_columns.len());
        for (local, remote) in rel.fk_columns {
            link.set(*remote, parent.get(local).clone());
            owned_by_parent.push(Predicate::eq(*remote, parent.get(local).clone()));
        }
        let assign = |value: fn(&Row, &str) -> Value| -> Vec<(String, Assignment)> {
            rel.fk_columns
                .iter()
                .map(|(local, remote)| ((*remote).to_owned(), Assignment::Set(value(parent, local))))
                .collect()
        };

        for data in &nested.create {
            self.create_row(target, data, link.clone()).await?;
        }
        for r#where in &nested.connect {
            let filter = self.unique_filter(target, r#where).await?;
            let update = UpdateStatement {
                entity: target.name,
                filter,
                assignments: assign(|row, f| row.get(f).clone()),
            };
            if self.run(update).await?.affected == 0 {
                return Err(connect_not_found(entity, rel));
            }
        }
        for (r#where, data) in &nested.connect_or_create {
            let filter = self.unique_filter(target, r#where).await?;
            let update = UpdateStatement {
                entity: target.name,
                filter,
                assignments: assign(|row, f| row.get(f).clone()),
            };
            if self.run(update).await?.affected == 0 {
                self.create_row(target, data, link.clone()).await?;
            }
        }
        if let Some(disconnect) = &nested.disconnect {
            let filter = match disconnect {
                Disconnect::Relation => Predicate::all(owned_by_parent),
                Disconnect::Records(which) => {
                    let mut any = Vec::with_capacity(which.len());
                    for w in which {
                        any.push(self.unique_filter(target, w).await?);
                    }
                    Predicate::all(vec![Predicate::all(owned_by_parent), Predicate::any(any)])
                }
            };
            let update = UpdateStatement {
                entity: target.name,
                filter,
                assignments: assign(|_, _| Value::Null),
            };
            self.run(update).await?;
        }
        Ok(())
    }
}

fn connect_not_found(entity: &EntityDef, rel: &RelationDef) -> QuarryError {
    QuarryError::RecordNotFound(format!(
        "No `{}` record was found for a nested connect on relation `{}.{}`",
        rel.target, entity.name, rel.name
    ))
}

fn reject_nested(entity: &EntityDef, data: &Data, operation: &str) -> Result<()> {
    match data.relations.first() {
        Some((name, _)) => Err(QuarryError::validation(format!(
            "`{operation}` does not accept nested writes (`{}.{name}`)",
            entity.name
        ))),
        None => Ok(()),
    }
}

/// Applies the scalar writes of `data` and fills the remaining columns from
/// defaults, or NULL for optional fields.
fn insert_row(schema: &Schema, entity: &EntityDef, data: &Data, mut row: Row) -> Result<Row> {
    for (name, write) in &data.fields {
        let def = entity.field_or_err(name)?;
        match field_write(schema, entity, def, write, WriteMode::Create)? {
            Assignment::Set(value) => row.set(name.clone(), value),
            _ => return Err(arithmetic_on_create(entity, name)),
        }
    }
    for def in entity.fields {
        if row.contains(def.name) {
            continue;
        }
        let value = match (def.default, def.optional) {
            (Some(default), _) => default.generate(),
            (None, true) => Value::Null,
            (None, false) => return Err(missing(entity, def.name)),
        };
        row.set(def.name, value);
    }
    Ok(row)
}

fn field_write(
    schema: &Schema,
    entity: &EntityDef,
    def: &FieldDef,
    write: &FieldWrite,
    mode: WriteMode,
) -> Result<Assignment> {
    let arithmetic = |v: &Value, op: fn(Value) -> Assignment| -> Result<Assignment> {
        if mode == WriteMode::Create {
            return Err(arithmetic_on_create(entity, def.name));
        }
        if !def.ty.is_numeric() || v.is_null() {
            return Err(QuarryError::validation(format!(
                "Atomic number operations need a non-null number on a numeric field, `{}.{}` is {}",
                entity.name,
                def.name,
                def.ty.name()
            )));
        }
        Ok(op(coerce(schema, def.ty, v, def.name)?))
    };
    match write {
        FieldWrite::Set(v) => write_value(schema, entity, def, v).map(Assignment::Set),
        FieldWrite::Null(marker) => json_null(entity, def, *marker).map(Assignment::Set),
        FieldWrite::Increment(v) => arithmetic(v, Assignment::Increment),
        FieldWrite::Decrement(v) => arithmetic(v, Assignment::Decrement),
        FieldWrite::Multiply(v) => arithmetic(v, Assignment::Multiply),
        FieldWrite::Divide(v) => arithmetic(v, Assignment::Divide),
    }
}

/// A plain value for `def`. A bare null on a Json field is ambiguous and must
/// be written as `DbNull` or `JsonNull`.
fn write_value(schema: &Schema, entity: &EntityDef, def: &FieldDef, value: &Value) -> Result<Value> {
    if !value.is_null() {
        return coerce(schema, def.ty, value, def.name);
    }
    if def.ty == ScalarType::Json {
        return Err(QuarryError::validation(format!(
            "`{}.{}` is a Json field; write `DbNull` or `JsonNull` instead of null",
            entity.name, def.name
        )));
    }
    if !def.optional {
        return Err(QuarryError::validation(format!(
            "Argument `{}` of `{}` must not be null",
            def.name, entity.name
        )));
    }
    Ok(Value::Null)
}

fn json_null(entity: &EntityDef, def: &FieldDef, marker: NullMarker) -> Result<Value> {
    if def.ty != ScalarType::Json {
        return Err(QuarryError::validation(format!(
            "`{}.{}` is not a Json field; null markers only apply to Json",
            entity.name, def.name
        )));
    }
    match marker {
        NullMarker::DbNull if def.optional => Ok(Value::Null),
        NullMarker::DbNull => Err(QuarryError::validation(format!(
            "`{}.{}` is required and cannot be set to DbNull",
            entity.name, def.name
        ))),
        NullMarker::JsonNull => Ok(Value::Json(Json::Null)),
        NullMarker::AnyNull => Err(QuarryError::validation(
            "`AnyNull` can only be used in filters, not in writes",
        )),
    }
}

fn arithmetic_on_create(entity: &EntityDef, field: &str) -> QuarryError {
    QuarryError::validation(format!(
        "Atomic number operations are not available when creating `{}` (`{field}`)",
        entity.name
    ))
}

fn missing(entity: &EntityDef, field: &str) -> QuarryError {
    QuarryError::validation(format!(
        "Argument `{field}` is missing in create of `{}`",
        entity.name
    ))
}

/// Validates `data` without touching the store. `inherited` lists the
/// foreign-key columns a parent write fills in.
fn check_data(
    schema: &Schema,
    entity: &EntityDef,
    data: &Data,
    mode: WriteMode,
    inherited: &[&str],
) -> Result<()> {
    for (name, write) in &data.fields {
        let def = entity.field_or_err(name)?;
        if mode == WriteMode::Update && def.name == entity.primary_key {
            return Err(QuarryError::validation(format!(
                "The primary key `{}.{name}` cannot be changed",
                entity.name
            )));
        }
        if inherited.contains(&def.name) {
            return Err(QuarryError::validation(format!(
                "`{}.{name}` is set by the enclosing nested write",
                entity.name
            )));
        }
        field_write(schema, entity, def, write, mode)?;
    }

    let mut linked: Vec<&str> = inherited.to_vec();
    for (name, nested) in &data.relations {
        let rel = entity.relation_or_err(name)?;
        check_slot(schema, entity, rel, nested, mode)?;
        if rel.owns_fk {
            for local in rel.local_fields() {
                if data.fields.iter().any(|(f, _)| f == local) || inherited.contains(&local) {
                    return Err(QuarryError::validation(format!(
                        "`{}.{local}` and relation `{}` cannot both be written",
                        entity.name, rel.name
                    )));
                }
                if nested.disconnect.is_none() {
                    linked.push(local);
                }
            }
        }
    }

    if mode == WriteMode::Create {
        for def in entity.fields.iter().filter(|f| f.is_required_on_create()) {
            let given = data.fields.iter().any(|(f, _)| f == def.name);
            if !given && !linked.contains(&def.name) {
                return Err(missing(entity, def.name));
            }
        }
    }
    Ok(())
}

fn check_slot(
    schema: &Schema,
    entity: &EntityDef,
    rel: &RelationDef,
    nested: &NestedWrite,
    mode: WriteMode,
) -> Result<()> {
    let kinds = nested.kinds();
    let invalid = |msg: String| Err(QuarryError::validation(msg));
    match kinds.len() {
        0 => {
            return invalid(format!(
                "Nested write on `{}.{}` needs one of create, connect, connectOrCreate, disconnect",
                entity.name, rel.name
            ));
        }
        1 => {}
        _ => {
            return invalid(format!(
                "Nested write on `{}.{}` may use only one of {}",
                entity.name,
                rel.name,
                kinds.join(", ")
            ));
        }
    }
    if !rel.is_many() && nested.create.len() + nested.connect.len() + nested.connect_or_create.len() > 1 {
        return invalid(format!(
            "To-one relation `{}.{}` takes a single record",
            entity.name, rel.name
        ));
    }

    let target = schema.entity(rel.target)?;
    if let Some(disconnect) = &nested.disconnect {
        if mode == WriteMode::Create {
            return invalid(format!(
                "`disconnect` on `{}.{}` is only available in updates",
                entity.name, rel.name
            ));
        }
        let optional = if rel.owns_fk {
            rel.cardinality == RelCardinality::OptionalOne
        } else {
            rel.remote_fields().all(|f| target.field(f).is_some_and(|d| d.optional))
        };
        if !optional {
            return invalid(format!(
                "Relation `{}.{}` is required and cannot be disconnected",
                entity.name, rel.name
            ));
        }
        match (disconnect, rel.is_many()) {
            (Disconnect::Relation, false) | (Disconnect::Records(_), true) => {}
            _ => {
                return invalid(format!(
                    "`disconnect` on `{}.{}` must be {}",
                    entity.name,
                    rel.name,
                    if rel.is_many() { "a list of unique filters" } else { "`true`" }
                ));
            }
        }
    }

    // Children of an inverse write get the parent's key.
    let inherited: Vec<&str> = if rel.owns_fk { Vec::new() } else { rel.remote_fields().collect() };
    for data in &nested.create {
        check_data(schema, target, data, WriteMode::Create, &inherited)?;
    }
    for (_, data) in &nested.connect_or_create {
        check_data(schema, target, data, WriteMode::Create, &inherited)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::UniqueKey;

    static CRATE: EntityDef = EntityDef {
        name: "Crate",
        fields: &[
            FieldDef::new("id", ScalarType::String).default(DefaultValue::Uuid),
            FieldDef::new("label", ScalarType::String),
            FieldDef::new("weight", ScalarType::Float).default(DefaultValue::Float(1.0)),
            FieldDef::new("notes", ScalarType::Json).optional(),
            FieldDef::new("updatedAt", ScalarType::DateTime).updated_at(),
        ],
        relations: &[RelationDef::to_many("items", "Item", &[("id", "crateId")])],
        primary_key: "id",
        unique_keys: &[UniqueKey {
            name: "Crate_label_key",
            fields: &["label"],
        }],
    };

    static ITEM: EntityDef = EntityDef {
        name: "Item",
        fields: &[
            FieldDef::new("id", ScalarType::String).default(DefaultValue::Uuid),
            FieldDef::new("crateId", ScalarType::String),
        ],
        relations: &[RelationDef::to_one("crate", "Crate", &[("crateId", "id")])],
        primary_key: "id",
        unique_keys: &[],
    };

    fn schema() -> Schema {
        Schema::new(&[&CRATE, &ITEM], &[]).unwrap()
    }

    #[test]
    fn insert_row_fills_defaults() {
        let schema = schema();
        let row = insert_row(&schema, &CRATE, &Data::new().set("label", "a"), Row::new()).unwrap();
        assert_eq!(row.get("weight"), &Value::Float(1.0));
        assert!(row.get("notes").is_null());
        assert!(matches!(row.get("id"), Value::String(_)));
        assert!(matches!(row.get("updatedAt"), Value::DateTime(_)));
    }

    #[test]
    fn json_null_markers_in_writes() {
        let schema = schema();
        let notes = CRATE.field("notes").unwrap();
        assert!(write_value(&schema, &CRATE, notes, &Value::Null).is_err());
        assert_eq!(json_null(&CRATE, notes, NullMarker::DbNull).unwrap(), Value::Null);
        assert_eq!(json_null(&CRATE, notes, NullMarker::JsonNull).unwrap(), Value::Json(Json::Null));
        assert!(json_null(&CRATE, notes, NullMarker::AnyNull).is_err());
    }

    #[test]
    fn required_fields_may_come_from_an_owning_slot() {
        let schema = schema();
        let via_slot = Data::new().connect("crate", quarry_core::WhereUniqueInput::by("label", "a"));
        assert!(check_data(&schema, &ITEM, &via_slot, WriteMode::Create, &[]).is_ok());
        let err = check_data(&schema, &ITEM, &Data::new(), WriteMode::Create, &[]).unwrap_err();
        assert!(matches!(err, QuarryError::Validation(ref m) if m.contains("crateId")));
    }

    #[test]
    fn slots_take_one_kind_and_updates_keep_the_primary_key() {
        let schema = schema();
        let mixed = Data::new()
            .set("label", "a")
            .create("items", Data::new())
            .connect("items", quarry_core::WhereUniqueInput::by("id", "i1"));
        assert!(check_data(&schema, &CRATE, &mixed, WriteMode::Create, &[]).is_err());

        let rekey = Data::new().set("id", "other");
        assert!(check_data(&schema, &CRATE, &rekey, WriteMode::Update, &[]).is_err());

        let bump = Data::new().increment("label", 1);
        assert!(check_data(&schema, &CRATE, &bump, WriteMode::Update, &[]).is_err());
        assert!(check_data(&schema, &CRATE, &Data::new().multiply("weight", 2), WriteMode::Update, &[]).is_ok());
    }
}

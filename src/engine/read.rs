use quarry_core::{
    Connection, EntityDef, FindManyArgs, FindUniqueArgs, Predicate, QuarryError, RelationLoad,
    Result, Row, SelectStatement, WhereInput, resolve_unique,
};

use super::Engine;
use super::window::{Window, total_order};
use crate::operation::{Action, Payload, Record};

impl<'a, C: Connection> Engine<'a, C> {
    pub(super) async fn find_unique(
        self,
        entity: &'static EntityDef,
        args: &FindUniqueArgs,
    ) -> Result<Option<Record>> {
        let projection = self.projection(entity, &args.selection)?;
        let Some(row) = self.unique_row(entity, &args.r#where).await? else {
            return Ok(None);
        };
        Ok(self.shape(&projection, vec![row]).await?.pop())
    }

    pub(super) async fn find_first(
        self,
        entity: &'static EntityDef,
        args: &FindManyArgs,
    ) -> Result<Option<Record>> {
        let mut args = args.clone();
        args.take = Some(if args.take.is_some_and(|t| t < 0) { -1 } else { 1 });
        Ok(self.find_many(entity, &args).await?.pop())
    }

    pub(super) async fn find_many(
        self,
        entity: &'static EntityDef,
        args: &FindManyArgs,
    ) -> Result<Vec<Record>> {
        let projection = self.projection(entity, &args.selection)?;
        let rows = self
            .select_window(
                entity,
                args.r#where.as_ref(),
                Window::from(args),
                Some(projection.fetch_columns()),
            )
            .await?;
        self.shape(&projection, rows).await
    }

    async fn first_window_row(
        self,
        entity: &'static EntityDef,
        mut args: FindManyArgs,
    ) -> Result<Option<Row>> {
        args.take = Some(if args.take.is_some_and(|t| t < 0) { -1 } else { 1 });
        Ok(self
            .select_window(entity, args.r#where.as_ref(), Window::from(&args), None)
            .await?
            .pop())
    }

    /// The full row identified by a unique lookup.
    pub(super) async fn unique_row(
        self,
        entity: &'static EntityDef,
        input: &quarry_core::WhereUniqueInput,
    ) -> Result<Option<Row>> {
        let filter = self.unique_filter(entity, input).await?;
        self.first_row(entity, filter).await
    }

    pub(super) async fn first_row(
        self,
        entity: &'static EntityDef,
        filter: Predicate,
    ) -> Result<Option<Row>> {
        let mut select = SelectStatement::new(entity.name, filter);
        select.take = Some(1);
        Ok(self.run(select).await?.rows.pop())
    }

    /// Rows of `entity` matching `input`, windowed. `columns` is a hint used
    /// when the store applies the window itself; engine-side windows fetch
    /// every column.
    pub(super) async fn select_window(
        self,
        entity: &'static EntityDef,
        input: Option<&WhereInput>,
        window: Window<'_>,
        columns: Option<Vec<String>>,
    ) -> Result<Vec<Row>> {
        window.validate(entity)?;
        let cursor = window
            .cursor
            .map(|c| resolve_unique(self.schema(), entity, c))
            .transpose()?;
        let filter = self.filter(entity, input).await?;
        let order = total_order(entity, window.order_by);

        if !window.needs_engine() {
            let mut select = SelectStatement::new(entity.name, filter);
            select.order_by = order;
            select.skip = window.skip;
            select.take = window.take.map(i64::unsigned_abs);
            select.columns = columns;
            return Ok(self.run(select).await?.rows);
        }

        let cursor = match cursor {
            Some(lookup) => Some(self.resolve(lookup.predicate).await?),
            None => None,
        };
        let mut select = SelectStatement::new(entity.name, filter);
        select.order_by = order.clone();
        let rows = self.run(select).await?.rows;
        Ok(window.apply(rows, &order, cursor.as_ref()))
    }

    /// A relation of one parent record, addressed through a deferred
    /// single-record read.
    pub(super) async fn fluent(
        self,
        entity: &'static EntityDef,
        parent: Action,
        relation: &str,
        args: &FindManyArgs,
    ) -> Result<Payload> {
        let rel = entity.relation_or_err(relation)?;
        let load = RelationLoad::resolve(self.schema(), entity, rel, args, &self.shared.omit)?;
        let (parent, throws) = match parent {
            Action::FindUnique(a) => (self.unique_row(entity, &a.r#where).await?, false),
            Action::FindUniqueOrThrow(a) => (self.unique_row(entity, &a.r#where).await?, true),
            Action::FindFirst(a) => (self.first_window_row(entity, a).await?, false),
            Action::FindFirstOrThrow(a) => (self.first_window_row(entity, a).await?, true),
            other => {
                return Err(QuarryError::validation(format!(
                    "`{}` cannot be followed by a relation",
                    other.name()
                )));
            }
        };
        let Some(parent) = parent else {
            return if throws {
                Err(super::not_found(entity.name))
            } else {
                Ok(Payload::Record(None))
            };
        };

        let mut related = self
            .load_relation(entity, &load, std::slice::from_ref(&parent))
            .await?
            .pop()
            .unwrap_or_default();
        if rel.is_many() {
            Ok(Payload::Records(related))
        } else {
            Ok(Payload::Record(related.pop()))
        }
    }
}

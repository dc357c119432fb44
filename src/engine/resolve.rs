//! Relation filters become key sets before a statement reaches the store.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use hashbrown::HashSet;
use quarry_core::{
    Connection, EntityDef, KeyTuple, Predicate, Result, SelectStatement, WhereInput,
    WhereUniqueInput, compile_where, resolve_unique,
};

use super::Engine;

impl<'a, C: Connection> Engine<'a, C> {
    /// Compiles an optional `where` against `entity` and resolves its relation
    /// filters.
    pub(super) async fn filter(
        self,
        entity: &'static EntityDef,
        input: Option<&WhereInput>,
    ) -> Result<Predicate> {
        match input {
            Some(input) => {
                let compiled = compile_where(self.schema(), entity, input)?;
                self.resolve(compiled).await
            }
            None => Ok(Predicate::Const(true)),
        }
    }

    pub(super) async fn unique_filter(
        self,
        entity: &'static EntityDef,
        input: &WhereUniqueInput,
    ) -> Result<Predicate> {
        let lookup = resolve_unique(self.schema(), entity, input)?;
        self.resolve(lookup.predicate).await
    }

    /// Replaces every `SubQuery` with an `IN` over the related keys it
    /// selects. Nested subqueries resolve innermost first.
    pub(super) fn resolve(self, predicate: Predicate) -> BoxFuture<'a, Result<Predicate>> {
        async move {
            if !predicate.has_subquery() {
                return Ok(predicate);
            }
            Ok(match predicate {
                Predicate::And(parts) => {
                    let mut out = Vec::with_capacity(parts.len());
                    for p in parts {
                        out.push(self.resolve(p).await?);
                    }
                    Predicate::all(out)
                }
                Predicate::Or(parts) => {
                    let mut out = Vec::with_capacity(parts.len());
                    for p in parts {
                        out.push(self.resolve(p).await?);
                    }
                    Predicate::any(out)
                }
                Predicate::Not(inner) => self.resolve(*inner).await?.negate(),
                Predicate::SubQuery(sub) => {
                    let sub = *sub;
                    let filter = self.resolve(sub.filter).await?;
                    let mut select = SelectStatement::new(sub.target, filter);
                    select.columns = Some(vec![sub.remote_field.clone()]);
                    let rows = self.run(select).await?.rows;

                    let mut seen = HashSet::new();
                    let values = rows
                        .iter()
                        .map(|r| r.get(&sub.remote_field))
                        .filter(|v| !v.is_null())
                        .filter(|v| seen.insert(KeyTuple([(*v).clone()].into_iter().collect())))
                        .cloned()
                        .collect();
                    let keys = Predicate::in_list(sub.local_field, values);
                    if sub.negated { keys.negate() } else { keys }
                }
                other => other,
            })
        }
        .boxed()
    }
}

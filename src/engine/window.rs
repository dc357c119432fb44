//! Ordering, cursor, distinct and paging over already-fetched rows.

use hashbrown::HashSet;
use quarry_core::{
    AggregateArgs, CountArgs, EntityDef, FindManyArgs, OrderBy, Predicate, QuarryError, Result,
    Row, WhereUniqueInput, compare_rows,
};

/// Borrowed window arguments shared by `findMany`, `aggregate`, `count` and
/// relation loads.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Window<'w> {
    pub order_by: &'w [OrderBy],
    pub cursor: Option<&'w WhereUniqueInput>,
    pub take: Option<i64>,
    pub skip: Option<u64>,
    pub distinct: &'w [String],
}

impl<'w> From<&'w FindManyArgs> for Window<'w> {
    fn from(args: &'w FindManyArgs) -> Self {
        Self {
            order_by: &args.order_by,
            cursor: args.cursor.as_ref(),
            take: args.take,
            skip: args.skip,
            distinct: &args.distinct,
        }
    }
}

impl<'w> From<&'w AggregateArgs> for Window<'w> {
    fn from(args: &'w AggregateArgs) -> Self {
        Self {
            order_by: &args.order_by,
            cursor: args.cursor.as_ref(),
            take: args.take,
            skip: args.skip,
            distinct: &[],
        }
    }
}

impl<'w> From<&'w CountArgs> for Window<'w> {
    fn from(args: &'w CountArgs) -> Self {
        Self {
            order_by: &args.order_by,
            cursor: args.cursor.as_ref(),
            take: args.take,
            skip: args.skip,
            distinct: &[],
        }
    }
}

impl Window<'_> {
    pub fn backwards(&self) -> bool {
        self.take.is_some_and(|t| t < 0)
    }

    /// Whether the store can apply skip/take itself, or the engine has to
    /// window the full ordered result.
    pub fn needs_engine(&self) -> bool {
        self.cursor.is_some() || !self.distinct.is_empty() || self.backwards()
    }

    pub fn validate(&self, entity: &EntityDef) -> Result<()> {
        for o in self.order_by {
            let field = entity.field_or_err(&o.field)?;
            if !field.ty.is_orderable() {
                return Err(QuarryError::validation(format!(
                    "Cannot order by `{}.{}` of type {}",
                    entity.name,
                    field.name,
                    field.ty.name()
                )));
            }
        }
        for d in self.distinct {
            entity.field_or_err(d)?;
        }
        Ok(())
    }

    /// Orders `rows`, then applies cursor, distinct, skip and take. A negative
    /// take pages backwards from the cursor and keeps the requested order.
    pub fn apply(&self, mut rows: Vec<Row>, order: &[OrderBy], cursor: Option<&Predicate>) -> Vec<Row> {
        let backwards = self.backwards();
        let order: Vec<OrderBy> = if backwards {
            order.iter().map(OrderBy::reversed).collect()
        } else {
            order.to_vec()
        };
        rows.sort_by(|a, b| compare_rows(a, b, &order));

        if let Some(cursor) = cursor {
            match rows.iter().position(|r| cursor.matches(r)) {
                Some(start) => {
                    rows.drain(..start);
                }
                None => return Vec::new(),
            }
        }

        if !self.distinct.is_empty() {
            let fields: Vec<&str> = self.distinct.iter().map(String::as_str).collect();
            let mut seen = HashSet::new();
            rows.retain(|r| seen.insert(r.key(&fields)));
        }

        let skip = self.skip.map_or(0, |s| s as usize);
        let take = self.take.map_or(usize::MAX, |t| t.unsigned_abs() as usize);
        let mut rows: Vec<Row> = rows.into_iter().skip(skip).take(take).collect();
        if backwards {
            rows.reverse();
        }
        rows
    }
}

/// `order_by` followed by the primary key, so every ordering is total.
pub(super) fn total_order(entity: &EntityDef, order_by: &[OrderBy]) -> Vec<OrderBy> {
    let mut order = order_by.to_vec();
    if !order.iter().any(|o| o.field == entity.primary_key) {
        order.push(OrderBy::asc(entity.primary_key));
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::Value;

    fn rows() -> Vec<Row> {
        (1..=5)
            .map(|i| Row::new().with("id", format!("r{i}")).with("n", i as i64 % 3))
            .collect()
    }

    #[test]
    fn negative_take_pages_backwards_from_the_cursor() {
        let order = [OrderBy::asc("id")];
        let cursor = Predicate::eq("id", "r4");
        let window = Window {
            take: Some(-2),
            ..Window::default()
        };
        let out = window.apply(rows(), &order, Some(&cursor));
        let ids: Vec<_> = out.iter().map(|r| r.get("id").clone()).collect();
        assert_eq!(ids, vec![Value::from("r3"), Value::from("r4")]);
    }

    #[test]
    fn distinct_keeps_the_first_row_per_key() {
        let order = [OrderBy::asc("id")];
        let distinct = ["n".to_owned()];
        let window = Window {
            distinct: &distinct,
            ..Window::default()
        };
        let out = window.apply(rows(), &order, None);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].get("id"), &Value::from("r1"));
    }

    #[test]
    fn missing_cursor_yields_nothing() {
        let window = Window::default();
        let cursor = Predicate::eq("id", "nope");
        assert!(window.apply(rows(), &[OrderBy::asc("id")], Some(&cursor)).is_empty());
    }
}

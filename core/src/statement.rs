//! Statements handed to an executor.
//!
//! Every statement returns the affected rows (RETURNING semantics) so the
//! engine never needs a second round trip to read back what it wrote.

use core::cmp::Ordering;

use crate::args::{NullsOrder, OrderBy, SortOrder};
use crate::error::{QuarryError, Result};
use crate::filter::Predicate;
use crate::value::{Row, Value};

#[derive(Debug, Clone)]
pub struct SelectStatement {
    pub entity: &'static str,
    pub filter: Predicate,
    pub order_by: Vec<OrderBy>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
    /// `None` returns every column.
    pub columns: Option<Vec<String>>,
}

impl SelectStatement {
    pub fn new(entity: &'static str, filter: Predicate) -> Self {
        Self {
            entity,
            filter,
            order_by: Vec::new(),
            skip: None,
            take: None,
            columns: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InsertStatement {
    pub entity: &'static str,
    pub rows: Vec<Row>,
    /// Silently drop rows that would violate a unique key.
    pub skip_duplicates: bool,
}

/// Right-hand side of a column assignment in an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Set(Value),
    Increment(Value),
    Decrement(Value),
    Multiply(Value),
    Divide(Value),
}

impl Assignment {
    /// New column value given the current one. Arithmetic on NULL yields NULL.
    pub fn apply(&self, current: &Value) -> Result<Value> {
        let operand = match self {
            Assignment::Set(v) => return Ok(v.clone()),
            Assignment::Increment(v)
            | Assignment::Decrement(v)
            | Assignment::Multiply(v)
            | Assignment::Divide(v) => v,
        };
        if current.is_null() || operand.is_null() {
            return Ok(Value::Null);
        }
        match (current, operand) {
            (Value::Int(a), Value::Int(b)) => {
                let (a, b) = (*a, *b);
                let out = match self {
                    Assignment::Increment(_) => a.checked_add(b),
                    Assignment::Decrement(_) => a.checked_sub(b),
                    Assignment::Multiply(_) => a.checked_mul(b),
                    Assignment::Divide(_) if b == 0 => return Err(division_by_zero()),
                    Assignment::Divide(_) => a.checked_div(b),
                    Assignment::Set(_) => None,
                };
                out.map(Value::Int)
                    .ok_or_else(|| QuarryError::UnknownStore("integer overflow".into()))
            }
            _ => {
                let (Some(a), Some(b)) = (current.as_f64(), operand.as_f64()) else {
                    return Err(QuarryError::validation(format!(
                        "cannot apply arithmetic to {} and {}",
                        current.type_name(),
                        operand.type_name()
                    )));
                };
                Ok(Value::Float(match self {
                    Assignment::Increment(_) => a + b,
                    Assignment::Decrement(_) => a - b,
                    Assignment::Multiply(_) => a * b,
                    Assignment::Divide(_) if b == 0.0 => return Err(division_by_zero()),
                    Assignment::Divide(_) => a / b,
                    Assignment::Set(_) => b,
                }))
            }
        }
    }
}

fn division_by_zero() -> QuarryError {
    QuarryError::UnknownStore("division by zero".into())
}

#[derive(Debug, Clone)]
pub struct UpdateStatement {
    pub entity: &'static str,
    pub filter: Predicate,
    pub assignments: Vec<(String, Assignment)>,
}

#[derive(Debug, Clone)]
pub struct DeleteStatement {
    pub entity: &'static str,
    pub filter: Predicate,
}

#[derive(Debug, Clone)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

impl Statement {
    pub fn entity(&self) -> &'static str {
        match self {
            Statement::Select(s) => s.entity,
            Statement::Insert(s) => s.entity,
            Statement::Update(s) => s.entity,
            Statement::Delete(s) => s.entity,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select(_) => "select",
            Statement::Insert(_) => "insert",
            Statement::Update(_) => "update",
            Statement::Delete(_) => "delete",
        }
    }
}

impl From<SelectStatement> for Statement {
    fn from(s: SelectStatement) -> Self {
        Statement::Select(s)
    }
}

impl From<InsertStatement> for Statement {
    fn from(s: InsertStatement) -> Self {
        Statement::Insert(s)
    }
}

impl From<UpdateStatement> for Statement {
    fn from(s: UpdateStatement) -> Self {
        Statement::Update(s)
    }
}

impl From<DeleteStatement> for Statement {
    fn from(s: DeleteStatement) -> Self {
        Statement::Delete(s)
    }
}

/// Rows produced by a statement, and how many rows it touched.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub affected: u64,
}

/// Compares two rows under `order`, honouring per-column NULL placement.
pub fn compare_rows(a: &Row, b: &Row, order: &[OrderBy]) -> Ordering {
    for o in order {
        let (x, y) = (a.get(&o.field), b.get(&o.field));
        let ord = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) | (false, true) => {
                let null_first = o.effective_nulls() == NullsOrder::First;
                match (x.is_null(), null_first) {
                    (true, true) | (false, false) => Ordering::Less,
                    _ => Ordering::Greater,
                }
            }
            (false, false) => {
                let ord = x.sort_cmp(y);
                match o.order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

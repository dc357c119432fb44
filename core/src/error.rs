use core::fmt;

use thiserror::Error;

/// Which declared constraint a write tripped over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// A unique key (single field or composite).
    Unique(Vec<String>),
    /// A foreign key field pointing at a missing or still-referenced row.
    ForeignKey(String),
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Unique(fields) => write!(f, "unique constraint on ({})", fields.join(", ")),
            Constraint::ForeignKey(field) => write!(f, "foreign key constraint on `{field}`"),
        }
    }
}

#[derive(Debug, Error)]
pub enum QuarryError {
    /// Malformed arguments, raised before any statement reaches the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// A unique lookup or throwing finder matched no row
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Unique-key or referential violation reported by the store
    #[error("Constraint violation on `{entity}`: {constraint}")]
    ConstraintViolation { entity: String, constraint: Constraint },

    /// A required to-one relation had no row behind it
    #[error("Inconsistent query result: {0}")]
    InconsistentResult(String),

    /// Error with transaction
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Transaction slot not acquired within `max_wait`, or lifetime exceeded `timeout`
    #[error("Transaction timeout: {0}")]
    TransactionTimeout(String),

    /// Cannot establish the underlying connection or the schema is unusable
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// Opaque failure from the executor
    #[error("Store error: {0}")]
    UnknownStore(String),

    /// Error mapping a payload
    #[error("Mapping error: {0}")]
    Mapping(String),
}

impl QuarryError {
    /// Stable error code, matching the wire codes used by query-engine clients.
    pub fn code(&self) -> &'static str {
        match self {
            QuarryError::Validation(_) => "P2009",
            QuarryError::RecordNotFound(_) => "P2025",
            QuarryError::ConstraintViolation {
                constraint: Constraint::Unique(_),
                ..
            } => "P2002",
            QuarryError::ConstraintViolation {
                constraint: Constraint::ForeignKey(_),
                ..
            } => "P2003",
            QuarryError::InconsistentResult(_) => "P2026",
            QuarryError::TransactionError(_) | QuarryError::TransactionTimeout(_) => "P2028",
            QuarryError::Initialization(_) => "P1001",
            QuarryError::UnknownStore(_) | QuarryError::Mapping(_) => "P2010",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        QuarryError::Validation(msg.into())
    }

    /// True for errors a caller may expect to see while racing other writers.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, QuarryError::ConstraintViolation { .. })
    }
}

impl From<serde_json::Error> for QuarryError {
    fn from(e: serde_json::Error) -> Self {
        QuarryError::Mapping(e.to_string())
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, QuarryError>;

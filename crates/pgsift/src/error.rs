//! Error types for pgsift

use thiserror::Error;

/// Result type alias for pgsift operations
pub type SiftResult<T> = Result<T, SiftError>;

/// Error types for query building and database operations
#[derive(Debug, Error)]
pub enum SiftError {
    /// Database connection or configuration error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// A predicate operator received the wrong number of values
    #[error("operator {operator} takes {expected} value(s), got {got}")]
    Arity {
        operator: &'static str,
        expected: usize,
        got: usize,
    },

    /// Malformed builder input caught before any statement is sent
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation attempted on a transaction that already ended
    #[error("transaction already {0}")]
    TransactionState(&'static str),

    /// A mutation failed and the automatic rollback failed as well
    #[error("{source} (rollback failed: {rollback_error})")]
    RollbackFailed {
        source: Box<SiftError>,
        rollback_error: Box<SiftError>,
    },
}

impl SiftError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is an arity error
    pub fn is_arity(&self) -> bool {
        matches!(self, Self::Arity { .. })
    }

    /// Parse a tokio_postgres error into a more specific SiftError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }
}

//! Row mapping traits and utilities.

use crate::error::{SiftError, SiftResult};
use serde::de::DeserializeOwned;
use tokio_postgres::Row;

/// Converts a database row into a Rust struct.
///
/// Implementations name the columns they read, so the mapping from SQL
/// column to field is explicit and needs no runtime introspection.
///
/// # Example
///
/// ```ignore
/// use pgsift::{FromRow, RowExt, SiftResult};
///
/// struct Site {
///     id: i64,
///     url: String,
///     image: Option<String>,
/// }
///
/// impl FromRow for Site {
///     fn from_row(row: &tokio_postgres::Row) -> SiftResult<Self> {
///         Ok(Self {
///             id: row.try_get_column("id")?,
///             url: row.try_get_column("url")?,
///             image: row.try_get_column("image")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    /// Convert a database row into Self.
    fn from_row(row: &Row) -> SiftResult<Self>;
}

/// Extension trait for [`Row`] providing typed access with pgsift errors.
pub trait RowExt {
    /// Get a column value, returning [`SiftError::Decode`] on failure.
    ///
    /// Nullable columns map through `Option<T>`.
    fn try_get_column<T>(&self, column: &str) -> SiftResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>;

    /// Decode a JSON(B) column into a typed structure.
    fn try_get_json<T: DeserializeOwned>(&self, column: &str) -> SiftResult<T>;
}

impl RowExt for Row {
    fn try_get_column<T>(&self, column: &str) -> SiftResult<T>
    where
        T: for<'a> tokio_postgres::types::FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| SiftError::decode(column, e.to_string()))
    }

    fn try_get_json<T: DeserializeOwned>(&self, column: &str) -> SiftResult<T> {
        let value: serde_json::Value = self.try_get_column(column)?;
        serde_json::from_value(value).map_err(|e| SiftError::decode(column, e.to_string()))
    }
}

//! Narrow database capability used by the loader and the version source.
//!
//! Production code uses [`crate::sqlite::SqliteDatabase`]; tests can provide a
//! mock implementation.

use crate::error::PersistenceError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A bound parameter or a fetched value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    /// Reads the value as an integer. `NULL` reads as 0.
    pub fn to_i64(&self, column: &str) -> Result<i64, PersistenceError> {
        let not_an_integer = || PersistenceError::NotAnInteger {
            column: column.to_string(),
            value: self.to_string(),
        };
        match self {
            SqlValue::Null => Ok(0),
            SqlValue::Integer(value) => Ok(*value),
            SqlValue::Real(value) if value.fract() == 0.0 => Ok(*value as i64),
            SqlValue::Text(text) => text.trim().parse().map_err(|_| not_an_integer()),
            SqlValue::Real(_) => Err(not_an_integer()),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("null"),
            SqlValue::Integer(value) => write!(f, "{value}"),
            SqlValue::Real(value) => write!(f, "{value}"),
            SqlValue::Text(text) => write!(f, "{text:?}"),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

/// One open connection. Statements use positional `?` parameters.
pub trait Connection {
    /// Executes a statement, returning the number of affected rows.
    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize, PersistenceError>;

    /// Runs a query, returning every row.
    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Vec<SqlValue>>, PersistenceError>;

    /// Primary-key column names of a table, in key order. Empty if none.
    fn primary_key_columns(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<String>, PersistenceError>;

    fn table_exists(&self, schema: Option<&str>, table: &str) -> Result<bool, PersistenceError>;

    fn column_exists(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
    ) -> Result<bool, PersistenceError>;
}

impl<C: Connection + ?Sized> Connection for &C {
    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize, PersistenceError> {
        (**self).execute(sql, params)
    }

    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Vec<SqlValue>>, PersistenceError> {
        (**self).query(sql, params)
    }

    fn primary_key_columns(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<String>, PersistenceError> {
        (**self).primary_key_columns(schema, table)
    }

    fn table_exists(&self, schema: Option<&str>, table: &str) -> Result<bool, PersistenceError> {
        (**self).table_exists(schema, table)
    }

    fn column_exists(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
    ) -> Result<bool, PersistenceError> {
        (**self).column_exists(schema, table, column)
    }
}

/// Hands out connections. A connection lives for one operation and is
/// released when the returned box is dropped.
pub trait DataSource {
    fn connection(&self) -> Result<Box<dyn Connection + '_>, PersistenceError>;
}

impl<D: DataSource + ?Sized> DataSource for &D {
    fn connection(&self) -> Result<Box<dyn Connection + '_>, PersistenceError> {
        (**self).connection()
    }
}

/// `schema.table`, or `table` when no schema is given.
pub fn qualified(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(schema) => format!("{schema}.{table}"),
        None => table.to_string(),
    }
}

//! Error types for database fixtures.
//!
//! Low-level failures ([`PersistenceError`]) never reach the test author
//! directly: the loader wraps them in [`LoadError`] with schema, table and
//! row context, the version source in [`VersionSourceError`] with the name of
//! the operation.

/// A storage failure.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// No connection could be obtained.
    #[error("Database unavailable: {0}")]
    Unavailable(String),

    /// Error reported by the SQLite backend.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Error reported by another connection implementation.
    #[error("Database error: {0}")]
    Driver(String),

    /// An update touched an unexpected number of rows.
    #[error("{operation}: expected exactly {expected} record(s), found {found}")]
    UnexpectedRowCount {
        operation: String,
        expected: usize,
        found: usize,
    },

    /// A query that must return a row returned none.
    #[error("No rows returned by: {sql}")]
    NoRows { sql: String },

    /// A value could not be read as an integer.
    #[error("Column {column} does not hold an integer: {value}")]
    NotAnInteger { column: String, value: String },
}

impl PersistenceError {
    /// Whether a repair pass might make the failed operation succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, PersistenceError::Unavailable(_))
    }
}

/// A fixture that does not fit the target schema.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// The target table declares no primary key.
    #[error("Table {schema}.{table} has no primary key columns; rows cannot be refreshed")]
    NoPrimaryKeys { schema: String, table: String },

    /// A row does not provide every primary-key column.
    #[error("Row must contain all primary key columns of {schema}.{table}: {}", primary_keys.join(", "))]
    MissingPrimaryKeyColumns {
        schema: String,
        table: String,
        primary_keys: Vec<String>,
    },

    /// A value references a variable that was not supplied.
    #[error("No value for variable {reference}")]
    UndefinedVariable { reference: String },

    /// A value is the literal token with nothing after it.
    #[error("Column {column} holds an empty literal expression")]
    EmptyExpression { column: String },

    /// The configured tokens cannot be used.
    #[error("Invalid data set token configuration: {0}")]
    InvalidTokens(#[from] regex::Error),
}

/// Failure of one row, before it is wrapped with context.
#[derive(Debug, thiserror::Error)]
pub enum RowError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Failure of a data set load. Loading stops at the first failing row.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// No connection could be used for the load.
    #[error("Unable to load data set: {0}")]
    Connection(#[source] PersistenceError),

    /// A row could not be loaded.
    #[error(
        "Unable to load data set row for schema: {schema}, table: {table}, row: [{row}], variables: {variables}: {source}"
    )]
    Row {
        schema: String,
        table: String,
        row: String,
        variables: String,
        #[source]
        source: RowError,
    },
}

/// Failure of a version source operation, after at most one repair.
#[derive(Debug, thiserror::Error)]
pub enum VersionSourceError {
    /// The operation failed (again, if a repair was attempted).
    #[error("Error while {operation}: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: PersistenceError,
    },

    /// The version table could not be checked or repaired.
    #[error("Error while checking version table before retrying {operation}: {source}")]
    Repair {
        operation: &'static str,
        #[source]
        source: PersistenceError,
    },
}

/// A script statement failed.
#[derive(Debug, thiserror::Error)]
#[error("Error while executing statement: {statement}: {source}")]
pub struct ScriptError {
    pub statement: String,
    #[source]
    pub source: PersistenceError,
}

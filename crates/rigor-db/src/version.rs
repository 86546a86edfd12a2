//! Database version bookkeeping in a dedicated, self-healing table.
//!
//! The table holds a single row with five integer columns: version index,
//! version timestamp, last-update-succeeded flag, code scripts timestamp and
//! last-code-update-succeeded flag. Every operation that fails is retried
//! once after the table has been repaired: created if missing, missing
//! columns added, a zero row inserted when empty.

use crate::connection::{Connection, DataSource, SqlValue, qualified};
use crate::error::{PersistenceError, VersionSourceError};
use chrono::Utc;
use rigor_core::VersionSourceConfig;
use std::fmt;
use tracing::{info, warn};

/// Schema state: an index plus the timestamp of the scripts applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    index: i64,
    timestamp: i64,
}

impl Version {
    pub fn new(index: i64, timestamp: i64) -> Self {
        Self { index, timestamp }
    }

    /// A version stamped with the current time in milliseconds.
    pub fn now(index: i64) -> Self {
        Self::new(index, Utc::now().timestamp_millis())
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "index: {}, timestamp: {}", self.index, self.timestamp)
    }
}

/// Persistent version state of a database.
pub trait VersionSource {
    fn db_version(&self) -> Result<Version, VersionSourceError>;

    /// Stores `version` and marks the last update as succeeded.
    fn set_db_version(&self, version: Version) -> Result<(), VersionSourceError>;

    fn is_last_update_succeeded(&self) -> Result<bool, VersionSourceError>;

    fn register_update_succeeded(&self, succeeded: bool) -> Result<(), VersionSourceError>;

    fn code_scripts_timestamp(&self) -> Result<i64, VersionSourceError>;

    /// Stores `timestamp` and marks the last code update as succeeded.
    fn set_code_scripts_timestamp(&self, timestamp: i64) -> Result<(), VersionSourceError>;

    fn is_last_code_update_succeeded(&self) -> Result<bool, VersionSourceError>;

    fn register_code_update_succeeded(&self, succeeded: bool) -> Result<(), VersionSourceError>;
}

/// [`VersionSource`] backed by a table reached through a [`DataSource`].
pub struct DbVersionSource<D> {
    data_source: D,
    schema: Option<String>,
    table_name: String,
    version_index_column: String,
    version_timestamp_column: String,
    last_update_succeeded_column: String,
    code_scripts_timestamp_column: String,
    last_code_update_succeeded_column: String,
    long_data_type: String,
}

impl<D: DataSource> DbVersionSource<D> {
    /// Names are converted to the configured identifier case once, here.
    pub fn new(data_source: D, config: &VersionSourceConfig) -> Self {
        let case = config.identifier_case;
        Self {
            data_source,
            schema: config.schema.clone(),
            table_name: case.apply(&config.table_name),
            version_index_column: case.apply(&config.version_index_column),
            version_timestamp_column: case.apply(&config.version_timestamp_column),
            last_update_succeeded_column: case.apply(&config.last_update_succeeded_column),
            code_scripts_timestamp_column: case.apply(&config.code_scripts_timestamp_column),
            last_code_update_succeeded_column: case.apply(&config.last_code_update_succeeded_column),
            long_data_type: config.long_data_type.clone(),
        }
    }

    /// The qualified version table name.
    pub fn table(&self) -> String {
        qualified(self.schema.as_deref(), &self.table_name)
    }

    fn columns(&self) -> [&str; 5] {
        [
            self.version_index_column.as_str(),
            self.version_timestamp_column.as_str(),
            self.last_update_succeeded_column.as_str(),
            self.code_scripts_timestamp_column.as_str(),
            self.last_code_update_succeeded_column.as_str(),
        ]
    }

    fn attempt<T>(
        &self,
        f: &impl Fn(&dyn Connection) -> Result<T, PersistenceError>,
    ) -> Result<T, PersistenceError> {
        let conn = self.data_source.connection()?;
        f(conn.as_ref())
    }

    /// Runs `f`; when it fails and the table needed repair, runs it once more.
    fn with_repair<T>(
        &self,
        operation: &'static str,
        f: impl Fn(&dyn Connection) -> Result<T, PersistenceError>,
    ) -> Result<T, VersionSourceError> {
        let error = match self.attempt(&f) {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if !error.is_recoverable() {
            return Err(VersionSourceError::Operation { operation, source: error });
        }

        let repaired = self
            .repair_version_table()
            .map_err(|source| VersionSourceError::Repair { operation, source })?;
        if !repaired {
            return Err(VersionSourceError::Operation { operation, source: error });
        }

        warn!(operation, error = %error, "Version table repaired, retrying");
        self.attempt(&f)
            .map_err(|source| VersionSourceError::Operation { operation, source })
    }

    /// Brings the version table into shape. Returns whether anything changed.
    pub fn repair_version_table(&self) -> Result<bool, PersistenceError> {
        let conn = self.data_source.connection()?;
        let schema = self.schema.as_deref();
        let table = self.table();
        let mut repaired = false;

        if conn.table_exists(schema, &self.table_name)? {
            for column in self.columns() {
                if !conn.column_exists(schema, &self.table_name, column)? {
                    info!(table = %table, column, "Adding missing version column");
                    conn.execute(
                        &format!("alter table {table} add {column} {}", self.long_data_type),
                        &[],
                    )?;
                    repaired = true;
                }
            }
        } else {
            info!(table = %table, "Creating version table");
            let definitions = self
                .columns()
                .iter()
                .map(|column| format!("{column} {}", self.long_data_type))
                .collect::<Vec<_>>()
                .join(", ");
            conn.execute(&format!("create table {table} ( {definitions} )"), &[])?;
            repaired = true;
        }

        let rows = conn.query(&format!("select count(*) from {table}"), &[])?;
        let count = match rows.first().and_then(|row| row.first()) {
            Some(value) => value.to_i64("count(*)")?,
            None => 0,
        };
        if count == 0 {
            info!(table = %table, "Inserting default version row");
            conn.execute(
                &format!(
                    "insert into {table} ({}) values (0, 0, 0, 0, 0)",
                    self.columns().join(", ")
                ),
                &[],
            )?;
            repaired = true;
        }
        Ok(repaired)
    }

    fn select(&self, conn: &dyn Connection, columns: &[&str]) -> Result<Option<Vec<SqlValue>>, PersistenceError> {
        let sql = format!("select {} from {}", columns.join(", "), self.table());
        Ok(conn.query(&sql, &[])?.into_iter().next())
    }

    fn select_required(&self, conn: &dyn Connection, columns: &[&str]) -> Result<Vec<SqlValue>, PersistenceError> {
        self.select(conn, columns)?.ok_or_else(|| PersistenceError::NoRows {
            sql: format!("select {} from {}", columns.join(", "), self.table()),
        })
    }

    fn read_flag(&self, conn: &dyn Connection, column: &str) -> Result<bool, PersistenceError> {
        match self.select(conn, &[column])? {
            Some(row) => Ok(row.first().unwrap_or(&SqlValue::Null).to_i64(column)? == 1),
            None => Ok(false),
        }
    }

    fn update_single_row(
        &self,
        conn: &dyn Connection,
        operation: &str,
        assignments: &[(&str, i64)],
    ) -> Result<(), PersistenceError> {
        let set = assignments
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let params = assignments
            .iter()
            .map(|(_, value)| SqlValue::Integer(*value))
            .collect::<Vec<_>>();

        let found = conn.execute(&format!("update {} set {set}", self.table()), &params)?;
        if found == 1 {
            Ok(())
        } else {
            Err(PersistenceError::UnexpectedRowCount {
                operation: operation.to_string(),
                expected: 1,
                found,
            })
        }
    }
}

fn flag(succeeded: bool) -> i64 {
    i64::from(succeeded)
}

impl<D: DataSource> VersionSource for DbVersionSource<D> {
    fn db_version(&self) -> Result<Version, VersionSourceError> {
        self.with_repair("retrieving database version", |conn| {
            let columns = [
                self.version_index_column.as_str(),
                self.version_timestamp_column.as_str(),
            ];
            let row = self.select_required(conn, &columns)?;
            let value = |index: usize| row.get(index).unwrap_or(&SqlValue::Null);
            Ok(Version::new(
                value(0).to_i64(columns[0])?,
                value(1).to_i64(columns[1])?,
            ))
        })
    }

    fn set_db_version(&self, version: Version) -> Result<(), VersionSourceError> {
        self.with_repair("setting database version", |conn| {
            self.update_single_row(
                conn,
                "setting database version",
                &[
                    (self.version_index_column.as_str(), version.index()),
                    (self.version_timestamp_column.as_str(), version.timestamp()),
                    (self.last_update_succeeded_column.as_str(), 1),
                ],
            )
        })?;
        info!(version = %version, "Database version set");
        Ok(())
    }

    fn is_last_update_succeeded(&self) -> Result<bool, VersionSourceError> {
        self.with_repair("checking whether last update succeeded", |conn| {
            self.read_flag(conn, &self.last_update_succeeded_column)
        })
    }

    fn register_update_succeeded(&self, succeeded: bool) -> Result<(), VersionSourceError> {
        self.with_repair("registering update succeeded", |conn| {
            self.update_single_row(
                conn,
                "registering update succeeded",
                &[(self.last_update_succeeded_column.as_str(), flag(succeeded))],
            )
        })
    }

    fn code_scripts_timestamp(&self) -> Result<i64, VersionSourceError> {
        self.with_repair("retrieving code scripts timestamp", |conn| {
            let column = self.code_scripts_timestamp_column.as_str();
            let row = self.select_required(conn, &[column])?;
            row.first().unwrap_or(&SqlValue::Null).to_i64(column)
        })
    }

    fn set_code_scripts_timestamp(&self, timestamp: i64) -> Result<(), VersionSourceError> {
        self.with_repair("setting code scripts timestamp", |conn| {
            self.update_single_row(
                conn,
                "setting code scripts timestamp",
                &[
                    (self.code_scripts_timestamp_column.as_str(), timestamp),
                    (self.last_code_update_succeeded_column.as_str(), 1),
                ],
            )
        })
    }

    fn is_last_code_update_succeeded(&self) -> Result<bool, VersionSourceError> {
        self.with_repair("checking whether last code update succeeded", |conn| {
            self.read_flag(conn, &self.last_code_update_succeeded_column)
        })
    }

    fn register_code_update_succeeded(&self, succeeded: bool) -> Result<(), VersionSourceError> {
        self.with_repair("registering code update succeeded", |conn| {
            self.update_single_row(
                conn,
                "registering code update succeeded",
                &[(self.last_code_update_succeeded_column.as_str(), flag(succeeded))],
            )
        })
    }
}

//! SQLite backend on top of `rusqlite`.

use crate::connection::{Connection, DataSource, SqlValue};
use crate::error::PersistenceError;
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::params_from_iter;
use std::path::Path;

const DEFAULT_SCHEMA: &str = "main";

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(value) => ToSqlOutput::Owned(Value::Integer(*value)),
            SqlValue::Real(value) => ToSqlOutput::Owned(Value::Real(*value)),
            SqlValue::Text(text) => ToSqlOutput::Borrowed(ValueRef::Text(text.as_bytes())),
        })
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(value) => SqlValue::Integer(value),
            ValueRef::Real(value) => SqlValue::Real(value),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                SqlValue::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}

/// A SQLite database used as fixture target.
pub struct SqliteDatabase {
    conn: rusqlite::Connection,
}

impl SqliteDatabase {
    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Ok(Self {
            conn: rusqlite::Connection::open_in_memory()?,
        })
    }

    /// Opens (or creates) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        Ok(Self {
            conn: rusqlite::Connection::open(path)?,
        })
    }

    /// Wraps an existing connection.
    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Runs several `;`-separated statements without parameters.
    pub fn execute_batch(&self, sql: &str) -> Result<(), PersistenceError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

impl DataSource for SqliteDatabase {
    fn connection(&self) -> Result<Box<dyn Connection + '_>, PersistenceError> {
        Ok(Box::new(SqliteConnection { conn: &self.conn }))
    }
}

/// Borrowed handle; statements are prepared and finalized per call.
struct SqliteConnection<'a> {
    conn: &'a rusqlite::Connection,
}

impl SqliteConnection<'_> {
    fn count(&self, sql: &str, params: &[&str]) -> Result<i64, PersistenceError> {
        let count = self
            .conn
            .query_row(sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(count)
    }
}

fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

impl Connection for SqliteConnection<'_> {
    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<usize, PersistenceError> {
        let mut statement = self.conn.prepare(sql)?;
        let affected = statement.execute(params_from_iter(params.iter()))?;
        Ok(affected)
    }

    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Vec<SqlValue>>, PersistenceError> {
        let mut statement = self.conn.prepare(sql)?;
        let column_count = statement.column_count();
        let mut rows = statement.query(params_from_iter(params.iter()))?;

        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(column_count);
            for index in 0..column_count {
                record.push(SqlValue::from(row.get_ref(index)?));
            }
            values.push(record);
        }
        Ok(values)
    }

    fn primary_key_columns(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> Result<Vec<String>, PersistenceError> {
        let mut statement = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1, ?2) WHERE pk > 0 ORDER BY pk")?;
        let names = statement
            .query_map([table, schema.unwrap_or(DEFAULT_SCHEMA)], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn table_exists(&self, schema: Option<&str>, table: &str) -> Result<bool, PersistenceError> {
        let sql = format!(
            "SELECT count(*) FROM {}.sqlite_master WHERE type = 'table' AND lower(name) = lower(?1)",
            quote_identifier(schema.unwrap_or(DEFAULT_SCHEMA))
        );
        Ok(self.count(&sql, &[table])? > 0)
    }

    fn column_exists(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
    ) -> Result<bool, PersistenceError> {
        let count = self.count(
            "SELECT count(*) FROM pragma_table_info(?1, ?2) WHERE lower(name) = lower(?3)",
            &[table, schema.unwrap_or(DEFAULT_SCHEMA), column],
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database() -> SqliteDatabase {
        let db = SqliteDatabase::open_in_memory().unwrap();
        db.execute_batch(
            "create table person (id integer, name text, primary key (id));
             create table membership (club text, person integer, since integer, primary key (person, club));
             create table note (body text);",
        )
        .unwrap();
        db
    }

    #[test]
    fn test_execute_and_query() {
        let db = database();
        let conn = db.connection().unwrap();

        let inserted = conn
            .execute(
                "insert into person (id, name) values (?, ?)",
                &[SqlValue::Integer(1), SqlValue::from("Ada")],
            )
            .unwrap();
        assert_eq!(inserted, 1);

        let rows = conn.query("select id, name from person", &[]).unwrap();
        assert_eq!(rows, vec![vec![SqlValue::Integer(1), SqlValue::from("Ada")]]);
    }

    #[test]
    fn test_update_count_zero_when_missing() {
        let db = database();
        let conn = db.connection().unwrap();
        let updated = conn
            .execute("update main.person set name=? where id=?", &[SqlValue::from("x"), SqlValue::Integer(9)])
            .unwrap();
        assert_eq!(updated, 0);
    }

    #[test]
    fn test_primary_keys_in_key_order() {
        let db = database();
        let conn = db.connection().unwrap();
        assert_eq!(conn.primary_key_columns(None, "person").unwrap(), vec!["id"]);
        assert_eq!(
            conn.primary_key_columns(Some("main"), "membership").unwrap(),
            vec!["person", "club"]
        );
        assert!(conn.primary_key_columns(None, "note").unwrap().is_empty());
    }

    #[test]
    fn test_table_and_column_metadata() {
        let db = database();
        let conn = db.connection().unwrap();
        assert!(conn.table_exists(None, "PERSON").unwrap());
        assert!(!conn.table_exists(Some("main"), "missing").unwrap());
        assert!(conn.column_exists(None, "person", "NAME").unwrap());
        assert!(!conn.column_exists(None, "person", "age").unwrap());
    }

    #[test]
    fn test_sql_error_is_persistence_error() {
        let db = database();
        let conn = db.connection().unwrap();
        let err = conn.execute("update missing set a = 1", &[]).unwrap_err();
        assert!(matches!(err, PersistenceError::Sqlite(_)));
        assert!(err.is_recoverable());
    }
}

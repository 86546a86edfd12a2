//! # rigor-db
//!
//! Database fixtures for integration tests.
//!
//! This crate provides:
//! - A narrow [`Connection`]/[`DataSource`] capability with a SQLite backend
//! - The [`DataSet`] model and the [`DataSetLoader`] that refreshes rows by
//!   primary key
//! - [`SqlScriptRunner`] for schema set-up scripts
//! - [`DbVersionSource`], a self-healing database version table

pub mod connection;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod script;
pub mod sqlite;
pub mod version;

pub use connection::{Connection, DataSource, SqlValue, qualified};
pub use dataset::{Column, ColumnValue, DataSet, Row, Schema, Table, ValueResolver, Variables};
pub use error::{
    ConfigurationError, LoadError, PersistenceError, RowError, ScriptError, VersionSourceError,
};
pub use loader::{DataSetLoader, LoadStrategy, LoadSummary, Statement};
pub use script::SqlScriptRunner;
pub use sqlite::SqliteDatabase;
pub use version::{DbVersionSource, Version, VersionSource};

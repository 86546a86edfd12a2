//! # rigor-core
//!
//! Shared plumbing for the Rigor test-support crates.
//!
//! This crate provides:
//! - The YAML configuration layer consumed by the database fixtures
//! - Test logging bootstrap on top of `tracing-subscriber`
//! - Scoped injection of test values with restore-on-drop

pub mod config;
pub mod inject;
pub mod logging;

pub use config::{ConfigError, DataSetConfig, IdentifierCase, RigorConfig, VersionSourceConfig};
pub use inject::{InjectionGuard, RestoreMode, RestoreScope, Slot};
pub use logging::init_test_logging;

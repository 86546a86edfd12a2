//! Loads a [`DataSet`] into a database.
//!
//! With the default [`LoadStrategy::Refresh`] every row is first written with
//! an `update` keyed on the table's primary-key columns; when that touches no
//! row it is inserted instead. Primary keys are looked up once per table.
//! Loading stops at the first failing row.

use crate::connection::{Connection, DataSource, SqlValue};
use crate::dataset::{ColumnValue, DataSet, Row, ValueResolver, Variables};
use crate::error::{ConfigurationError, LoadError, RowError};
use rigor_core::DataSetConfig;
use tracing::{debug, info};

/// How rows are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Update by primary key, insert when nothing was updated.
    #[default]
    Refresh,
    /// Always insert.
    Insert,
}

/// Row counts of a completed load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub updated: usize,
    pub inserted: usize,
    /// Rows without columns.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Updated,
    Inserted,
}

/// A resolved column of the row being written.
struct Assignment<'a> {
    name: &'a str,
    value: ColumnValue,
}

/// Statement text plus its parameters in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

#[derive(Debug, Clone)]
pub struct DataSetLoader {
    resolver: ValueResolver,
    case_sensitive: bool,
    strategy: LoadStrategy,
}

impl DataSetLoader {
    pub fn new(config: &DataSetConfig) -> Result<Self, ConfigurationError> {
        Ok(Self {
            resolver: ValueResolver::new(config)?,
            case_sensitive: config.case_sensitive,
            strategy: LoadStrategy::default(),
        })
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> LoadStrategy {
        self.strategy
    }

    /// Writes every non-empty row of `data_set` using one connection.
    pub fn load(
        &self,
        data_source: &dyn DataSource,
        data_set: &DataSet,
        variables: &Variables,
    ) -> Result<LoadSummary, LoadError> {
        let conn = data_source.connection().map_err(LoadError::Connection)?;
        let mut summary = LoadSummary::default();

        for schema in data_set.schemas() {
            for table in schema.tables() {
                let mut primary_keys = None;
                for row in table.rows() {
                    if row.is_empty() {
                        summary.skipped += 1;
                        continue;
                    }

                    let outcome = self
                        .load_row(
                            conn.as_ref(),
                            schema.name(),
                            table.name(),
                            row,
                            variables,
                            &mut primary_keys,
                        )
                        .map_err(|source| LoadError::Row {
                            schema: schema.name().to_string(),
                            table: table.name().to_string(),
                            row: row.to_string(),
                            variables: variables.to_string(),
                            source,
                        })?;
                    match outcome {
                        RowOutcome::Updated => summary.updated += 1,
                        RowOutcome::Inserted => summary.inserted += 1,
                    }
                }
            }
        }

        info!(
            updated = summary.updated,
            inserted = summary.inserted,
            skipped = summary.skipped,
            "Data set loaded"
        );
        Ok(summary)
    }

    fn load_row(
        &self,
        conn: &dyn Connection,
        schema: &str,
        table: &str,
        row: &Row,
        variables: &Variables,
        primary_keys: &mut Option<Vec<String>>,
    ) -> Result<RowOutcome, RowError> {
        let assignments = row
            .columns()
            .iter()
            .map(|column| {
                Ok(Assignment {
                    name: column.name(),
                    value: self.resolver.resolve(column, variables)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigurationError>>()?;

        if self.strategy == LoadStrategy::Refresh {
            if primary_keys.is_none() {
                *primary_keys = Some(lookup_primary_keys(conn, schema, table)?);
            }
            let primary_keys = primary_keys.as_deref().unwrap_or_default();
            let update = self.update_statement(schema, table, &assignments, primary_keys)?;
            let updated = conn.execute(&update.sql, &update.params)?;
            if updated > 0 {
                debug!(schema, table, row = %row, "Row updated");
                return Ok(RowOutcome::Updated);
            }
        }

        let insert = insert_statement(schema, table, &assignments);
        conn.execute(&insert.sql, &insert.params)?;
        debug!(schema, table, row = %row, "Row inserted");
        Ok(RowOutcome::Inserted)
    }

    fn update_statement(
        &self,
        schema: &str,
        table: &str,
        assignments: &[Assignment<'_>],
        primary_keys: &[String],
    ) -> Result<Statement, ConfigurationError> {
        let key_assignments = primary_keys
            .iter()
            .map(|key| {
                assignments.iter().find(|assignment| {
                    if self.case_sensitive {
                        assignment.name == key
                    } else {
                        assignment.name.eq_ignore_ascii_case(key)
                    }
                })
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ConfigurationError::MissingPrimaryKeyColumns {
                schema: schema.to_string(),
                table: table.to_string(),
                primary_keys: primary_keys.to_vec(),
            })?;

        let set = join_assignments(assignments, ", ");
        let condition = join_assignments(key_assignments.iter().copied(), " and ");
        let params = assignments
            .iter()
            .chain(key_assignments.iter().copied())
            .filter_map(|assignment| assignment.value.parameter().cloned())
            .collect();

        Ok(Statement {
            sql: format!("update {schema}.{table} set {set} where {condition}"),
            params,
        })
    }
}

fn lookup_primary_keys(
    conn: &dyn Connection,
    schema: &str,
    table: &str,
) -> Result<Vec<String>, RowError> {
    let keys = conn.primary_key_columns(Some(schema), table)?;
    if keys.is_empty() {
        return Err(ConfigurationError::NoPrimaryKeys {
            schema: schema.to_string(),
            table: table.to_string(),
        }
        .into());
    }
    debug!(schema, table, primary_keys = ?keys, "Primary keys resolved");
    Ok(keys)
}

fn join_assignments<'a, 'b: 'a, I>(assignments: I, separator: &str) -> String
where
    I: IntoIterator<Item = &'a Assignment<'b>>,
{
    assignments
        .into_iter()
        .map(|assignment| format!("{}={}", assignment.name, assignment.value.placeholder()))
        .collect::<Vec<_>>()
        .join(separator)
}

fn insert_statement(schema: &str, table: &str, assignments: &[Assignment<'_>]) -> Statement {
    let columns = assignments
        .iter()
        .map(|assignment| assignment.name)
        .collect::<Vec<_>>()
        .join(",");
    let values = assignments
        .iter()
        .map(|assignment| assignment.value.placeholder())
        .collect::<Vec<_>>()
        .join(",");
    let params = assignments
        .iter()
        .filter_map(|assignment| assignment.value.parameter().cloned())
        .collect();

    Statement {
        sql: format!("insert into {schema}.{table} ({columns}) values ({values})"),
        params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment<'a>(name: &'a str, value: ColumnValue) -> Assignment<'a> {
        Assignment { name, value }
    }

    fn text(value: &str) -> ColumnValue {
        ColumnValue::Parameter(SqlValue::from(value))
    }

    #[test]
    fn test_update_statement() {
        let loader = DataSetLoader::new(&DataSetConfig::default()).unwrap();
        let assignments = vec![
            assignment("column_1", text("1")),
            assignment("column_2", text("2")),
        ];
        let statement = loader
            .update_statement("my_schema", "table_a", &assignments, &["COLUMN_1".to_string()])
            .unwrap();

        assert_eq!(
            statement.sql,
            "update my_schema.table_a set column_1=?, column_2=? where column_1=?"
        );
        assert_eq!(
            statement.params,
            vec![SqlValue::from("1"), SqlValue::from("2"), SqlValue::from("1")]
        );
    }

    #[test]
    fn test_update_statement_case_sensitive_key() {
        let config = DataSetConfig {
            case_sensitive: true,
            ..DataSetConfig::default()
        };
        let loader = DataSetLoader::new(&config).unwrap();
        let assignments = vec![assignment("column_1", text("1"))];
        let err = loader
            .update_statement("s", "t", &assignments, &["COLUMN_1".to_string()])
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingPrimaryKeyColumns { .. }));
    }

    #[test]
    fn test_expressions_are_inlined() {
        let assignments = vec![
            assignment("column_1", ColumnValue::Expression("sysdate".to_string())),
            assignment("column_2", ColumnValue::Expression("null".to_string())),
            assignment("column_3", text("=escaped")),
        ];
        let statement = insert_statement("my_schema", "table_a", &assignments);
        assert_eq!(
            statement.sql,
            "insert into my_schema.table_a (column_1,column_2,column_3) values (sysdate,null,?)"
        );
        assert_eq!(statement.params, vec![SqlValue::from("=escaped")]);
    }

    #[test]
    fn test_strategy_defaults_to_refresh() {
        let loader = DataSetLoader::new(&DataSetConfig::default()).unwrap();
        assert_eq!(loader.strategy(), LoadStrategy::Refresh);
        assert_eq!(
            loader.with_strategy(LoadStrategy::Insert).strategy(),
            LoadStrategy::Insert
        );
    }
}

//! In-memory data set model and column value resolution.
//!
//! A [`DataSet`] is a tree of schemas, tables, rows and columns built by a
//! fixture (or a parser). Column values are raw fixture text; the
//! [`ValueResolver`] turns them into bound parameters or inline SQL
//! expressions:
//!
//! | raw value   | result                                   |
//! |-------------|------------------------------------------|
//! | `=sysdate`  | expression `sysdate`, inlined in the SQL |
//! | `==text`    | parameter `"=text"`                      |
//! | `$name`     | replaced by the variable `name` first    |
//! | `$$`        | a literal `$`                            |
//! | other       | text parameter                           |

use crate::connection::SqlValue;
use crate::error::ConfigurationError;
use regex::{Captures, Regex};
use rigor_core::DataSetConfig;
use std::collections::BTreeMap;
use std::fmt;

/// A complete fixture: schemas in load order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSet {
    schemas: Vec<Schema>,
}

impl DataSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schemas.push(schema);
        self
    }

    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    tables: Vec<Table>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_row(mut self, row: Row) -> Self {
        self.rows.push(row);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}

/// An ordered list of columns. A row without columns is skipped on load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<Column>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column holding raw fixture text.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.columns.push(Column::new(name, value));
        self
    }

    /// Adds a column whose value is bound verbatim.
    #[must_use]
    pub fn literal_column(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.columns.push(Column::literal(name, value));
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Looks up a column by name.
    pub fn get(&self, name: &str, case_sensitive: bool) -> Option<&Column> {
        self.columns
            .iter()
            .find(|column| column.has_name(name, case_sensitive))
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, column) in self.columns.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{column}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    value: String,
    is_literal: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            is_literal: false,
        }
    }

    /// A column whose value skips token and variable handling.
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            is_literal: true,
            ..Self::new(name, value)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_literal(&self) -> bool {
        self.is_literal
    }

    pub fn has_name(&self, name: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            self.name == name
        } else {
            self.name.eq_ignore_ascii_case(name)
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=\"{}\"", self.name, self.value)
    }
}

/// Values for `$name` references in column values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    values: BTreeMap<String, String>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `"0"`, `"1"`, ... to the given values.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            values: values
                .into_iter()
                .enumerate()
                .map(|(index, value)| (index.to_string(), value.into()))
                .collect(),
        }
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for Variables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, (name, value)) in self.values.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str("]")
    }
}

/// A resolved column value.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    /// Bound as a `?` parameter.
    Parameter(SqlValue),
    /// Written into the statement text as is.
    Expression(String),
}

impl ColumnValue {
    /// The statement text standing for this value.
    pub fn placeholder(&self) -> &str {
        match self {
            ColumnValue::Parameter(_) => "?",
            ColumnValue::Expression(expression) => expression,
        }
    }

    pub fn parameter(&self) -> Option<&SqlValue> {
        match self {
            ColumnValue::Parameter(value) => Some(value),
            ColumnValue::Expression(_) => None,
        }
    }
}

/// Applies the configured literal and variable tokens to raw column values.
#[derive(Debug, Clone)]
pub struct ValueResolver {
    literal_token: char,
    variable_token: char,
    variable_pattern: Regex,
}

impl ValueResolver {
    pub fn new(config: &DataSetConfig) -> Result<Self, ConfigurationError> {
        let token = regex::escape(&config.variable_token.to_string());
        let variable_pattern = Regex::new(&format!(r"{token}(?:({token})|\{{(\w+)\}}|(\w+))"))?;
        Ok(Self {
            literal_token: config.literal_token,
            variable_token: config.variable_token,
            variable_pattern,
        })
    }

    pub fn resolve(
        &self,
        column: &Column,
        variables: &Variables,
    ) -> Result<ColumnValue, ConfigurationError> {
        if column.is_literal() {
            return Ok(ColumnValue::Parameter(SqlValue::from(column.value())));
        }

        let value = self.substitute(column.value(), variables)?;
        let Some(rest) = value.strip_prefix(self.literal_token) else {
            return Ok(ColumnValue::Parameter(SqlValue::Text(value)));
        };
        if rest.starts_with(self.literal_token) {
            Ok(ColumnValue::Parameter(SqlValue::from(rest)))
        } else if rest.trim().is_empty() {
            Err(ConfigurationError::EmptyExpression {
                column: column.name().to_string(),
            })
        } else {
            Ok(ColumnValue::Expression(rest.to_string()))
        }
    }

    /// Replaces variable references in `value`.
    pub fn substitute(&self, value: &str, variables: &Variables) -> Result<String, ConfigurationError> {
        if !value.contains(self.variable_token) {
            return Ok(value.to_string());
        }

        let mut undefined = None;
        let substituted = self
            .variable_pattern
            .replace_all(value, |captures: &Captures<'_>| {
                if captures.get(1).is_some() {
                    return self.variable_token.to_string();
                }
                let name = captures
                    .get(2)
                    .or_else(|| captures.get(3))
                    .map_or("", |name| name.as_str());
                if let Some(value) = variables.get(name) {
                    value.to_string()
                } else {
                    undefined.get_or_insert_with(|| captures[0].to_string());
                    String::new()
                }
            })
            .into_owned();

        match undefined {
            Some(reference) => Err(ConfigurationError::UndefinedVariable { reference }),
            None => Ok(substituted),
        }
    }
}

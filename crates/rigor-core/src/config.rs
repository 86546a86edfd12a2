//! Configuration for the database fixtures.
//!
//! Every section carries `#[serde(default)]`, so an empty document (or a
//! missing file section) yields the defaults below.
//!
//! ```yaml
//! dataset:
//!   literal_token: "="
//!   variable_token: "$"
//! version_source:
//!   table_name: db_version
//!   identifier_case: upper
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration text is not valid YAML for this schema.
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigorConfig {
    pub dataset: DataSetConfig,
    pub version_source: VersionSourceConfig,
}

impl RigorConfig {
    /// Parses configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads and parses a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }
}

/// How data set values are interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSetConfig {
    /// Leading marker of a literal SQL expression (`=sysdate`). Doubled, it escapes itself.
    pub literal_token: char,
    /// Leading marker of a variable reference (`$name`). Doubled, it escapes itself.
    pub variable_token: char,
    /// Whether column names are compared case-sensitively against primary keys.
    pub case_sensitive: bool,
}

impl Default for DataSetConfig {
    fn default() -> Self {
        Self {
            literal_token: '=',
            variable_token: '$',
            case_sensitive: false,
        }
    }
}

/// Case the target database folds unquoted identifiers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierCase {
    #[default]
    Upper,
    Lower,
    Preserve,
}

impl IdentifierCase {
    /// Converts an identifier to this case.
    pub fn apply(self, identifier: &str) -> String {
        match self {
            IdentifierCase::Upper => identifier.to_uppercase(),
            IdentifierCase::Lower => identifier.to_lowercase(),
            IdentifierCase::Preserve => identifier.to_string(),
        }
    }
}

/// Names of the table and columns holding the database version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionSourceConfig {
    pub table_name: String,
    pub version_index_column: String,
    pub version_timestamp_column: String,
    pub last_update_succeeded_column: String,
    pub code_scripts_timestamp_column: String,
    pub last_code_update_succeeded_column: String,
    /// Schema holding the version table. `None` uses the connection's default.
    pub schema: Option<String>,
    pub identifier_case: IdentifierCase,
    /// Column type used when the table or a column has to be created.
    pub long_data_type: String,
}

impl Default for VersionSourceConfig {
    fn default() -> Self {
        Self {
            table_name: "db_version".to_string(),
            version_index_column: "version_index".to_string(),
            version_timestamp_column: "version_timestamp".to_string(),
            last_update_succeeded_column: "last_updated_succeeded".to_string(),
            code_scripts_timestamp_column: "code_scripts_timestamp".to_string(),
            last_code_update_succeeded_column: "last_code_update_succeeded".to_string(),
            schema: None,
            identifier_case: IdentifierCase::Upper,
            long_data_type: "BIGINT".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = RigorConfig::from_yaml_str("").unwrap();
        assert_eq!(config, RigorConfig::default());
        assert_eq!(config.dataset.literal_token, '=');
        assert_eq!(config.version_source.table_name, "db_version");
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let yaml = r#"
version_source:
  table_name: schema_version
  identifier_case: lower
"#;
        let config = RigorConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.version_source.table_name, "schema_version");
        assert_eq!(config.version_source.identifier_case, IdentifierCase::Lower);
        assert_eq!(config.version_source.version_index_column, "version_index");
        assert_eq!(config.dataset, DataSetConfig::default());
    }

    #[test]
    fn test_custom_tokens() {
        let yaml = r#"
dataset:
  literal_token: "!"
  variable_token: "%"
  case_sensitive: true
"#;
        let config = RigorConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.dataset.literal_token, '!');
        assert_eq!(config.dataset.variable_token, '%');
        assert!(config.dataset.case_sensitive);
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let err = RigorConfig::from_yaml_str("dataset: [1, 2").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rigor.yml");
        std::fs::write(&path, "version_source:\n  long_data_type: INTEGER\n").unwrap();

        let config = RigorConfig::from_file(&path).unwrap();
        assert_eq!(config.version_source.long_data_type, "INTEGER");
    }

    #[test]
    fn test_missing_file_names_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing.yml");

        let err = RigorConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("missing.yml"));
    }

    #[test]
    fn test_identifier_case() {
        assert_eq!(IdentifierCase::Upper.apply("db_Version"), "DB_VERSION");
        assert_eq!(IdentifierCase::Lower.apply("db_Version"), "db_version");
        assert_eq!(IdentifierCase::Preserve.apply("db_Version"), "db_Version");
    }
}

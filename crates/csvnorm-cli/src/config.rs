use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use csvnorm_core::value::{DATE_FORMAT, TIMESTAMP_FORMAT};
use csvnorm_core::SuffixTidier;

use crate::CliError;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "csvnorm.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvnormConfig {
    /// Suffix stripped from foreign key columns to name their display column.
    pub tidy_suffix: String,
    pub date_format: String,
    pub timestamp_format: String,
    /// Namespace used for bare table names. Engine default when unset.
    pub default_schema: Option<String>,
    pub log: LogConfig,
}

impl Default for CsvnormConfig {
    fn default() -> Self {
        Self {
            tidy_suffix: SuffixTidier::default().suffix().to_string(),
            date_format: DATE_FORMAT.to_string(),
            timestamp_format: TIMESTAMP_FORMAT.to_string(),
            default_schema: None,
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "info".to_string(),
            file: None,
        }
    }
}

impl CsvnormConfig {
    /// Load `path`, or `csvnorm.toml` when present, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(content)?)
    }

    pub fn tidier(&self) -> SuffixTidier {
        SuffixTidier::new(self.tidy_suffix.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = CsvnormConfig::from_toml("").unwrap();
        assert_eq!(config, CsvnormConfig::default());
        assert_eq!(config.tidy_suffix, "_id");
        assert_eq!(config.log.format, LogFormat::Pretty);
    }

    #[test]
    fn partial_file_overrides_fields() {
        let config = CsvnormConfig::from_toml(
            r#"
            tidy_suffix = "_fk"
            default_schema = "app"

            [log]
            format = "json"
            file = "csvnorm.log"
            "#,
        )
        .unwrap();

        assert_eq!(config.tidy_suffix, "_fk");
        assert_eq!(config.default_schema.as_deref(), Some("app"));
        assert_eq!(config.date_format, "%Y-%m-%d");
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.file, Some(PathBuf::from("csvnorm.log")));
    }

    #[test]
    fn unknown_log_format_is_an_error() {
        let err = CsvnormConfig::from_toml("[log]\nformat = \"xml\"\n").unwrap_err();
        assert!(matches!(err, CliError::TomlDecode(_)));
    }
}

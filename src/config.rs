//! Configuration for the index converter.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::builder::ContinuationPolicy;
use crate::error::{IndexError, Result};
use crate::store::ConflictPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Conversion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Field delimiter for delimited output (a single byte, e.g. "\t" or ",")
    #[serde(default = "default_field_delimiter")]
    pub field_delimiter: String,

    /// Separator between ancestor labels in the idx_text column
    #[serde(default = "default_index_delimiter")]
    pub index_delimiter: String,

    /// Where page-only continuation lines are merged
    #[serde(default)]
    pub continuation: ContinuationPolicy,
}

fn default_field_delimiter() -> String {
    "\t".to_string()
}

fn default_index_delimiter() -> String {
    "|".to_string()
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            field_delimiter: default_field_delimiter(),
            index_delimiter: default_index_delimiter(),
            continuation: ContinuationPolicy::default(),
        }
    }
}

impl ConvertConfig {
    /// The field delimiter as the single byte the CSV writer expects.
    pub fn field_delimiter_byte(&self) -> Result<u8> {
        match self.field_delimiter.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(IndexError::InvalidConfig(format!(
                "field delimiter must be a single ASCII character, got {:?}",
                self.field_delimiter
            ))),
        }
    }
}

/// Relational store settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Behaviour when a publication or index row already exists
    #[serde(default)]
    pub conflict: ConflictPolicy,
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Conversion settings
    #[serde(default)]
    pub convert: ConvertConfig,

    /// Store settings
    #[serde(default)]
    pub store: StoreConfig,
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    convert: Option<ConvertFileSection>,
    store: Option<StoreFileSection>,
}

#[derive(Debug, Deserialize)]
struct ConvertFileSection {
    field_delimiter: Option<String>,
    index_delimiter: Option<String>,
    continuation: Option<ContinuationPolicy>,
}

#[derive(Debug, Deserialize)]
struct StoreFileSection {
    conflict: Option<ConflictPolicy>,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (INDEX_FIELD_DELIMITER, INDEX_PATH_DELIMITER,
    ///    INDEX_CONTINUATION, INDEX_CONFLICT)
    /// 2. Config file (~/.config/book-index/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                log::debug!("loading config from {}", config_path.display());
                config = Self::load_from_file(&config_path)?;
            }
        }

        if let Ok(delimiter) = env::var("INDEX_FIELD_DELIMITER") {
            config.convert.field_delimiter = delimiter;
        }

        if let Ok(delimiter) = env::var("INDEX_PATH_DELIMITER") {
            config.convert.index_delimiter = delimiter;
        }

        if let Ok(policy) = env::var("INDEX_CONTINUATION") {
            config.convert.continuation = policy.parse()?;
        }

        if let Ok(conflict) = env::var("INDEX_CONFLICT") {
            config.store.conflict = conflict.parse()?;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
        Self::from_yaml(&content)
    }

    fn from_yaml(content: &str) -> Result<Self> {
        let file_config: ConfigFile = serde_yaml::from_str(content)
            .map_err(|e| IndexError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Config::default();

        if let Some(convert) = file_config.convert {
            if let Some(field_delimiter) = convert.field_delimiter {
                config.convert.field_delimiter = field_delimiter;
            }
            if let Some(index_delimiter) = convert.index_delimiter {
                config.convert.index_delimiter = index_delimiter;
            }
            if let Some(continuation) = convert.continuation {
                config.convert.continuation = continuation;
            }
        }

        if let Some(store) = file_config.store {
            if let Some(conflict) = store.conflict {
                config.store.conflict = conflict;
            }
        }

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "book-index")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate delimiter settings.
    pub fn validate(&self) -> Result<()> {
        self.convert.field_delimiter_byte()?;

        if self.convert.index_delimiter.is_empty() {
            return Err(IndexError::InvalidConfig(
                "index delimiter must not be empty. Set INDEX_PATH_DELIMITER or add to config file."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.convert.field_delimiter, "\t");
        assert_eq!(config.convert.index_delimiter, "|");
        assert_eq!(config.convert.continuation, ContinuationPolicy::Pages);
        assert_eq!(config.store.conflict, ConflictPolicy::Fail);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_multibyte_field_delimiter() {
        let mut config = Config::default();
        config.convert.field_delimiter = "||".to_string();
        assert!(config.validate().is_err());

        config.convert.field_delimiter = ",".to_string();
        assert_eq!(config.convert.field_delimiter_byte().unwrap(), b',');
    }

    #[test]
    fn test_validate_rejects_empty_index_delimiter() {
        let mut config = Config::default();
        config.convert.index_delimiter.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let yaml = "convert:\n  index_delimiter: \" > \"\n  continuation: note\nstore:\n  conflict: replace\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.convert.index_delimiter, " > ");
        assert_eq!(config.convert.field_delimiter, "\t");
        assert_eq!(config.convert.continuation, ContinuationPolicy::Note);
        assert_eq!(config.store.conflict, ConflictPolicy::Replace);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "convert:\n  field_delimiter: \",\"\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.convert.field_delimiter, ",");
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            Config::from_yaml("convert: [unclosed"),
            Err(IndexError::Config(_))
        ));
    }
}

//! Error types for the index converter.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors that can occur while parsing or exporting an index.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A line did not match the index line grammar.
    #[error("line {line} could not be parsed: '{content}'")]
    Unparseable { line: usize, content: String },

    /// A continuation line appeared before any entry it could extend.
    #[error("line {line} continues an entry, but no entry precedes it: '{content}'")]
    OrphanContinuation { line: usize, content: String },

    /// The tree file does not exist.
    #[error("Index file not found at '{0}'")]
    IndexNotFound(PathBuf),

    /// SQLite error.
    #[error("Database error: {0}")]
    Database(String),

    /// A value required by the relational store was not supplied.
    #[error("'{0}' is required for database output")]
    MissingField(&'static str),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl IndexError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Source line number for parse failures.
    pub fn line(&self) -> Option<usize> {
        match self {
            IndexError::Unparseable { line, .. } | IndexError::OrphanContinuation { line, .. } => {
                Some(*line)
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for IndexError {
    fn from(err: csv::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for IndexError {
    fn from(err: rusqlite::Error) -> Self {
        IndexError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_errors_carry_line() {
        let err = IndexError::Unparseable {
            line: 7,
            content: "\t.;".to_string(),
        };
        assert_eq!(err.line(), Some(7));
        assert!(err.to_string().contains("line 7"));

        let err = IndexError::OrphanContinuation {
            line: 1,
            content: "See also Cats".to_string(),
        };
        assert_eq!(err.line(), Some(1));

        assert_eq!(IndexError::MissingField("pubkey").line(), None);
    }
}

//! Raw input lines of a text index.
//!
//! An index file holds one entry or note per line, with leading tabs
//! giving the nesting depth. Lines are cleaned here but not interpreted.

use crate::error::{IndexError, Result};
use std::path::{Path, PathBuf};

/// A single input line with its 1-indexed line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// 1-indexed line number in the source file.
    pub number: usize,
    /// Line content with surrounding spaces and line endings removed.
    /// Leading tabs are kept since they carry the depth.
    pub content: String,
}

impl RawLine {
    /// Create a line, cleaning its content.
    pub fn new(number: usize, raw: &str) -> Self {
        Self {
            number,
            content: clean_line(raw).to_string(),
        }
    }
}

/// An index document as an ordered list of lines.
#[derive(Debug, Clone)]
pub struct IndexDocument {
    /// Document name (file stem when loaded from disk).
    pub name: String,
    /// Original file path (if loaded from file).
    pub path: Option<PathBuf>,
    /// Lines in document order.
    pub lines: Vec<RawLine>,
}

impl IndexDocument {
    /// Load a text index file.
    pub fn from_text_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_string();

        let mut document = Self::from_text(name, &content);
        document.path = Some(path.to_path_buf());
        log::debug!(
            "read {} lines from {}",
            document.line_count(),
            path.display()
        );
        Ok(document)
    }

    /// Create a document from raw text content.
    pub fn from_text(name: impl Into<String>, content: &str) -> Self {
        let lines = content
            .lines()
            .enumerate()
            .map(|(i, line)| RawLine::new(i + 1, line))
            .collect();

        Self {
            name: name.into(),
            path: None,
            lines,
        }
    }

    /// Get total number of lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

/// Strip spaces from both ends and any trailing whitespace, keeping the tab indent.
fn clean_line(raw: &str) -> &str {
    raw.trim_start_matches(' ').trim_end()
}

//! Line tokenizer.
//!
//! Splits one cleaned index line into its depth, entry text, "See" note and
//! trailing page specification, then classifies the line. The grammar is a
//! single anchored pattern; lazy quantifiers on `text` and `note` keep page
//! numbers and notes out of the entry label wherever a split is possible.
//!
//! Lines whose trailing page field is malformed (`Weapons\txii`,
//! `Weapons, 12a`) fall back to a second pattern: the entry is kept and its
//! pages are treated as absent.

use crate::document::RawLine;
use crate::error::{IndexError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Line grammar, in order:
/// tabs, text (lazy, no tabs), separator, "See" note (lazy), separator, pages to end of line.
/// A separator is `.` or `,` followed by whitespace, or bare whitespace.
static LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?P<tabs>\t*)",
        r"(?P<text>[^\t]*?)",
        r"(?:[.,]?\s+)?",
        r"(?P<note>See\b.+?)?",
        r"(?:[.,]?\s+)?",
        r"(?P<pages>[0-9][0-9,\s-]*)?$",
    ))
    .unwrap()
});

/// Fallback grammar for a page field that is not a page specification.
/// The residue is a list of page-like tokens (digit-led, or lowercase roman
/// numerals) behind a tab or a `.`/`,` separator, plus any tab-separated
/// trailing field.
static MALFORMED_PAGES_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?P<tabs>\t*)",
        r"(?P<text>[^\t]*?)",
        r"(?:(?:\t+|[.,]\s+)(?P<note>See\b[^\t]*?))?",
        r"(?:\t+|[.,]\s+)",
        r"(?P<residue>",
        r"(?:[0-9][0-9A-Za-z-]*|[ivxlcdm]+(?:-[ivxlcdm]+)?)",
        r"(?:[, ]+(?:[0-9][0-9A-Za-z-]*|[ivxlcdm]+(?:-[ivxlcdm]+)?))*",
        r"(?:\t.*)?",
        r")$",
    ))
    .unwrap()
});

/// What a tokenized line contributes to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// Starts a new entry.
    NewEntry,
    /// A bare "See also ..." line extending the previous entry's note.
    ContinuationNote,
    /// A pages-only line extending the previous entry.
    PageContinuation,
    /// Nothing but indentation; skipped.
    Blank,
}

/// The parsed shape of one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// 1-indexed source line number.
    pub line: usize,
    /// The line as read, for diagnostics.
    pub raw: String,
    /// Number of leading tabs.
    pub depth: usize,
    /// Entry label; empty for continuation lines.
    pub text: String,
    /// Note starting with "See".
    pub note: Option<String>,
    /// Raw page specification, e.g. "12-14, 20".
    pub pages: Option<String>,
    /// Line classification.
    pub class: LineClass,
}

struct Fields {
    depth: usize,
    text: String,
    note: Option<String>,
    pages: Option<String>,
}

impl Fields {
    fn from_captures(caps: &regex::Captures<'_>) -> Self {
        Self {
            depth: caps.name("tabs").map_or(0, |m| m.as_str().len()),
            text: caps.name("text").map_or("", |m| m.as_str()).trim().to_string(),
            note: caps
                .name("note")
                .map(|m| m.as_str().trim().to_string())
                .filter(|n| !n.is_empty()),
            pages: caps.name("pages").and_then(|m| normalize_pages(m.as_str())),
        }
    }

    fn has_label(&self) -> bool {
        self.text.chars().any(char::is_alphanumeric)
    }
}

/// Tokenize and classify a single line.
///
/// A malformed trailing page field drops the pages and keeps the entry.
/// Fails with [`IndexError::Unparseable`] when the line fits neither
/// grammar or its label holds no letters or digits.
pub fn tokenize(line: &RawLine) -> Result<Token> {
    let unparseable = || IndexError::Unparseable {
        line: line.number,
        content: line.content.clone(),
    };

    let fields = match LINE_REGEX.captures(&line.content) {
        Some(caps) => {
            let strict = Fields::from_captures(&caps);
            if strict.pages.is_none() && !strict.text.is_empty() {
                malformed_pages(line).unwrap_or(strict)
            } else {
                strict
            }
        }
        None => malformed_pages(line).ok_or_else(unparseable)?,
    };

    if !fields.text.is_empty() && !fields.has_label() {
        return Err(unparseable());
    }

    let Fields {
        depth,
        text,
        note,
        pages,
    } = fields;
    let class = classify(&text, note.as_deref(), pages.as_deref());
    if class != LineClass::Blank {
        log::debug!("line {}: depth {} {:?}", line.number, depth, class);
    }

    Ok(Token {
        line: line.number,
        raw: line.content.clone(),
        depth,
        text,
        note,
        pages,
        class,
    })
}

/// Match the fallback grammar; the residue is logged and discarded.
fn malformed_pages(line: &RawLine) -> Option<Fields> {
    let caps = MALFORMED_PAGES_REGEX.captures(&line.content)?;
    let mut fields = Fields::from_captures(&caps);
    if !fields.has_label() {
        return None;
    }
    fields.pages = None;

    let residue = caps.name("residue").map_or("", |m| m.as_str());
    log::warn!(
        "line {}: ignoring malformed page field {:?} for {:?}",
        line.number,
        residue,
        fields.text
    );
    Some(fields)
}

fn classify(text: &str, note: Option<&str>, pages: Option<&str>) -> LineClass {
    if !text.is_empty() {
        return LineClass::NewEntry;
    }
    match (note, pages) {
        (Some(note), _) if is_see_note(note) => LineClass::ContinuationNote,
        (Some(_), _) | (None, Some(_)) => LineClass::PageContinuation,
        (None, None) => LineClass::Blank,
    }
}

/// True when the note begins with "see", ignoring case.
pub fn is_see_note(note: &str) -> bool {
    note.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("see"))
}

/// Trim whitespace and dangling separators; an empty result means no pages.
fn normalize_pages(raw: &str) -> Option<String> {
    let trimmed = raw.trim_end_matches(|c: char| c == ',' || c == '-' || c.is_whitespace());
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

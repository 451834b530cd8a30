//! Hierarchy builder.
//!
//! Turns tokenized lines into a flat, document-ordered list of numbered
//! entries. Each entry carries its position as a per-depth sibling ordinal
//! path (`1.2.1`) and as a breadcrumb of ancestor labels.
//!
//! The rolling counters live in a [`HierarchyBuilder`] owned by a single
//! parse; documents parsed in parallel each get their own builder.

use crate::document::{IndexDocument, RawLine};
use crate::error::{IndexError, Result};
use crate::tokenizer::{LineClass, Token, tokenize};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Separator used when a continuation note is merged into an existing note.
pub const NOTE_SEPARATOR: &str = "; ";

/// Separator used when continuation pages are merged into existing pages.
pub const PAGE_SEPARATOR: &str = ", ";

/// Where a pages-only continuation line is merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContinuationPolicy {
    /// Append to the previous entry's pages.
    #[default]
    Pages,
    /// Append to the previous entry's note.
    Note,
}

impl FromStr for ContinuationPolicy {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pages" | "page" => Ok(ContinuationPolicy::Pages),
            "note" | "notes" => Ok(ContinuationPolicy::Note),
            other => Err(IndexError::InvalidConfig(format!(
                "unknown continuation policy '{}', expected 'pages' or 'note'",
                other
            ))),
        }
    }
}

/// Options for a parse run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Merge target for pages-only continuation lines.
    pub continuation: ContinuationPolicy,
}

/// A numbered index entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// 1-indexed source line the entry started on.
    pub line: usize,
    /// Nesting depth (0 for top level).
    pub depth: usize,
    /// Entry label.
    pub text: String,
    /// Note, including merged continuation notes.
    pub note: Option<String>,
    /// Raw page specification, including merged continuation pages.
    pub pages: Option<String>,
    /// Sibling ordinal per depth, `numeric_path[d]` for d in 0..=depth.
    pub numeric_path: Vec<usize>,
    /// Label per depth, `label_path[d]` for d in 0..=depth.
    pub label_path: Vec<String>,
}

impl IndexEntry {
    /// Numeric path joined by `.`, e.g. "1.2".
    pub fn idx(&self) -> String {
        self.numeric_path
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Label path joined by `delimiter`, e.g. "Weapons|Swords".
    pub fn idx_text(&self, delimiter: &str) -> String {
        self.label_path.join(delimiter)
    }

    fn append_note(&mut self, extra: &str) {
        self.note = Some(join_optional(self.note.take(), extra, NOTE_SEPARATOR));
    }

    fn append_pages(&mut self, extra: &str) {
        self.pages = Some(join_optional(self.pages.take(), extra, PAGE_SEPARATOR));
    }
}

fn join_optional(existing: Option<String>, extra: &str, separator: &str) -> String {
    match existing {
        Some(current) if !current.is_empty() => format!("{}{}{}", current, separator, extra),
        _ => extra.to_string(),
    }
}

/// Accumulates entries from tokens in document order.
#[derive(Debug, Default)]
pub struct HierarchyBuilder {
    options: ParseOptions,
    counters: Vec<usize>,
    labels: Vec<String>,
    entries: Vec<IndexEntry>,
}

impl HierarchyBuilder {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with custom options.
    pub fn with_options(options: ParseOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    /// Feed one token.
    pub fn push(&mut self, token: Token) -> Result<()> {
        let class = token.class;
        match class {
            LineClass::NewEntry => self.push_entry(token),
            LineClass::ContinuationNote => {
                let prev = self.last_entry(&token)?;
                if let Some(note) = &token.note {
                    prev.append_note(note);
                }
                if let Some(pages) = &token.pages {
                    prev.append_pages(pages);
                }
                log::debug!("line {}: note merged into '{}'", token.line, prev.text);
            }
            LineClass::PageContinuation => {
                let policy = self.options.continuation;
                let prev = self.last_entry(&token)?;
                if let Some(extra) = token.pages.as_deref().or(token.note.as_deref()) {
                    match policy {
                        ContinuationPolicy::Pages => prev.append_pages(extra),
                        ContinuationPolicy::Note => prev.append_note(extra),
                    }
                }
                log::debug!(
                    "line {}: continuation merged into '{}' ({:?})",
                    token.line,
                    prev.text,
                    policy
                );
            }
            LineClass::Blank => {
                log::trace!("line {}: blank, skipped", token.line);
            }
        }
        Ok(())
    }

    fn push_entry(&mut self, token: Token) {
        let depth = token.depth;

        if self.counters.len() > depth {
            // Deeper branches are closed once an entry at a shallower depth appears.
            self.counters[depth] += 1;
            self.counters.truncate(depth + 1);
            self.labels.truncate(depth + 1);
            self.labels[depth] = token.text.clone();
        } else {
            // Depth jumps are accepted; skipped levels start at ordinal 1.
            self.counters.resize(depth, 1);
            self.labels.resize(depth, String::new());
            self.counters.push(1);
            self.labels.push(token.text.clone());
        }

        log::debug!(
            "line {}: entry '{}' at depth {} numbered {:?}",
            token.line,
            token.text,
            depth,
            self.counters
        );

        self.entries.push(IndexEntry {
            line: token.line,
            depth,
            text: token.text,
            note: token.note,
            pages: token.pages,
            numeric_path: self.counters.clone(),
            label_path: self.labels.clone(),
        });
    }

    fn last_entry(&mut self, token: &Token) -> Result<&mut IndexEntry> {
        self.entries
            .last_mut()
            .ok_or_else(|| IndexError::OrphanContinuation {
                line: token.line,
                content: token.raw.clone(),
            })
    }

    /// Number of entries emitted so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entry has been emitted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finish the run and return the entries.
    pub fn finish(self) -> Vec<IndexEntry> {
        self.entries
    }
}

/// Parse lines into numbered entries.
///
/// Stops at the first unparseable line or orphan continuation; no partial
/// result is returned.
pub fn parse_lines<'a, I>(lines: I, options: ParseOptions) -> Result<Vec<IndexEntry>>
where
    I: IntoIterator<Item = &'a RawLine>,
{
    let mut builder = HierarchyBuilder::with_options(options);
    for line in lines {
        let token = tokenize(line)?;
        builder.push(token)?;
    }
    if builder.is_empty() {
        log::warn!("no index entries found");
    } else {
        log::info!("parsed {} entries", builder.len());
    }
    Ok(builder.finish())
}

/// Parse a whole document.
pub fn parse_document(document: &IndexDocument, options: ParseOptions) -> Result<Vec<IndexEntry>> {
    log::debug!("parsing document '{}'", document.name);
    parse_lines(&document.lines, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(lines: &[&str]) -> Result<Vec<IndexEntry>> {
        parse_with(lines, ParseOptions::default())
    }

    fn parse_with(lines: &[&str], options: ParseOptions) -> Result<Vec<IndexEntry>> {
        let text = lines.join("\n");
        let doc = IndexDocument::from_text("test", &text);
        parse_document(&doc, options)
    }

    #[test]
    fn test_weapons_scenario() {
        let entries = parse(&["Weapons\t5", "\tSwords\t6-8", "\tBows\t9"]).unwrap();
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].depth, 0);
        assert_eq!(entries[0].text, "Weapons");
        assert_eq!(entries[0].pages.as_deref(), Some("5"));
        assert_eq!(entries[0].numeric_path, vec![1]);

        assert_eq!(entries[1].depth, 1);
        assert_eq!(entries[1].text, "Swords");
        assert_eq!(entries[1].pages.as_deref(), Some("6-8"));
        assert_eq!(entries[1].numeric_path, vec![1, 1]);

        assert_eq!(entries[2].text, "Bows");
        assert_eq!(entries[2].pages.as_deref(), Some("9"));
        assert_eq!(entries[2].numeric_path, vec![1, 2]);
        assert_eq!(entries[2].label_path, vec!["Weapons", "Bows"]);
        assert_eq!(entries[2].idx(), "1.2");
        assert_eq!(entries[2].idx_text("|"), "Weapons|Bows");
    }

    #[test]
    fn test_continuation_note_merges() {
        let entries = parse(&["Animals", "\tDogs, 12", "\tSee also Cats"]).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].text, "Dogs");
        assert_eq!(entries[1].note.as_deref(), Some("See also Cats"));
    }

    #[test]
    fn test_continuation_notes_join_with_separator() {
        let entries = parse(&["Dragons. See Wyverns", "\tSee also Drakes"]).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].note.as_deref(),
            Some("See Wyverns; See also Drakes")
        );
    }

    #[test]
    fn test_depth_regression_resets_counters() {
        let entries = parse(&["A", "\tB", "\t\tC", "\tD", "\t\tE", "F", "\tG"]).unwrap();
        let paths: Vec<String> = entries.iter().map(|e| e.idx()).collect();
        assert_eq!(paths, vec!["1", "1.1", "1.1.1", "1.2", "1.2.1", "2", "2.1"]);
        assert_eq!(entries[4].label_path, vec!["A", "D", "E"]);
    }

    #[test]
    fn test_paths_cover_every_depth() {
        let entries = parse(&["A", "\tB", "\t\tC", "D", "\tE", "\tF"]).unwrap();
        for entry in &entries {
            assert_eq!(entry.numeric_path.len(), entry.depth + 1);
            assert_eq!(entry.label_path.len(), entry.depth + 1);
        }
        assert_eq!(entries[5].numeric_path, vec![2, 2]);
    }

    #[test]
    fn test_depth_jump_fills_intermediate_levels() {
        let entries = parse(&["A", "\t\t\tDeep", "\tB"]).unwrap();
        assert_eq!(entries[1].numeric_path, vec![1, 1, 1, 1]);
        assert_eq!(entries[1].label_path, vec!["A", "", "", "Deep"]);
        assert_eq!(entries[2].numeric_path, vec![1, 2]);
        assert_eq!(entries[2].label_path, vec!["A", "B"]);
    }

    #[test]
    fn test_page_continuation_policies() {
        let lines = ["Gems, 12", "\t14, 16"];

        let entries = parse(&lines).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].pages.as_deref(), Some("12, 14, 16"));
        assert_eq!(entries[0].note, None);

        let options = ParseOptions {
            continuation: ContinuationPolicy::Note,
        };
        let entries = parse_with(&lines, options).unwrap();
        assert_eq!(entries[0].pages.as_deref(), Some("12"));
        assert_eq!(entries[0].note.as_deref(), Some("14, 16"));
    }

    #[test]
    fn test_continuation_note_with_pages_merges_both() {
        let entries = parse(&["Dogs, 12", "\tSee Cats, 14"]).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].note.as_deref(), Some("See Cats"));
        assert_eq!(entries[0].pages.as_deref(), Some("12, 14"));
    }

    #[test]
    fn test_note_policy_appends_to_existing_note() {
        let options = ParseOptions {
            continuation: ContinuationPolicy::Note,
        };
        let entries = parse_with(&["Dragons. See Wyverns", "\t14"], options).unwrap();
        assert_eq!(entries[0].note.as_deref(), Some("See Wyverns; 14"));
        assert_eq!(entries[0].pages, None);
    }

    #[test]
    fn test_malformed_pages_do_not_abort() {
        let entries = parse(&["Weapons\txii", "\tSwords, 6b", "\tBows\t9"]).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].pages, None);
        assert_eq!(entries[1].text, "Swords");
        assert_eq!(entries[1].pages, None);
        assert_eq!(entries[1].idx_text("|"), "Weapons|Swords");
        assert_eq!(entries[2].pages.as_deref(), Some("9"));
    }

    #[test]
    fn test_builder_len_and_empty() {
        let mut builder = HierarchyBuilder::new();
        assert!(builder.is_empty());
        builder.push(tokenize(&RawLine::new(1, "")).unwrap()).unwrap();
        assert!(builder.is_empty());
        builder.push(tokenize(&RawLine::new(2, "A 1")).unwrap()).unwrap();
        assert_eq!(builder.len(), 1);
        assert!(parse(&["", "\t"]).unwrap().is_empty());
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let entries = parse(&["A", "", "\t", "B"]).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].idx(), "2");
    }

    #[test]
    fn test_unparseable_line_aborts() {
        let err = parse(&["A", "\tB 3", "\t.;", "C"]).unwrap_err();
        assert!(matches!(err, IndexError::Unparseable { line: 3, .. }));
    }

    #[test]
    fn test_orphan_continuation_is_fatal() {
        let err = parse(&["See also Cats", "Animals"]).unwrap_err();
        assert!(matches!(err, IndexError::OrphanContinuation { line: 1, .. }));

        let err = parse(&["", "\t12"]).unwrap_err();
        assert!(matches!(err, IndexError::OrphanContinuation { line: 2, .. }));
    }

    #[test]
    fn test_entry_count_matches_new_entry_lines() {
        let lines = ["A 1", "\tSee B", "\tC 2", "\t\t3", "D"];
        let entries = parse(&lines).unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_continuation_policy_from_str() {
        assert_eq!("Pages".parse::<ContinuationPolicy>().unwrap(), ContinuationPolicy::Pages);
        assert_eq!("note".parse::<ContinuationPolicy>().unwrap(), ContinuationPolicy::Note);
        assert!("both".parse::<ContinuationPolicy>().is_err());
    }

    #[test]
    fn test_separate_builders_do_not_share_state() {
        let mut first = HierarchyBuilder::new();
        let mut second = HierarchyBuilder::new();
        for line in [RawLine::new(1, "A"), RawLine::new(2, "B")] {
            first.push(tokenize(&line).unwrap()).unwrap();
        }
        second.push(tokenize(&RawLine::new(1, "X")).unwrap()).unwrap();

        assert_eq!(first.finish()[1].numeric_path, vec![2]);
        assert_eq!(second.finish()[0].numeric_path, vec![1]);
    }
}

//! Book index converter - parses tab-indented text indices into numbered hierarchies.
//!
//! Indices of the form below (leading tabs give the depth) are parsed into
//! a flat list of entries, each carrying its numeric path and label path,
//! and exported as delimited tables, nested JSON trees, or SQLite rows.
//!
//! ```text
//! Weapons	5
//! 	Swords	6-8
//! 	Bows, 9
//! 	See also Armor
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use book_index::{
//!     builder::{parse_document, ParseOptions},
//!     document::IndexDocument,
//!     table::TableProjector,
//!     tree::IndexTree,
//! };
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let document = IndexDocument::from_text_file(Path::new("index.txt"))?;
//!     let entries = parse_document(&document, ParseOptions::default())?;
//!
//!     let tree = IndexTree::from_entries(&document.name, &entries);
//!     println!("{}", tree.to_json()?);
//!
//!     for row in TableProjector::new("|").project(&entries) {
//!         println!("{} {}", row.idx, row.idx_text);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **IndexDocument**: cleaned raw lines
//! - **tokenizer**: line grammar and classification
//! - **HierarchyBuilder**: rolling per-depth numbering and continuation merges
//! - **tree**: nested nodes for JSON export
//! - **TableProjector**: flat rows for delimited and SQLite output
//! - **IndexStore**: SQLite tables and lookup queries

pub mod builder;
pub mod config;
pub mod document;
pub mod error;
pub mod persistence;
pub mod store;
pub mod table;
pub mod tokenizer;
pub mod tree;

// Re-export commonly used types
pub use builder::{
    ContinuationPolicy, HierarchyBuilder, IndexEntry, ParseOptions, parse_document, parse_lines,
};
pub use config::Config;
pub use document::{IndexDocument, RawLine};
pub use error::{IndexError, Result};
pub use persistence::{OutputFormat, load_table, load_tree, save_table, save_tree};
pub use store::{ConflictPolicy, IndexStore, LookupQuery, Publication};
pub use table::{TableProjector, TableRow, read_delimited};
pub use tokenizer::{LineClass, Token, tokenize};
pub use tree::{IndexTree, Pages, TreeNode, assemble, assemble_tree};

//! SQLite index store.
//!
//! Two tables: `pub` holds one row of bibliographic metadata per
//! publication key, `indices` holds the projected entries keyed by
//! `(pubkey, version, idx)`. The lookup queries back the `search` command.

use crate::error::{IndexError, Result};
use crate::table::TableRow;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS indices (
    pubkey TEXT,
    version TEXT,
    entry TEXT,
    idx TEXT,
    idx_text TEXT,
    page TEXT,
    notes TEXT,
    PRIMARY KEY (pubkey, version, idx)
);
CREATE TABLE IF NOT EXISTS pub (
    pubkey TEXT PRIMARY KEY,
    author TEXT,
    title TEXT,
    abbr TEXT,
    edition TEXT,
    publisher TEXT,
    month TEXT,
    year INTEGER,
    volume TEXT,
    series TEXT,
    address TEXT,
    note TEXT,
    isbn TEXT,
    link TEXT,
    adjust INTEGER DEFAULT (0)
);
";

/// What to do when an inserted row collides with an existing key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Abort the insert.
    #[default]
    Fail,
    /// Keep the existing row.
    Ignore,
    /// Overwrite the existing row.
    Replace,
}

impl ConflictPolicy {
    fn insert_verb(self) -> &'static str {
        match self {
            ConflictPolicy::Fail => "INSERT",
            ConflictPolicy::Ignore => "INSERT OR IGNORE",
            ConflictPolicy::Replace => "INSERT OR REPLACE",
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fail" => Ok(ConflictPolicy::Fail),
            "ignore" => Ok(ConflictPolicy::Ignore),
            "replace" => Ok(ConflictPolicy::Replace),
            other => Err(IndexError::InvalidConfig(format!(
                "unknown conflict policy '{}', expected 'fail', 'ignore' or 'replace'",
                other
            ))),
        }
    }
}

/// Bibliographic metadata for one publication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    /// Unique key, e.g. "phb5e".
    pub pubkey: String,
    pub author: Option<String>,
    /// Full title, e.g. "Player's Handbook".
    pub title: Option<String>,
    /// Abbreviation, e.g. "PHB".
    pub abbr: Option<String>,
    pub edition: Option<String>,
    pub publisher: Option<String>,
    pub month: Option<String>,
    pub year: Option<i64>,
    pub volume: Option<String>,
    pub series: Option<String>,
    pub address: Option<String>,
    pub note: Option<String>,
    pub isbn: Option<String>,
    /// Path to the publication's PDF.
    pub link: Option<String>,
    /// Offset from printed page numbers to PDF page numbers.
    pub adjust: i64,
}

impl Publication {
    /// Create metadata with only a key.
    pub fn new(pubkey: impl Into<String>) -> Self {
        Self {
            pubkey: pubkey.into(),
            ..Default::default()
        }
    }
}

/// Rows written by one insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertSummary {
    pub pub_rows: usize,
    pub index_rows: usize,
}

/// A publication/version pair as listed for lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicationLabel {
    pub pubkey: String,
    pub version: String,
    /// "Title (version)", falling back to the key when no title is stored.
    pub label: String,
}

/// Filters for [`IndexStore::search`]. `None` matches everything.
#[derive(Debug, Clone)]
pub struct LookupQuery {
    /// Substring of the entry label.
    pub entry: Option<String>,
    /// Substring of the label path.
    pub path: Option<String>,
    /// Exact publication key.
    pub pubkey: Option<String>,
    pub limit: usize,
}

impl Default for LookupQuery {
    fn default() -> Self {
        Self {
            entry: None,
            path: None,
            pubkey: None,
            limit: 50,
        }
    }
}

/// A stored index row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredEntry {
    pub pubkey: String,
    pub version: String,
    pub entry: String,
    pub idx: String,
    pub idx_text: String,
    pub page: Option<String>,
    pub notes: Option<String>,
}

/// Where a publication's pages open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTarget {
    pub link: Option<String>,
    pub adjust: i64,
}

impl PageTarget {
    /// PDF page for a printed page number.
    pub fn pdf_page(&self, printed: i64) -> i64 {
        printed + self.adjust
    }
}

/// SQLite-backed index store.
pub struct IndexStore {
    conn: Connection,
}

impl IndexStore {
    /// Open (or create) a store at the given path.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Insert a publication and its rows in one transaction.
    ///
    /// Constant `pubkey`/`version` columns on the rows are ignored; the
    /// publication key and `version` given here are stored for every row.
    pub fn insert_index(
        &mut self,
        publication: &Publication,
        version: &str,
        rows: &[TableRow],
        conflict: ConflictPolicy,
    ) -> Result<InsertSummary> {
        if publication.pubkey.is_empty() {
            return Err(IndexError::MissingField("pubkey"));
        }
        if version.is_empty() {
            return Err(IndexError::MissingField("version"));
        }

        let verb = conflict.insert_verb();
        let tx = self.conn.transaction()?;

        let pub_rows = tx.execute(
            &format!(
                "{verb} INTO pub (pubkey, author, title, abbr, edition, publisher, month, year, \
                 volume, series, address, note, isbn, link, adjust) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            params![
                publication.pubkey,
                publication.author,
                publication.title,
                publication.abbr,
                publication.edition,
                publication.publisher,
                publication.month,
                publication.year,
                publication.volume,
                publication.series,
                publication.address,
                publication.note,
                publication.isbn,
                publication.link,
                publication.adjust,
            ],
        )?;

        let mut index_rows = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "{verb} INTO indices (pubkey, version, entry, idx, idx_text, page, notes) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ))?;
            for row in rows {
                index_rows += stmt.execute(params![
                    publication.pubkey,
                    version,
                    row.entry,
                    row.idx,
                    row.idx_text,
                    row.page,
                    row.notes,
                ])?;
            }
        }

        tx.commit()?;
        log::info!(
            "stored '{}' ({}): {} pub rows, {} index rows",
            publication.pubkey,
            version,
            pub_rows,
            index_rows
        );

        Ok(InsertSummary {
            pub_rows,
            index_rows,
        })
    }

    /// List stored publication/version pairs, optionally filtered by label substring.
    pub fn publications(&self, filter: Option<&str>) -> Result<Vec<PublicationLabel>> {
        let pattern = filter.map(like_pattern);
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT a.pubkey, a.version, \
                    COALESCE(b.title, a.pubkey) || ' (' || a.version || ')' AS label \
             FROM indices AS a LEFT JOIN pub AS b ON a.pubkey = b.pubkey \
             WHERE ?1 IS NULL OR COALESCE(b.title, a.pubkey) || ' (' || a.version || ')' LIKE ?1 ESCAPE '\\' \
             ORDER BY label",
        )?;

        let labels = stmt
            .query_map(params![pattern], |row| {
                Ok(PublicationLabel {
                    pubkey: row.get(0)?,
                    version: row.get(1)?,
                    label: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(labels)
    }

    /// Search stored entries in document order.
    pub fn search(&self, query: &LookupQuery) -> Result<Vec<StoredEntry>> {
        let entry = query.entry.as_deref().map(like_pattern);
        let path = query.path.as_deref().map(like_pattern);
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);

        let mut stmt = self.conn.prepare(
            "SELECT pubkey, version, entry, idx, idx_text, page, notes FROM indices \
             WHERE (?1 IS NULL OR entry LIKE ?1 ESCAPE '\\') \
               AND (?2 IS NULL OR idx_text LIKE ?2 ESCAPE '\\') \
               AND (?3 IS NULL OR pubkey = ?3) \
             ORDER BY pubkey, version, rowid \
             LIMIT ?4",
        )?;

        let entries = stmt
            .query_map(params![entry, path, query.pubkey, limit], |row| {
                Ok(StoredEntry {
                    pubkey: row.get(0)?,
                    version: row.get(1)?,
                    entry: row.get(2)?,
                    idx: row.get(3)?,
                    idx_text: row.get(4)?,
                    page: row.get(5)?,
                    notes: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        log::debug!("lookup matched {} entries", entries.len());
        Ok(entries)
    }

    /// Link and page adjustment for a publication.
    pub fn page_target(&self, pubkey: &str) -> Result<Option<PageTarget>> {
        let target = self
            .conn
            .query_row(
                "SELECT link, adjust FROM pub WHERE pubkey = ?1",
                params![pubkey],
                |row| {
                    Ok(PageTarget {
                        link: row.get(0)?,
                        adjust: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                    })
                },
            )
            .optional()?;
        Ok(target)
    }
}

/// Substring pattern for `LIKE ... ESCAPE '\'`; wildcards in `s` match literally.
fn like_pattern(s: &str) -> String {
    let mut pattern = String::with_capacity(s.len() + 2);
    pattern.push('%');
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

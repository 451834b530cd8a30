//! Persistence layer for converted indices.
//!
//! The output format follows the file extension: JSON trees, SQLite
//! databases, or delimited tables for anything else.

use crate::error::{IndexError, Result};
use crate::table::{TableProjector, TableRow, read_delimited};
use crate::tree::IndexTree;
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Output format for a converted index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Nested JSON tree.
    Json,
    /// SQLite database.
    Sqlite,
    /// Delimited table (csv, txt, tsv, ...).
    Delimited,
}

impl OutputFormat {
    /// Determine format from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => OutputFormat::Json,
            Some("db") | Some("sqlite") => OutputFormat::Sqlite,
            _ => OutputFormat::Delimited,
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| IndexError::io(parent, e))?;
        }
    }
    Ok(())
}

/// Save an index tree as a JSON array of root nodes.
pub fn save_tree(tree: &IndexTree, path: &Path) -> Result<()> {
    ensure_parent(path)?;

    let data = serde_json::to_string_pretty(&tree.nodes)
        .map_err(|e| IndexError::Serialization(e.to_string()))?;

    fs::write(path, data).map_err(|e| IndexError::io(path, e))?;
    log::info!("wrote {} tree nodes to {}", tree.node_count(), path.display());

    Ok(())
}

/// Load an index tree from a JSON file.
pub fn load_tree(path: &Path) -> Result<IndexTree> {
    if !path.exists() {
        return Err(IndexError::IndexNotFound(path.to_path_buf()));
    }

    let json_str = fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled");

    IndexTree::from_json(name, &json_str).map_err(|e| IndexError::Serialization(e.to_string()))
}

/// Save rows as a delimited file.
pub fn save_table(
    projector: &TableProjector,
    rows: &[TableRow],
    path: &Path,
    delimiter: u8,
) -> Result<()> {
    ensure_parent(path)?;

    let file = fs::File::create(path).map_err(|e| IndexError::io(path, e))?;
    projector.write_delimited(rows, BufWriter::new(file), delimiter)?;
    log::info!("wrote {} rows to {}", rows.len(), path.display());

    Ok(())
}

/// Load rows from a delimited file written by [`save_table`].
pub fn load_table(path: &Path, delimiter: u8) -> Result<Vec<TableRow>> {
    if !path.exists() {
        return Err(IndexError::IndexNotFound(path.to_path_buf()));
    }

    let file = fs::File::open(path).map_err(|e| IndexError::io(path, e))?;
    let rows = read_delimited(BufReader::new(file), delimiter)?;
    log::info!("read {} rows from {}", rows.len(), path.display());

    Ok(rows)
}

/// Get the size of an output file in bytes.
pub fn file_size(path: &Path) -> Result<u64> {
    let metadata = fs::metadata(path).map_err(|e| IndexError::io(path, e))?;
    Ok(metadata.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeNode;
    use tempfile::TempDir;

    fn create_test_tree() -> IndexTree {
        let mut weapons = TreeNode::new("Weapons").with_idx("1").with_pages("5");
        weapons.add_child(TreeNode::new("Swords").with_idx("1.1").with_pages("6-8"));
        weapons.add_child(TreeNode::new("Bows").with_idx("1.2").with_pages("9, 11"));

        IndexTree::new("weapons", vec![weapons, TreeNode::new("Armor").with_idx("2")])
    }

    #[test]
    fn test_save_and_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("weapons.json");

        let original = create_test_tree();
        save_tree(&original, &path).unwrap();

        let loaded = load_tree(&path).unwrap();
        assert_eq!(loaded, original);
        assert!(file_size(&path).unwrap() > 0);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(OutputFormat::from_path(Path::new("out.json")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_path(Path::new("out.db")), OutputFormat::Sqlite);
        assert_eq!(OutputFormat::from_path(Path::new("out.sqlite")), OutputFormat::Sqlite);
        assert_eq!(OutputFormat::from_path(Path::new("out.csv")), OutputFormat::Delimited);
        assert_eq!(OutputFormat::from_path(Path::new("out")), OutputFormat::Delimited);
    }

    #[test]
    fn test_load_nonexistent() {
        let result = load_tree(Path::new("/nonexistent/tree.json"));
        assert!(matches!(result, Err(IndexError::IndexNotFound(_))));
    }

    #[test]
    fn test_save_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.csv");

        let projector = TableProjector::default();
        let rows = vec![TableRow {
            pubkey: None,
            version: None,
            entry: "Weapons".to_string(),
            idx: "1".to_string(),
            idx_text: "Weapons".to_string(),
            page: Some("5, 7".to_string()),
            notes: None,
        }];
        save_table(&projector, &rows, &path, b',').unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "entry,idx,idx_text,page,notes\nWeapons,1,Weapons,\"5, 7\",\n");
    }

    #[test]
    fn test_table_reloads_into_store() {
        use crate::store::{ConflictPolicy, IndexStore, LookupQuery, Publication};

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.tsv");

        let document = crate::document::IndexDocument::from_text(
            "weapons",
            "Weapons\t5\n\tSwords\t6-8\n\tSee also Axes",
        );
        let entries =
            crate::builder::parse_document(&document, crate::builder::ParseOptions::default())
                .unwrap();
        let projector = TableProjector::default().with_version(Some("original".to_string()));
        let rows = projector.project(&entries);
        save_table(&projector, &rows, &path, b'\t').unwrap();

        let loaded = load_table(&path, b'\t').unwrap();
        assert_eq!(loaded, rows);

        let mut store = IndexStore::in_memory().unwrap();
        let summary = store
            .insert_index(&Publication::new("phb5e"), "original", &loaded, ConflictPolicy::Fail)
            .unwrap();
        assert_eq!(summary.index_rows, 2);

        let found = store.search(&LookupQuery::default()).unwrap();
        assert_eq!(found[1].notes.as_deref(), Some("See also Axes"));
    }

    #[test]
    fn test_load_table_nonexistent() {
        let result = load_table(Path::new("/nonexistent/index.csv"), b',');
        assert!(matches!(result, Err(IndexError::IndexNotFound(_))));
    }
}

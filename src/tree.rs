//! Tree structure for nested index export.
//!
//! Groups the flat entry list into parent/children nesting by depth. The
//! serialized node shape is `{text?, note?, p?, idx?, children?}`; empty
//! fields are left out.

use crate::builder::IndexEntry;
use serde::{Deserialize, Serialize};

/// Page references of a node: a single value, or a list when the raw
/// specification holds several comma-separated values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Pages {
    Single(String),
    Many(Vec<String>),
}

impl Pages {
    /// Split a raw page specification on commas.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut values: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();

        match values.len() {
            0 => None,
            1 => values.pop().map(Pages::Single),
            _ => Some(Pages::Many(values)),
        }
    }

    /// The individual page values.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Pages::Single(value) => vec![value.as_str()],
            Pages::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// Join back into a raw specification.
    pub fn to_raw(&self) -> String {
        self.values().join(", ")
    }
}

/// A node in the index tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Entry label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,

    /// Note, e.g. "See also Cats".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Page references.
    #[serde(rename = "p", skip_serializing_if = "Option::is_none")]
    pub pages: Option<Pages>,

    /// Numeric path (e.g., "1", "1.2", "1.2.3").
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub idx: String,

    /// Sub-entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Create a new tree node.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            note: None,
            pages: None,
            idx: String::new(),
            children: Vec::new(),
        }
    }

    /// Set the numeric path.
    pub fn with_idx(mut self, idx: impl Into<String>) -> Self {
        self.idx = idx.into();
        self
    }

    /// Set the pages from a raw specification.
    pub fn with_pages(mut self, raw: &str) -> Self {
        self.pages = Pages::parse(raw);
        self
    }

    /// Build a childless node from a flat entry.
    pub fn from_entry(entry: &IndexEntry) -> Self {
        Self {
            text: entry.text.clone(),
            note: entry.note.clone().filter(|n| !n.is_empty()),
            pages: entry.pages.as_deref().and_then(Pages::parse),
            idx: entry.idx(),
            children: Vec::new(),
        }
    }

    /// Add a child node.
    pub fn add_child(&mut self, child: TreeNode) {
        self.children.push(child);
    }

    /// Recursively count all nodes in this subtree (including self).
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|n| n.node_count()).sum::<usize>()
    }

    /// Find all leaf nodes (nodes without children).
    pub fn leaves(&self) -> Vec<&TreeNode> {
        if self.children.is_empty() {
            vec![self]
        } else {
            self.children.iter().flat_map(|n| n.leaves()).collect()
        }
    }

    /// Find a node by text (case-insensitive).
    pub fn find_by_text(&self, text: &str) -> Option<&TreeNode> {
        if self.text.eq_ignore_ascii_case(text) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_by_text(text))
    }

    /// Format the subtree as a string for display.
    pub fn format_tree(&self, indent: usize) -> String {
        let prefix = "  ".repeat(indent);
        let mut result = format!("{}{} {}", prefix, self.idx, self.text);

        if let Some(pages) = &self.pages {
            result.push_str(&format!(" [p. {}]", pages.to_raw()));
        }
        if let Some(note) = &self.note {
            result.push_str(&format!(" ({})", note));
        }
        result.push('\n');

        for child in &self.children {
            result.push_str(&child.format_tree(indent + 1));
        }

        result
    }
}

/// A complete index tree (wrapper around root nodes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTree {
    /// Index name.
    pub name: String,

    /// Root-level nodes.
    pub nodes: Vec<TreeNode>,
}

impl IndexTree {
    /// Create a new index tree.
    pub fn new(name: impl Into<String>, nodes: Vec<TreeNode>) -> Self {
        Self {
            name: name.into(),
            nodes,
        }
    }

    /// Assemble a tree from flat entries.
    pub fn from_entries(name: impl Into<String>, entries: &[IndexEntry]) -> Self {
        Self::new(name, assemble_tree(entries))
    }

    /// Get total node count.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().map(|n| n.node_count()).sum()
    }

    /// Count entries without sub-entries.
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().map(|n| n.leaves().len()).sum()
    }

    /// Get maximum depth of the tree.
    pub fn max_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            1 + node.children.iter().map(depth).max().unwrap_or(0)
        }

        self.nodes.iter().map(depth).max().unwrap_or(0)
    }

    /// Find a node by text.
    pub fn find_by_text(&self, text: &str) -> Option<&TreeNode> {
        self.nodes.iter().find_map(|node| node.find_by_text(text))
    }

    /// Format the entire tree for display.
    pub fn format(&self) -> String {
        let mut result = format!("Index: {} ({} entries)\n", self.name, self.node_count());
        result.push_str(&"─".repeat(50));
        result.push('\n');

        for node in &self.nodes {
            result.push_str(&node.format_tree(0));
        }

        result
    }

    /// Convert the root nodes to a JSON array string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.nodes)
    }

    /// Parse root nodes from a JSON array string.
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(name, serde_json::from_str(json)?))
    }

    /// Flatten back into document-ordered entries.
    ///
    /// Paths are derived from each node's position among its siblings, so a
    /// tree assembled from well-formed input reproduces the original paths.
    /// Source line numbers are not kept in the tree and are reported as 0.
    pub fn flatten(&self) -> Vec<IndexEntry> {
        let mut entries = Vec::new();
        let mut stack: Vec<(&TreeNode, Vec<usize>, Vec<String>)> = Vec::new();

        push_siblings(&mut stack, &self.nodes, &[], &[]);

        while let Some((node, numeric_path, label_path)) = stack.pop() {
            push_siblings(&mut stack, &node.children, &numeric_path, &label_path);
            entries.push(IndexEntry {
                line: 0,
                depth: numeric_path.len() - 1,
                text: node.text.clone(),
                note: node.note.clone(),
                pages: node.pages.as_ref().map(Pages::to_raw),
                numeric_path,
                label_path,
            });
        }

        entries
    }
}

/// Push siblings in reverse so they pop in document order.
fn push_siblings<'a>(
    stack: &mut Vec<(&'a TreeNode, Vec<usize>, Vec<String>)>,
    siblings: &'a [TreeNode],
    numeric_path: &[usize],
    label_path: &[String],
) {
    for (i, node) in siblings.iter().enumerate().rev() {
        let mut numbers = numeric_path.to_vec();
        numbers.push(i + 1);
        let mut labels = label_path.to_vec();
        labels.push(node.text.clone());
        stack.push((node, numbers, labels));
    }
}

/// Assemble the entries at `depth` and below into nodes.
///
/// Scanning stops at the first entry shallower than `depth`. Each entry
/// becomes a child of the nearest preceding entry with a smaller depth, or
/// a root when there is none.
pub fn assemble(entries: &[IndexEntry], depth: usize) -> Vec<TreeNode> {
    let mut roots = Vec::new();
    let mut open: Vec<(usize, TreeNode)> = Vec::new();

    for entry in entries.iter().take_while(|e| e.depth >= depth) {
        close_to(&mut open, &mut roots, entry.depth);
        open.push((entry.depth, TreeNode::from_entry(entry)));
    }
    close_to(&mut open, &mut roots, 0);

    roots
}

/// Assemble the whole entry list into root nodes.
pub fn assemble_tree(entries: &[IndexEntry]) -> Vec<TreeNode> {
    assemble(entries, 0)
}

/// Close every open node at `depth` or deeper, attaching it to its parent.
fn close_to(open: &mut Vec<(usize, TreeNode)>, roots: &mut Vec<TreeNode>, depth: usize) {
    while let Some(&(top, _)) = open.last() {
        if top < depth {
            break;
        }
        let Some((_, node)) = open.pop() else {
            break;
        };
        match open.last_mut() {
            Some((_, parent)) => parent.add_child(node),
            None => roots.push(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ParseOptions, parse_document};
    use crate::document::IndexDocument;

    fn entries(text: &str) -> Vec<IndexEntry> {
        parse_document(&IndexDocument::from_text("test", text), ParseOptions::default()).unwrap()
    }

    #[test]
    fn test_pages_shape() {
        assert_eq!(Pages::parse("5"), Some(Pages::Single("5".to_string())));
        assert_eq!(Pages::parse("6-8"), Some(Pages::Single("6-8".to_string())));
        assert_eq!(
            Pages::parse("12, 14-16"),
            Some(Pages::Many(vec!["12".to_string(), "14-16".to_string()]))
        );
        assert_eq!(Pages::parse(" , "), None);
    }

    #[test]
    fn test_assemble_nests_by_depth() {
        let entries = entries("Weapons\t5\n\tSwords\t6-8\n\tBows\t9\nArmor 10");
        let tree = IndexTree::from_entries("test", &entries);

        assert_eq!(tree.nodes.len(), 2);
        assert_eq!(tree.nodes[0].children.len(), 2);
        assert_eq!(tree.nodes[0].children[1].idx, "1.2");
        assert!(tree.nodes[1].children.is_empty());
        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.max_depth(), 2);
    }

    #[test]
    fn test_assemble_from_depth_stops_at_shallower_entry() {
        let entries = entries("A\n\tB\n\t\tC\n\tD\nE\n\tF");
        let children = assemble(&entries[1..], 1);

        assert_eq!(children.len(), 2);
        assert_eq!(children[0].text, "B");
        assert_eq!(children[0].children[0].text, "C");
        assert_eq!(children[1].text, "D");
    }

    #[test]
    fn test_depth_jump_attaches_to_nearest_ancestor() {
        let entries = entries("A\n\t\tDeep\n\tB");
        let nodes = assemble_tree(&entries);

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].children.len(), 2);
        assert_eq!(nodes[0].children[0].text, "Deep");
        assert_eq!(nodes[0].children[0].idx, "1.1.1");
    }

    #[test]
    fn test_leading_deeper_entry_becomes_root() {
        let entries = entries("\tA\nB\n\tC");
        let nodes = assemble_tree(&entries);

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].text, "A");
        assert!(nodes[0].children.is_empty());
        assert_eq!(nodes[1].text, "B");
        assert_eq!(nodes[1].children[0].text, "C");
    }

    #[test]
    fn test_json_omits_empty_fields() {
        let entries = entries("Animals\n\tDogs, 12, 14\n\tSee also Cats");
        let tree = IndexTree::from_entries("test", &entries);
        let value: serde_json::Value = serde_json::from_str(&tree.to_json().unwrap()).unwrap();

        let expected = serde_json::json!([
            {
                "text": "Animals",
                "idx": "1",
                "children": [
                    {"text": "Dogs", "note": "See also Cats", "p": ["12", "14"], "idx": "1.1"}
                ]
            }
        ]);
        assert_eq!(value, expected);
    }

    #[test]
    fn test_json_roundtrip() {
        let entries = entries("Weapons\t5\n\tSwords\t6-8\n\tBows\t9");
        let tree = IndexTree::from_entries("test", &entries);

        let parsed = IndexTree::from_json("test", &tree.to_json().unwrap()).unwrap();
        assert_eq!(parsed, tree);
    }

    #[test]
    fn test_flatten_matches_flat_paths() {
        let entries = entries("A 1\n\tB 2\n\t\tC 3, 4\n\tD\nE\n\tSee also A\n\tF 9");
        let tree = IndexTree::from_entries("test", &entries);
        let flattened = tree.flatten();

        assert_eq!(flattened.len(), entries.len());
        for (flat, original) in flattened.iter().zip(&entries) {
            assert_eq!(flat.idx(), original.idx());
            assert_eq!(flat.idx_text("|"), original.idx_text("|"));
            assert_eq!(flat.pages, original.pages);
            assert_eq!(flat.note, original.note);
        }
    }

    #[test]
    fn test_find_and_format() {
        let entries = entries("Weapons\t5\n\tSwords\t6-8");
        let tree = IndexTree::from_entries("weapons", &entries);

        assert!(tree.find_by_text("swords").is_some());
        assert!(tree.find_by_text("Shields").is_none());

        let formatted = tree.format();
        assert!(formatted.contains("Index: weapons (2 entries)"));
        assert!(formatted.contains("  1.1 Swords [p. 6-8]"));
    }

    #[test]
    fn test_leaves() {
        let mut parent = TreeNode::new("Weapons").with_idx("1");
        parent.add_child(TreeNode::new("Swords").with_pages("6-8"));
        parent.add_child(TreeNode::new("Bows"));

        assert_eq!(parent.node_count(), 3);
        assert_eq!(parent.leaves().len(), 2);

        let tree = IndexTree::from_entries("test", &entries("A\n\tB\n\tC\nD"));
        assert_eq!(tree.leaf_count(), 3);
    }
}

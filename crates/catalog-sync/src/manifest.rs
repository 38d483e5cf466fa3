//! Catalog manifest: the JSON description of a catalog tree to sync.
//!
//! ```json
//! {
//!   "nodes": [{
//!     "kind": "database",
//!     "label": "dwh",
//!     "parent": "Acme",
//!     "statements": [{"STATEMENT_LABEL": "engine", "STATEMENT_VALUE": "postgres"}],
//!     "children": [{"kind": "schema", "label": "dwh.sales"}]
//!   }]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use catalog_core::{DesiredStatement, NodeKind};

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestNode {
    pub kind: NodeKind,
    pub label: String,
    /// Parent label. Inside a tree it defaults to the enclosing node.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub statements: Vec<DesiredStatement>,
    #[serde(default)]
    pub children: Vec<ManifestNode>,
}

impl ManifestNode {
    /// Number of nodes in this subtree, itself included.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(ManifestNode::size).sum::<usize>()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub nodes: Vec<ManifestNode>,
}

impl Manifest {
    pub fn from_json(text: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(text)
            .map_err(|e| SyncError::Manifest(format!("invalid manifest JSON: {e}")))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().map(ManifestNode::size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check the tree shape: children are of the next kind down, and every
    /// node's parent label (explicit or derived) names its enclosing node.
    pub fn validate(&self) -> Result<()> {
        let mut stack: Vec<(&ManifestNode, Option<&ManifestNode>)> =
            self.nodes.iter().map(|n| (n, None)).collect();

        while let Some((node, enclosing)) = stack.pop() {
            let parent = match enclosing {
                None => node.kind.parent_label(&node.label, node.parent.as_deref()),
                Some(outer) => {
                    if outer.kind.child() != Some(node.kind) {
                        return Err(SyncError::Manifest(format!(
                            "{} {:?} cannot hold {} {:?}",
                            outer.kind, outer.label, node.kind, node.label
                        )));
                    }
                    node.kind.parent_label(
                        &node.label,
                        Some(node.parent.as_deref().unwrap_or(outer.label.as_str())),
                    )
                }
            }
            .map_err(|e| SyncError::Manifest(e.to_string()))?;

            if let (Some(outer), Some(parent)) = (enclosing, &parent) {
                if parent != &outer.label {
                    return Err(SyncError::Manifest(format!(
                        "{} {:?} names parent {parent:?} but sits under {:?}",
                        node.kind, node.label, outer.label
                    )));
                }
            }

            stack.extend(node.children.iter().map(|child| (child, Some(node))));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: &str = r#"{
        "nodes": [{
            "kind": "database",
            "label": "dwh",
            "parent": "Acme",
            "statements": [{"STATEMENT_LABEL": "engine", "STATEMENT_VALUE": "postgres"}],
            "children": [{
                "kind": "schema",
                "label": "dwh.sales",
                "children": [{
                    "kind": "table",
                    "label": "dwh.sales.orders",
                    "statements": [{"STATEMENT_LABEL": "row_count", "STATEMENT_VALUE": 42}],
                    "children": [
                        {"kind": "column", "label": "dwh.sales.orders.id"},
                        {"kind": "column", "label": "dwh.sales.orders.amount"}
                    ]
                }]
            }]
        }]
    }"#;

    #[test]
    fn test_parse_tree() {
        let manifest = Manifest::from_json(TREE).unwrap();
        assert_eq!(manifest.len(), 5);
        let table = &manifest.nodes[0].children[0].children[0];
        assert_eq!(table.kind, NodeKind::Table);
        assert_eq!(table.statements[0].value, "42");
        assert_eq!(table.children.len(), 2);
    }

    #[test]
    fn test_wrong_child_kind() {
        let text = r#"{"nodes": [{
            "kind": "database", "label": "dwh", "parent": "Acme",
            "children": [{"kind": "table", "label": "dwh.orders"}]
        }]}"#;
        let err = Manifest::from_json(text).unwrap_err();
        assert!(matches!(err, SyncError::Manifest(msg) if msg.contains("cannot hold")));
    }

    #[test]
    fn test_label_prefix_must_match_enclosing_node() {
        let text = r#"{"nodes": [{
            "kind": "schema", "label": "dwh.sales",
            "children": [{"kind": "table", "label": "crm.sales.orders"}]
        }]}"#;
        assert!(matches!(
            Manifest::from_json(text),
            Err(SyncError::Manifest(_))
        ));
    }

    #[test]
    fn test_database_parent_from_enclosing_company() {
        let text = r#"{"nodes": [{
            "kind": "company", "label": "Acme",
            "children": [{"kind": "database", "label": "dwh"}]
        }]}"#;
        assert!(Manifest::from_json(text).is_ok());

        let text = r#"{"nodes": [{
            "kind": "company", "label": "Acme",
            "children": [{"kind": "database", "label": "dwh", "parent": "Globex"}]
        }]}"#;
        assert!(Manifest::from_json(text).is_err());
    }

    #[test]
    fn test_top_level_database_needs_parent() {
        let text = r#"{"nodes": [{"kind": "database", "label": "dwh"}]}"#;
        assert!(Manifest::from_json(text).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, TREE).unwrap();
        assert_eq!(Manifest::load(&path).unwrap().nodes.len(), 1);
        assert!(matches!(
            Manifest::load(&dir.path().join("missing.json")),
            Err(SyncError::Io(_))
        ));
    }
}

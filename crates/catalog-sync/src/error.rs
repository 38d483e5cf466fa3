//! Error types for the catalog-sync crate.

use catalog_core::{CatalogError, NodeKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Graph error: {0}")]
    Graph(#[from] catalog_graph::GraphError),

    #[error(transparent)]
    Core(#[from] CatalogError),

    #[error("Parent {parent:?} of {kind} {label:?} could not be resolved to a single item")]
    ParentResolution {
        kind: NodeKind,
        label: String,
        parent: String,
    },

    #[error("{kind} {label:?} not found")]
    NodeNotFound { kind: NodeKind, label: String },

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;

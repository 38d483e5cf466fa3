//! catalog-core: Shared types, property schema, and configuration for catalog-sync.
//!
//! This crate provides the foundational types used across all catalog-sync components:
//! - Wikibase identifiers (items and properties)
//! - Catalog node kinds (Company, Database, Schema, Table, Column) and their hierarchy
//! - Statement rows: desired input, resolved output, and write-side claims
//! - The property schema binding statement labels to Wikibase properties
//! - Configuration management
//! - Common error types

pub mod config;
pub mod error;
pub mod schema;
pub mod types;

pub use error::CatalogError;
pub use schema::{NodeKindConfig, PropertySchema};
pub use types::{
    ChildItem, Claim, ClaimValue, DesiredStatement, EntityKind, ItemId, NodeKind, PropertyId,
    Provenance, Statement, StatementType, StoredStatement,
};

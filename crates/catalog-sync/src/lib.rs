//! catalog-sync: keeps a Wikibase knowledge base in step with a data catalog.
//!
//! Each catalog node (Company, Database, Schema, Table, Column) is an item.
//! Sync-owned statements are replaced on every run; statements edited by
//! hand are carried through untouched.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod manifest;
pub mod node;
pub mod persist;
pub mod reconcile;
pub mod walk;

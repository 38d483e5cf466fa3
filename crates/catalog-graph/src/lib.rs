//! catalog-graph: Wikibase client for the catalog knowledge base.
//!
//! All reads go through the SPARQL endpoint of the backing triple store;
//! all writes go through the MediaWiki action API with a logged-in session.
//! The sync engine only sees the [`CatalogStore`] trait, implemented here
//! by [`WikibaseClient`] and by the in-memory [`MemoryStore`].

pub mod client;
pub mod memory;
pub mod mutations;
pub mod queries;
pub mod store;

pub use client::{GraphError, WikibaseClient};
pub use memory::MemoryStore;
pub use mutations::WriteReceipt;
pub use queries::{LookupError, LookupOptions};
pub use store::CatalogStore;

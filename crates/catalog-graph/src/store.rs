//! The storage seam between the sync engine and the knowledge base.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use catalog_core::{ChildItem, Claim, ItemId, PropertyId, StatementType, StoredStatement};

use crate::client::{GraphError, WikibaseClient};
use crate::mutations::WriteReceipt;
use crate::queries::LookupOptions;

/// Read and write primitives the sync engine needs from a knowledge base.
///
/// Every call is one round trip; implementations do not retry.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Batched label → id lookup. `Ok(None)` means ambiguous or missing
    /// (already logged); callers treat it as "no such entity".
    async fn resolve_labels(
        &self,
        labels: &BTreeSet<String>,
        options: LookupOptions,
    ) -> Result<Option<BTreeMap<String, String>>, GraphError>;

    /// The single item pointing at `node` through `parent_property`.
    async fn resolve_parent(
        &self,
        node: &ItemId,
        parent_property: &PropertyId,
    ) -> Result<(String, ItemId), GraphError>;

    async fn fetch_statements(
        &self,
        node: &ItemId,
        property: &PropertyId,
        qualifier: &PropertyId,
        label: &str,
        statement_type: StatementType,
    ) -> Result<Vec<StoredStatement>, GraphError>;

    async fn fetch_children(
        &self,
        link_property: &PropertyId,
        node: &ItemId,
    ) -> Result<Vec<ChildItem>, GraphError>;

    async fn create_item(&self, label: &str, claims: &[Claim]) -> Result<ItemId, GraphError>;

    /// Replace the claims under every property in `claims` or `replace`;
    /// a property in `replace` with no claim is cleared.
    async fn update_item(
        &self,
        id: &ItemId,
        claims: &[Claim],
        replace: &BTreeSet<PropertyId>,
    ) -> Result<WriteReceipt, GraphError>;

    async fn delete_item(&self, id: &ItemId) -> Result<(), GraphError>;
}

#[async_trait]
impl CatalogStore for WikibaseClient {
    async fn resolve_labels(
        &self,
        labels: &BTreeSet<String>,
        options: LookupOptions,
    ) -> Result<Option<BTreeMap<String, String>>, GraphError> {
        WikibaseClient::resolve_labels(self, labels, options).await
    }

    async fn resolve_parent(
        &self,
        node: &ItemId,
        parent_property: &PropertyId,
    ) -> Result<(String, ItemId), GraphError> {
        WikibaseClient::resolve_parent(self, node, parent_property).await
    }

    async fn fetch_statements(
        &self,
        node: &ItemId,
        property: &PropertyId,
        qualifier: &PropertyId,
        label: &str,
        statement_type: StatementType,
    ) -> Result<Vec<StoredStatement>, GraphError> {
        WikibaseClient::fetch_statements(self, node, property, qualifier, label, statement_type)
            .await
    }

    async fn fetch_children(
        &self,
        link_property: &PropertyId,
        node: &ItemId,
    ) -> Result<Vec<ChildItem>, GraphError> {
        WikibaseClient::fetch_children(self, link_property, node).await
    }

    async fn create_item(&self, label: &str, claims: &[Claim]) -> Result<ItemId, GraphError> {
        WikibaseClient::create_item(self, label, claims).await
    }

    async fn update_item(
        &self,
        id: &ItemId,
        claims: &[Claim],
        replace: &BTreeSet<PropertyId>,
    ) -> Result<WriteReceipt, GraphError> {
        WikibaseClient::update_item(self, id, claims, replace).await
    }

    async fn delete_item(&self, id: &ItemId) -> Result<(), GraphError> {
        WikibaseClient::delete_item(self, id).await
    }
}

//! In-memory knowledge base implementing [`CatalogStore`].
//!
//! Follows the Wikibase client's write semantics (per-property claim
//! replacement, unique labels) so the sync engine can run without a live
//! Wikibase: in tests, and for offline rehearsals of a manifest.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use catalog_core::{
    ChildItem, Claim, ClaimValue, ItemId, PropertyId, StatementType, StoredStatement,
};

use crate::client::GraphError;
use crate::mutations::{replaced_properties, WriteReceipt};
use crate::queries::{match_labels, report_lookup, single_parent, LookupOptions};
use crate::store::CatalogStore;

#[derive(Debug, Clone)]
struct MemoryItem {
    label: String,
    claims: Vec<Claim>,
}

#[derive(Debug, Default)]
struct State {
    items: BTreeMap<ItemId, MemoryItem>,
    properties: BTreeMap<PropertyId, String>,
    last_item: u64,
    revision: u64,
}

impl State {
    fn create(&mut self, label: &str, claims: &[Claim]) -> Result<ItemId, GraphError> {
        if let Some((id, _)) = self.items.iter().find(|(_, item)| item.label == label) {
            return Err(GraphError::WriteConflict {
                label: label.to_string(),
                info: format!("label already used by {id}"),
            });
        }
        self.last_item += 1;
        let id = ItemId::parse(&format!("Q{}", self.last_item))?;
        self.items.insert(
            id.clone(),
            MemoryItem {
                label: label.to_string(),
                claims: claims.to_vec(),
            },
        );
        Ok(id)
    }

    fn pointing_at<'a>(
        &'a self,
        property: &'a PropertyId,
        target: &'a ItemId,
    ) -> impl Iterator<Item = (&'a ItemId, &'a MemoryItem)> + 'a {
        self.items.iter().filter(move |(_, item)| {
            item.claims.iter().any(|c| {
                &c.property == property && matches!(&c.value, ClaimValue::Item(v) if v == target)
            })
        })
    }
}

/// A knowledge base held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a property so label lookups can find it.
    pub fn add_property(&self, id: &PropertyId, label: &str) {
        self.lock().properties.insert(id.clone(), label.to_string());
    }

    /// Create an item directly, with the same label check as `create_item`.
    pub fn insert_item(&self, label: &str, claims: Vec<Claim>) -> Result<ItemId, GraphError> {
        self.lock().create(label, &claims)
    }

    pub fn claims(&self, id: &ItemId) -> Vec<Claim> {
        self.lock()
            .items
            .get(id)
            .map(|item| item.claims.clone())
            .unwrap_or_default()
    }

    pub fn label(&self, id: &ItemId) -> Option<String> {
        self.lock().items.get(id).map(|item| item.label.clone())
    }

    pub fn find(&self, label: &str) -> Option<ItemId> {
        self.lock()
            .items
            .iter()
            .find(|(_, item)| item.label == label)
            .map(|(id, _)| id.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn resolve_labels(
        &self,
        labels: &BTreeSet<String>,
        options: LookupOptions,
    ) -> Result<Option<BTreeMap<String, String>>, GraphError> {
        let state = self.lock();
        let rows: Vec<(String, String)> = state
            .items
            .iter()
            .map(|(id, item)| (item.label.clone(), id.to_string()))
            .chain(
                state
                    .properties
                    .iter()
                    .map(|(id, label)| (label.clone(), id.to_string())),
            )
            .collect();
        Ok(report_lookup(match_labels(labels, &rows, options)))
    }

    async fn resolve_parent(
        &self,
        node: &ItemId,
        parent_property: &PropertyId,
    ) -> Result<(String, ItemId), GraphError> {
        let state = self.lock();
        let parents = state
            .pointing_at(parent_property, node)
            .map(|(id, item)| (item.label.clone(), id.to_string()))
            .collect();
        single_parent(node, parent_property, parents)
    }

    async fn fetch_statements(
        &self,
        node: &ItemId,
        property: &PropertyId,
        qualifier: &PropertyId,
        label: &str,
        statement_type: StatementType,
    ) -> Result<Vec<StoredStatement>, GraphError> {
        let state = self.lock();
        let Some(item) = state.items.get(node) else {
            return Ok(Vec::new());
        };
        Ok(item
            .claims
            .iter()
            .filter(|c| &c.property == property)
            .map(|c| {
                let (value, item_label) = match &c.value {
                    ClaimValue::String(text) => (text.clone(), None),
                    ClaimValue::Item(id) => (
                        id.to_string(),
                        state.items.get(id).map(|target| target.label.clone()),
                    ),
                };
                StoredStatement {
                    label: label.to_string(),
                    statement_type,
                    value,
                    item_label,
                    qualifier: c
                        .qualifier
                        .as_ref()
                        .filter(|(p, _)| p == qualifier)
                        .map(|(_, text)| text.clone()),
                }
            })
            .collect())
    }

    async fn fetch_children(
        &self,
        link_property: &PropertyId,
        node: &ItemId,
    ) -> Result<Vec<ChildItem>, GraphError> {
        let state = self.lock();
        Ok(state
            .pointing_at(link_property, node)
            .map(|(id, item)| ChildItem {
                id: id.clone(),
                label: Some(item.label.clone()),
            })
            .collect())
    }

    async fn create_item(&self, label: &str, claims: &[Claim]) -> Result<ItemId, GraphError> {
        let id = self.lock().create(label, claims)?;
        tracing::debug!(id = %id, label, "Created in-memory item");
        Ok(id)
    }

    async fn update_item(
        &self,
        id: &ItemId,
        claims: &[Claim],
        replace: &BTreeSet<PropertyId>,
    ) -> Result<WriteReceipt, GraphError> {
        let mut state = self.lock();
        state.revision += 1;
        let revision = state.revision;
        let item = state
            .items
            .get_mut(id)
            .ok_or_else(|| GraphError::NotFound(id.to_string()))?;

        let written = replaced_properties(claims, replace);
        item.claims.retain(|c| !written.contains(&c.property));
        item.claims.extend_from_slice(claims);

        Ok(WriteReceipt {
            id: id.clone(),
            revision: Some(revision),
        })
    }

    async fn delete_item(&self, id: &ItemId) -> Result<(), GraphError> {
        self.lock()
            .items
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| GraphError::NotFound(id.to_string()))
    }
}

//! Catalog node construction: resolve a node and its parent, read what the
//! knowledge base holds for it, and reconcile that with the desired rows.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use catalog_core::{
    ChildItem, DesiredStatement, ItemId, NodeKind, PropertySchema, Statement, StoredStatement,
};
use catalog_graph::{CatalogStore, LookupOptions};

use crate::error::{Result, SyncError};
use crate::reconcile::{reconcile, StructuralLinks};

/// What the caller wants synced for one node.
#[derive(Debug, Clone)]
pub struct NodeRequest {
    pub kind: NodeKind,
    pub label: String,
    /// Required for Database; optional for Company; checked against the
    /// label prefix for the other kinds.
    pub parent_label: Option<String>,
    pub desired: Vec<DesiredStatement>,
}

/// A node with everything needed to write it. Built fresh for each sync.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogNode {
    pub kind: NodeKind,
    pub label: String,
    pub parent_label: Option<String>,
    pub id: Option<ItemId>,
    pub parent_id: Option<ItemId>,
    pub desired: Vec<DesiredStatement>,
    #[serde(skip)]
    pub existing: Vec<StoredStatement>,
    pub children: Vec<ChildItem>,
    pub resolved: Vec<Statement>,
}

impl CatalogNode {
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Resolve, fetch and reconcile a node.
    pub async fn prepare(
        store: &dyn CatalogStore,
        schema: &PropertySchema,
        request: NodeRequest,
    ) -> Result<Self> {
        Self::prepare_with(store, schema, request, &BTreeMap::new()).await
    }

    /// Like [`CatalogNode::prepare`], consulting `known` (label → id of
    /// items written earlier in the same run) before querying. The query
    /// service indexes new items with a delay, so a freshly created parent
    /// is usually not yet visible to a label lookup.
    pub async fn prepare_with(
        store: &dyn CatalogStore,
        schema: &PropertySchema,
        request: NodeRequest,
        known: &BTreeMap<String, ItemId>,
    ) -> Result<Self> {
        let NodeRequest {
            kind,
            label,
            parent_label,
            desired,
        } = request;
        let config = schema.kind(kind);
        let parent_label = kind.parent_label(&label, parent_label.as_deref())?;

        let id = match known.get(&label) {
            Some(id) => Some(id.clone()),
            None => lookup_item(store, &label).await?,
        };
        if id.is_none() {
            tracing::info!(kind = %kind, label = %label, "No such item, a new one will be created");
        }

        let parent_id = match &parent_label {
            Some(parent) => {
                let found = match known.get(parent) {
                    Some(id) => Some(id.clone()),
                    None => lookup_item(store, parent).await?,
                };
                Some(found.ok_or_else(|| SyncError::ParentResolution {
                    kind,
                    label: label.clone(),
                    parent: parent.clone(),
                })?)
            }
            None => None,
        };

        let mut existing = Vec::new();
        let mut children = Vec::new();
        if let Some(id) = &id {
            for (statement_label, binding) in config.bindings() {
                let rows = store
                    .fetch_statements(
                        id,
                        &binding.property,
                        &schema.global.provenance_qualifier,
                        statement_label,
                        binding.statement_type,
                    )
                    .await?;
                existing.extend(rows);
            }
            if config.repeated_label.is_some() {
                children = store.fetch_children(&schema.global.located_in, id).await?;
            }
        }

        let structural = parent_id.as_ref().map(|parent| StructuralLinks {
            company: &schema.global.company,
            parent,
        });
        let resolved = reconcile(
            config,
            &desired,
            id.as_ref().map(|_| existing.as_slice()),
            &children,
            structural,
        )?;

        tracing::info!(
            kind = %kind,
            label = %label,
            id = ?id.as_ref().map(ItemId::as_str),
            parent = ?parent_label,
            parent_id = ?parent_id.as_ref().map(ItemId::as_str),
            existing = existing.len(),
            children = children.len(),
            resolved = resolved.len(),
            "Prepared node"
        );

        Ok(Self {
            kind,
            label,
            parent_label,
            id,
            parent_id,
            desired,
            existing,
            children,
            resolved,
        })
    }
}

/// Id of the single item labelled `label`, if there is exactly one.
pub async fn lookup_item(store: &dyn CatalogStore, label: &str) -> Result<Option<ItemId>> {
    let labels = BTreeSet::from([label.to_string()]);
    let found = store.resolve_labels(&labels, LookupOptions::items()).await?;
    match found.and_then(|mut map| map.remove(label)) {
        Some(id) => Ok(Some(ItemId::parse(&id)?)),
        None => Ok(None),
    }
}

/// Id of an existing node, or [`SyncError::NodeNotFound`].
pub async fn find_node(store: &dyn CatalogStore, kind: NodeKind, label: &str) -> Result<ItemId> {
    lookup_item(store, label)
        .await?
        .ok_or_else(|| SyncError::NodeNotFound {
            kind,
            label: label.to_string(),
        })
}

/// The item that links to an existing node through the node kind's link
/// property: (parent label, parent id).
pub async fn inspect_parent(
    store: &dyn CatalogStore,
    schema: &PropertySchema,
    kind: NodeKind,
    label: &str,
) -> Result<(String, ItemId)> {
    let link = schema.kind(kind).link_property.as_ref().ok_or_else(|| {
        SyncError::Config(format!("{kind} nodes have no parent link property"))
    })?;
    let id = find_node(store, kind, label).await?;
    Ok(store.resolve_parent(&id, link).await?)
}

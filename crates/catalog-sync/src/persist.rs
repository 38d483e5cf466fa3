//! Knowledge-base persistence: turn resolved statements into claims and
//! create, update or delete the node's item.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use catalog_core::{
    CatalogError, Claim, ClaimValue, ItemId, NodeKind, NodeKindConfig, PropertyId,
    PropertySchema, Statement, StatementType,
};
use catalog_graph::{CatalogStore, WriteReceipt};

use crate::error::Result;
use crate::node::{find_node, CatalogNode};

/// What a write did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum WriteOutcome {
    Created { id: ItemId },
    Updated { receipt: WriteReceipt },
}

impl WriteOutcome {
    pub fn id(&self) -> &ItemId {
        match self {
            Self::Created { id } => id,
            Self::Updated { receipt } => &receipt.id,
        }
    }
}

/// Convert resolved statements to write-side claims, qualifying each with
/// its provenance text as of `at`.
pub fn to_claims(
    config: &NodeKindConfig,
    qualifier: &PropertyId,
    statements: &[Statement],
    at: DateTime<Utc>,
) -> Result<Vec<Claim>> {
    statements
        .iter()
        .map(|s| -> Result<Claim> {
            let binding = config.binding(&s.label).ok_or_else(|| {
                CatalogError::Schema(format!(
                    "{}: no property configured for statement label {:?}",
                    config.kind, s.label
                ))
            })?;
            let value = match s.statement_type {
                StatementType::String => ClaimValue::String(s.value.clone()),
                StatementType::Item => ClaimValue::Item(ItemId::parse(&s.value)?),
            };
            Ok(Claim {
                property: binding.property.clone(),
                value,
                qualifier: Some((qualifier.clone(), s.qualifier.qualifier_text(at))),
            })
        })
        .collect()
}

/// Properties an update must rewrite: every property the node held rows
/// under. One whose rows were all dropped by reconciliation is cleared.
pub fn stored_properties(config: &NodeKindConfig, node: &CatalogNode) -> BTreeSet<PropertyId> {
    node.existing
        .iter()
        .filter_map(|row| config.binding(&row.label))
        .map(|binding| binding.property.clone())
        .collect()
}

/// Write a prepared node: create its item if it is new, otherwise replace
/// the claims of every property it has or had statements for.
pub async fn persist_node(
    store: &dyn CatalogStore,
    schema: &PropertySchema,
    node: &CatalogNode,
) -> Result<WriteOutcome> {
    let config = schema.kind(node.kind);
    let claims = to_claims(
        config,
        &schema.global.provenance_qualifier,
        &node.resolved,
        Utc::now(),
    )?;

    let outcome = match &node.id {
        None => WriteOutcome::Created {
            id: store.create_item(&node.label, &claims).await?,
        },
        Some(id) => WriteOutcome::Updated {
            receipt: store
                .update_item(id, &claims, &stored_properties(config, node))
                .await?,
        },
    };

    tracing::info!(
        kind = %node.kind,
        label = %node.label,
        id = %outcome.id(),
        claims = claims.len(),
        created = matches!(outcome, WriteOutcome::Created { .. }),
        "Persisted node"
    );
    Ok(outcome)
}

/// Delete the item of an existing node.
pub async fn delete_node(store: &dyn CatalogStore, kind: NodeKind, label: &str) -> Result<ItemId> {
    let id = find_node(store, kind, label).await?;
    store.delete_item(&id).await?;
    tracing::info!(kind = %kind, label, id = %id, "Deleted node");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::{DesiredStatement, Provenance};
    use catalog_graph::client::{SparqlRow, SparqlTerm};
    use catalog_graph::queries::parse_statement_rows;
    use catalog_graph::MemoryStore;
    use chrono::TimeZone;

    use crate::error::SyncError;
    use crate::node::NodeRequest;
    use crate::reconcile::tests::test_schema;
    use crate::reconcile::{reconcile, StructuralLinks};

    fn pid(s: &str) -> PropertyId {
        PropertyId::parse(s).unwrap()
    }

    #[test]
    fn test_to_claims_maps_labels_and_qualifiers() {
        let schema = test_schema();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let statements = vec![
            Statement {
                value: "42".to_string(),
                label: "row_count".to_string(),
                statement_type: StatementType::String,
                item_label: None,
                qualifier: Provenance::Api,
            },
            Statement {
                value: "Q7".to_string(),
                label: "steward".to_string(),
                statement_type: StatementType::Item,
                item_label: Some("Data team".to_string()),
                qualifier: Provenance::Manual,
            },
        ];

        let claims =
            to_claims(schema.kind(NodeKind::Table), &pid("P4"), &statements, at).unwrap();
        assert_eq!(claims[0].property, pid("P7"));
        assert_eq!(claims[0].value, ClaimValue::String("42".to_string()));
        assert_eq!(
            claims[0].qualifier,
            Some((pid("P4"), "API update 2024-05-01 12:00:00".to_string()))
        );
        assert_eq!(claims[1].property, pid("P15"));
        assert_eq!(
            claims[1].value,
            ClaimValue::Item(ItemId::parse("Q7").unwrap())
        );
        assert_eq!(
            claims[1].qualifier,
            Some((pid("P4"), "Manual update".to_string()))
        );
    }

    #[test]
    fn test_to_claims_rejects_unbound_label() {
        let schema = test_schema();
        let statements = vec![Statement {
            value: "x".to_string(),
            label: "colour".to_string(),
            statement_type: StatementType::String,
            item_label: None,
            qualifier: Provenance::Api,
        }];
        assert!(to_claims(schema.kind(NodeKind::Column), &pid("P4"), &statements, Utc::now()).is_err());
    }

    #[test]
    fn test_multilingual_target_label_writes_manual_row_once() {
        let schema = test_schema();
        let config = schema.kind(NodeKind::Table);
        let term = |kind: &str, value: &str| SparqlTerm {
            kind: kind.to_string(),
            value: value.to_string(),
        };
        let row = |label: &str| -> SparqlRow {
            [
                ("STATEMENT_VALUE", term("uri", "http://wikibase.svc/entity/Q7")),
                ("ITEM_LABEL", term("literal", label)),
                ("QUALIFIER", term("literal", "Manual update")),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
        };
        let existing = parse_statement_rows(
            &[row("Data team"), row("Datenteam")],
            "http://wikibase.svc/entity/",
            "steward",
            StatementType::Item,
        );

        let company = ItemId::parse("Q1").unwrap();
        let parent = ItemId::parse("Q3").unwrap();
        let resolved = reconcile(
            config,
            &[],
            Some(existing.as_slice()),
            &[],
            Some(StructuralLinks {
                company: &company,
                parent: &parent,
            }),
        )
        .unwrap();
        let claims = to_claims(config, &pid("P4"), &resolved, Utc::now()).unwrap();

        let stewards: Vec<_> = claims.iter().filter(|c| c.property == pid("P15")).collect();
        assert_eq!(stewards.len(), 1);
        assert_eq!(stewards[0].value, ClaimValue::Item(ItemId::parse("Q7").unwrap()));
        assert_eq!(
            stewards[0].qualifier,
            Some((pid("P4"), "Manual update".to_string()))
        );
    }

    #[tokio::test]
    async fn test_create_then_update_keeps_manual_edits() {
        let store = MemoryStore::new();
        let schema = test_schema();
        let acme = store.insert_item("Acme", vec![]).unwrap();
        store.insert_item("dwh", vec![]).unwrap();
        let request = NodeRequest {
            kind: NodeKind::Schema,
            label: "dwh.sales".to_string(),
            parent_label: None,
            desired: vec![DesiredStatement::string("description", "Sales data")],
        };

        let node = CatalogNode::prepare(&store, &schema, request.clone()).await.unwrap();
        let created = persist_node(&store, &schema, &node).await.unwrap();
        let id = created.id().clone();
        assert!(matches!(created, WriteOutcome::Created { .. }));
        assert_eq!(store.label(&id).as_deref(), Some("dwh.sales"));
        assert!(store.claims(&id).iter().any(|c| c.property == pid("P2")
            && c.value == ClaimValue::Item(acme.clone())));

        // A human edits the description.
        store
            .update_item(
                &id,
                &[Claim {
                    property: pid("P10"),
                    value: ClaimValue::String("Curated by finance".to_string()),
                    qualifier: Some((pid("P4"), "Manual update".to_string())),
                }],
                &BTreeSet::new(),
            )
            .await
            .unwrap();

        let node = CatalogNode::prepare(&store, &schema, request).await.unwrap();
        let updated = persist_node(&store, &schema, &node).await.unwrap();
        assert!(matches!(updated, WriteOutcome::Updated { .. }));

        let descriptions: Vec<_> = store
            .claims(&id)
            .into_iter()
            .filter(|c| c.property == pid("P10"))
            .collect();
        assert_eq!(descriptions.len(), 2);
        assert!(descriptions
            .iter()
            .any(|c| c.value == ClaimValue::String("Curated by finance".to_string())));
        assert!(descriptions
            .iter()
            .any(|c| c.value == ClaimValue::String("Sales data".to_string())));
    }

    #[tokio::test]
    async fn test_last_child_removed_clears_link() {
        let store = MemoryStore::new();
        let schema = test_schema();
        store.insert_item("Acme", vec![]).unwrap();
        store.insert_item("dwh", vec![]).unwrap();
        let sales = NodeRequest {
            kind: NodeKind::Schema,
            label: "dwh.sales".to_string(),
            parent_label: None,
            desired: vec![],
        };
        let orders = NodeRequest {
            kind: NodeKind::Table,
            label: "dwh.sales.orders".to_string(),
            parent_label: None,
            desired: vec![DesiredStatement::string("row_count", "42")],
        };

        let node = CatalogNode::prepare(&store, &schema, sales.clone()).await.unwrap();
        let sales_id = persist_node(&store, &schema, &node).await.unwrap().id().clone();
        let node = CatalogNode::prepare(&store, &schema, orders).await.unwrap();
        persist_node(&store, &schema, &node).await.unwrap();

        let node = CatalogNode::prepare(&store, &schema, sales.clone()).await.unwrap();
        persist_node(&store, &schema, &node).await.unwrap();
        let links = |id: &ItemId| {
            store
                .claims(id)
                .into_iter()
                .filter(|c| c.property == pid("P13"))
                .count()
        };
        assert_eq!(links(&sales_id), 1);

        delete_node(&store, NodeKind::Table, "dwh.sales.orders")
            .await
            .unwrap();
        let node = CatalogNode::prepare(&store, &schema, sales).await.unwrap();
        assert!(node.resolved.iter().all(|s| s.label != "TABLE"));
        assert!(matches!(
            persist_node(&store, &schema, &node).await.unwrap(),
            WriteOutcome::Updated { .. }
        ));
        assert_eq!(links(&sales_id), 0);
        assert!(store.claims(&sales_id).iter().any(|c| c.property == pid("P3")));
    }

    #[tokio::test]
    async fn test_dropped_api_value_is_cleared() {
        let store = MemoryStore::new();
        let schema = test_schema();
        store.insert_item("Acme", vec![]).unwrap();
        store.insert_item("dwh", vec![]).unwrap();
        store.insert_item("dwh.sales", vec![]).unwrap();
        let mut request = NodeRequest {
            kind: NodeKind::Table,
            label: "dwh.sales.orders".to_string(),
            parent_label: None,
            desired: vec![DesiredStatement::string("row_count", "42")],
        };

        let node = CatalogNode::prepare(&store, &schema, request.clone()).await.unwrap();
        let id = persist_node(&store, &schema, &node).await.unwrap().id().clone();

        request.desired.clear();
        let node = CatalogNode::prepare(&store, &schema, request).await.unwrap();
        assert!(stored_properties(schema.kind(NodeKind::Table), &node).contains(&pid("P7")));
        persist_node(&store, &schema, &node).await.unwrap();
        assert!(store.claims(&id).iter().all(|c| c.property != pid("P7")));
    }

    #[tokio::test]
    async fn test_delete_node() {
        let store = MemoryStore::new();
        let id = store.insert_item("dwh.sales.orders", vec![]).unwrap();

        let deleted = delete_node(&store, NodeKind::Table, "dwh.sales.orders")
            .await
            .unwrap();
        assert_eq!(deleted, id);
        assert!(store.is_empty());
        assert!(matches!(
            delete_node(&store, NodeKind::Table, "dwh.sales.orders").await,
            Err(SyncError::NodeNotFound { .. })
        ));
    }
}

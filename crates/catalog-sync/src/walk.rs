//! Tree sync: walk a manifest parent-before-children, one node at a time.
//!
//! A node that fails is logged and its subtree skipped; siblings carry on
//! unless `continue_on_error` is off, in which case the walk stops and the
//! remaining nodes are counted as skipped.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use catalog_core::{ItemId, NodeKind, PropertySchema, Statement};
use catalog_graph::CatalogStore;

use crate::config::SyncConfig;
use crate::manifest::{Manifest, ManifestNode};
use crate::node::{CatalogNode, NodeRequest};
use crate::persist::{persist_node, WriteOutcome};

/// A node that could not be synced.
#[derive(Debug, Clone, Serialize)]
pub struct NodeFailure {
    pub kind: NodeKind,
    pub label: String,
    pub error: String,
}

/// The statements a dry run would have written for one node.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedNode {
    pub kind: NodeKind,
    pub label: String,
    pub id: Option<ItemId>,
    pub statements: Vec<Statement>,
}

/// Summary of one sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub created: u32,
    pub updated: u32,
    pub failed: u32,
    pub skipped: u32,
    pub aborted: bool,
    pub failures: Vec<NodeFailure>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub planned: Vec<PlannedNode>,
}

impl SyncReport {
    fn new(dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            created: 0,
            updated: 0,
            failed: 0,
            skipped: 0,
            aborted: false,
            failures: Vec::new(),
            planned: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.aborted
    }
}

/// Drives a manifest into the knowledge base.
pub struct TreeSync<'a> {
    store: &'a dyn CatalogStore,
    schema: &'a PropertySchema,
    config: &'a SyncConfig,
}

impl<'a> TreeSync<'a> {
    pub fn new(store: &'a dyn CatalogStore, schema: &'a PropertySchema, config: &'a SyncConfig) -> Self {
        Self {
            store,
            schema,
            config,
        }
    }

    pub async fn run(&self, manifest: &Manifest) -> SyncReport {
        let mut report = SyncReport::new(self.config.dry_run);
        // Ids of items written during this run, by label.
        let mut known: BTreeMap<String, ItemId> = BTreeMap::new();
        // Labels a dry run would have created; their children cannot resolve.
        let mut planned_new: BTreeSet<String> = BTreeSet::new();

        tracing::info!(
            run_id = %report.run_id,
            nodes = manifest.len(),
            dry_run = self.config.dry_run,
            "Sync run started"
        );

        let mut stack: Vec<(&ManifestNode, Option<&str>)> =
            manifest.nodes.iter().rev().map(|n| (n, None)).collect();

        while let Some((node, enclosing)) = stack.pop() {
            let parent_label = node.parent.as_deref().or(enclosing);

            if let Some(parent) = parent_label.filter(|p| planned_new.contains(*p)) {
                tracing::info!(
                    kind = %node.kind,
                    label = %node.label,
                    parent,
                    "Parent only exists in the dry-run plan, skipping subtree"
                );
                report.skipped += node.size() as u32;
                continue;
            }

            let request = NodeRequest {
                kind: node.kind,
                label: node.label.clone(),
                parent_label: parent_label.map(String::from),
                desired: node.statements.clone(),
            };

            match self.sync_node(request, &known, &mut report).await {
                Ok(Some(id)) => {
                    known.insert(node.label.clone(), id);
                }
                Ok(None) => {
                    planned_new.insert(node.label.clone());
                }
                Err(e) => {
                    tracing::error!(
                        run_id = %report.run_id,
                        kind = %node.kind,
                        label = %node.label,
                        error = %e,
                        "Node sync failed, skipping its subtree"
                    );
                    report.failed += 1;
                    report.skipped += (node.size() - 1) as u32;
                    report.failures.push(NodeFailure {
                        kind: node.kind,
                        label: node.label.clone(),
                        error: e.to_string(),
                    });
                    if !self.config.continue_on_error {
                        report.aborted = true;
                        report.skipped += stack.iter().map(|(n, _)| n.size() as u32).sum::<u32>();
                        break;
                    }
                    continue;
                }
            }

            stack.extend(
                node.children
                    .iter()
                    .rev()
                    .map(|child| (child, Some(node.label.as_str()))),
            );
        }

        report.finished_at = Some(Utc::now());
        tracing::info!(
            run_id = %report.run_id,
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            skipped = report.skipped,
            aborted = report.aborted,
            "Sync run complete"
        );
        report
    }

    /// Prepare and write one node. Returns the item id, or `None` for a new
    /// node in a dry run.
    async fn sync_node(
        &self,
        request: NodeRequest,
        known: &BTreeMap<String, ItemId>,
        report: &mut SyncReport,
    ) -> crate::error::Result<Option<ItemId>> {
        let node = CatalogNode::prepare_with(self.store, self.schema, request, known).await?;

        if self.config.dry_run {
            let id = node.id.clone();
            if id.is_some() {
                report.updated += 1;
            } else {
                report.created += 1;
            }
            report.planned.push(PlannedNode {
                kind: node.kind,
                label: node.label,
                id: id.clone(),
                statements: node.resolved,
            });
            return Ok(id);
        }

        let outcome = persist_node(self.store, self.schema, &node).await?;
        match &outcome {
            WriteOutcome::Created { .. } => report.created += 1,
            WriteOutcome::Updated { .. } => report.updated += 1,
        }
        Ok(Some(outcome.id().clone()))
    }
}

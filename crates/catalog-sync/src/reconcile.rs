//! Statement reconciliation: merge the desired rows for a node with what
//! the knowledge base already holds.
//!
//! The sync owns every row qualified `API update`; everything else belongs
//! to human editors and is carried through untouched. Rows under the
//! structural labels (`in_company`, `located_in`) are always owned by the
//! sync, whatever their qualifier says.

use catalog_core::schema::{IN_COMPANY, LOCATED_IN};
use catalog_core::{
    CatalogError, ChildItem, DesiredStatement, ItemId, NodeKindConfig, Provenance, Statement,
    StatementType, StoredStatement,
};

use crate::error::Result;

/// Targets of the structural link statements.
#[derive(Debug, Clone, Copy)]
pub struct StructuralLinks<'a> {
    pub company: &'a ItemId,
    pub parent: &'a ItemId,
}

/// Validate a desired row against the kind's bindings and tag it `Api`.
pub fn resolve_desired(config: &NodeKindConfig, row: &DesiredStatement) -> Result<Statement> {
    let statement_type: StatementType = row.statement_type.parse()?;

    if config.is_structural(&row.label) {
        return Err(CatalogError::Schema(format!(
            "{}: statement label {:?} is reserved for structural links",
            config.kind, row.label
        ))
        .into());
    }
    let binding = config.binding(&row.label).ok_or_else(|| {
        CatalogError::Schema(format!(
            "{}: no property configured for statement label {:?}",
            config.kind, row.label
        ))
    })?;
    if binding.statement_type != statement_type {
        return Err(CatalogError::Schema(format!(
            "{}: statement label {:?} holds {} values, row is {}",
            config.kind,
            row.label,
            binding.statement_type.as_str(),
            statement_type.as_str()
        ))
        .into());
    }
    if row.value.trim().is_empty() {
        return Err(CatalogError::Schema(format!(
            "{}: statement label {:?} has an empty value",
            config.kind, row.label
        ))
        .into());
    }
    if statement_type == StatementType::Item {
        ItemId::parse(&row.value)?;
    }

    Ok(Statement {
        value: row.value.clone(),
        label: row.label.clone(),
        statement_type,
        item_label: row.item_label.clone(),
        qualifier: Provenance::Api,
    })
}

/// Compute the full statement set to write for one node.
///
/// `existing` is `None` for a node that does not exist yet; such a node
/// gets no merge and no child links. `structural` must be given when the
/// kind writes structural links.
///
/// The result is sorted and free of duplicates, so equal inputs always
/// give equal output.
pub fn reconcile(
    config: &NodeKindConfig,
    desired: &[DesiredStatement],
    existing: Option<&[StoredStatement]>,
    children: &[ChildItem],
    structural: Option<StructuralLinks<'_>>,
) -> Result<Vec<Statement>> {
    let mut resolved = desired
        .iter()
        .map(|row| resolve_desired(config, row))
        .collect::<Result<Vec<_>>>()?;

    if let Some(existing) = existing {
        let manual = existing
            .iter()
            .cloned()
            .map(StoredStatement::into_statement)
            .filter(|s| s.qualifier == Provenance::Manual && !config.is_structural(&s.label));
        resolved.extend(manual);

        if let Some(label) = &config.repeated_label {
            resolved.extend(children.iter().map(|child| Statement {
                value: child.id.to_string(),
                label: label.clone(),
                statement_type: StatementType::Item,
                item_label: child.label.clone(),
                qualifier: Provenance::Api,
            }));
        }
    }

    if config.structural_links {
        let links = structural.ok_or_else(|| {
            CatalogError::Schema(format!(
                "{} nodes carry structural links and need a resolved parent",
                config.kind
            ))
        })?;
        resolved.push(Statement {
            value: links.company.to_string(),
            label: IN_COMPANY.to_string(),
            statement_type: StatementType::Item,
            item_label: None,
            qualifier: Provenance::Api,
        });
        resolved.push(Statement {
            value: links.parent.to_string(),
            label: LOCATED_IN.to_string(),
            statement_type: StatementType::Item,
            item_label: None,
            qualifier: Provenance::Api,
        });
    }

    resolved.sort();
    resolved.dedup();
    Ok(resolved)
}

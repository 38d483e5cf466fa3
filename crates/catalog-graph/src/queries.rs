//! Read operations: SPARQL query builders, result parsing, and label,
//! parent, statement, and child lookups.

use std::collections::{BTreeMap, BTreeSet};

use catalog_core::{ChildItem, EntityKind, ItemId, PropertyId, StatementType, StoredStatement};

use crate::client::{GraphError, SparqlRow, WikibaseClient};

/// Why a batched label lookup produced no usable mapping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("labels map to several entities: {0:?}")]
    Ambiguous(BTreeMap<String, Vec<String>>),

    #[error("labels not found: {0:?}")]
    NotFound(BTreeSet<String>),
}

/// Constraints on a label lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupOptions {
    /// Keep only ids of this kind.
    pub kind: Option<EntityKind>,
    /// Fail when a label maps to more than one id.
    pub unique: bool,
    /// Fail when a label maps to no id.
    pub not_null: bool,
}

impl LookupOptions {
    pub fn items() -> Self {
        Self {
            kind: Some(EntityKind::Item),
            unique: true,
            not_null: true,
        }
    }

    pub fn properties() -> Self {
        Self {
            kind: Some(EntityKind::Property),
            unique: true,
            not_null: true,
        }
    }
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            kind: None,
            unique: true,
            not_null: true,
        }
    }
}

/// Match `(label, id)` rows against the requested labels.
///
/// Rows whose id is not of `options.kind` are ignored. When a label has
/// several ids and uniqueness is not required, the smallest id wins.
pub fn match_labels(
    requested: &BTreeSet<String>,
    rows: &[(String, String)],
    options: LookupOptions,
) -> Result<BTreeMap<String, String>, LookupError> {
    let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (label, id) in rows {
        if !requested.contains(label) {
            continue;
        }
        if let Some(kind) = options.kind {
            if !kind.matches(id) {
                continue;
            }
        }
        grouped.entry(label.clone()).or_default().insert(id.clone());
    }

    if options.unique {
        let ambiguous: BTreeMap<String, Vec<String>> = grouped
            .iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(label, ids)| (label.clone(), ids.iter().cloned().collect()))
            .collect();
        if !ambiguous.is_empty() {
            return Err(LookupError::Ambiguous(ambiguous));
        }
    }

    if options.not_null {
        let missing: BTreeSet<String> = requested
            .iter()
            .filter(|label| !grouped.contains_key(*label))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(LookupError::NotFound(missing));
        }
    }

    Ok(grouped
        .into_iter()
        .filter_map(|(label, ids)| ids.into_iter().next().map(|id| (label, id)))
        .collect())
}

/// Log a failed lookup and turn it into "no such entity".
pub(crate) fn report_lookup(
    result: Result<BTreeMap<String, String>, LookupError>,
) -> Option<BTreeMap<String, String>> {
    match result {
        Ok(found) => Some(found),
        Err(LookupError::Ambiguous(labels)) => {
            tracing::warn!(?labels, "Entity id is ambiguous for labels");
            None
        }
        Err(LookupError::NotFound(labels)) => {
            tracing::warn!(?labels, "Entity id not found for labels");
            None
        }
    }
}

// ── Query Builders ───────────────────────────────────────────────

/// Quote a string as a SPARQL literal.
pub fn sparql_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

pub fn labels_query(labels: &BTreeSet<String>, language: &str) -> String {
    let values = labels
        .iter()
        .map(|label| format!("{}@{language}", sparql_literal(label)))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "SELECT DISTINCT ?item ?itemLabel WHERE {{
           ?item rdfs:label ?itemLabel .
           VALUES ?itemLabel {{ {values} }}
         }}"
    )
}

pub fn parent_query(node: &ItemId, parent_property: &PropertyId) -> String {
    format!(
        "SELECT ?entity_id ?entity_name WHERE {{
           ?entity_id wdt:{parent_property} wd:{node} .
           ?entity_id rdfs:label ?entity_name .
         }}"
    )
}

pub fn statements_query(
    node: &ItemId,
    property: &PropertyId,
    qualifier: &PropertyId,
    language: &str,
) -> String {
    format!(
        "SELECT ?STATEMENT_VALUE ?ITEM_LABEL ?QUALIFIER WHERE {{
           wd:{node} p:{property} ?statement .
           ?statement ps:{property} ?STATEMENT_VALUE .
           OPTIONAL {{ ?statement pq:{qualifier} ?QUALIFIER . }}
           OPTIONAL {{ ?STATEMENT_VALUE rdfs:label ?ITEM_LABEL . FILTER(LANG(?ITEM_LABEL) = \"{language}\") }}
         }}"
    )
}

pub fn children_query(link_property: &PropertyId, node: &ItemId, language: &str) -> String {
    format!(
        "SELECT ?item ?itemLabel WHERE {{
           ?item wdt:{link_property} wd:{node} .
           OPTIONAL {{ ?item rdfs:label ?itemLabel . FILTER(LANG(?itemLabel) = \"{language}\") }}
         }}"
    )
}

// ── Result Parsing ───────────────────────────────────────────────

/// Strip the entity URI prefix to get a bare id.
pub fn strip_entity<'a>(value: &'a str, prefix: &str) -> &'a str {
    value.strip_prefix(prefix).unwrap_or(value)
}

fn term<'a>(row: &'a SparqlRow, var: &str) -> Option<&'a str> {
    row.get(var).map(|t| t.value.as_str())
}

pub fn parse_label_rows(rows: &[SparqlRow], prefix: &str) -> Vec<(String, String)> {
    rows.iter()
        .filter_map(|row| {
            let label = term(row, "itemLabel")?;
            let id = strip_entity(term(row, "item")?, prefix);
            Some((label.to_string(), id.to_string()))
        })
        .collect()
}

pub fn parse_parent_rows(rows: &[SparqlRow], prefix: &str) -> Vec<(String, String)> {
    rows.iter()
        .filter_map(|row| {
            let name = term(row, "entity_name")?;
            let id = strip_entity(term(row, "entity_id")?, prefix);
            Some((name.to_string(), id.to_string()))
        })
        .collect()
}

/// Statement rows, one per distinct (value, qualifier).
///
/// URI values outside `prefix` (blank nodes and `genid` URIs of "unknown
/// value" snaks) are skipped with a warning.
pub fn parse_statement_rows(
    rows: &[SparqlRow],
    prefix: &str,
    label: &str,
    statement_type: StatementType,
) -> Vec<StoredStatement> {
    let mut seen = BTreeSet::new();
    let mut parsed = Vec::new();
    for row in rows {
        let Some(raw) = row.get("STATEMENT_VALUE") else {
            continue;
        };
        let value = match raw.kind.as_str() {
            "uri" | "bnode" => match raw.value.strip_prefix(prefix) {
                Some(id) => id,
                None => {
                    tracing::warn!(
                        label,
                        value = %raw.value,
                        "Skipping statement without an entity value"
                    );
                    continue;
                }
            },
            _ => raw.value.as_str(),
        };
        let qualifier = term(row, "QUALIFIER").map(String::from);
        if !seen.insert((value.to_string(), qualifier.clone())) {
            continue;
        }
        parsed.push(StoredStatement {
            label: label.to_string(),
            statement_type,
            value: value.to_string(),
            item_label: term(row, "ITEM_LABEL").map(String::from),
            qualifier,
        });
    }
    parsed
}

pub fn parse_children(rows: &[SparqlRow], prefix: &str) -> Result<Vec<ChildItem>, GraphError> {
    rows.iter()
        .filter_map(|row| {
            term(row, "item").map(|uri| (uri, term(row, "itemLabel")))
        })
        .map(|(uri, label)| -> Result<ChildItem, GraphError> {
            Ok(ChildItem {
                id: ItemId::parse(strip_entity(uri, prefix))?,
                label: label.map(String::from),
            })
        })
        .collect()
}

impl WikibaseClient {
    fn entity_prefix(&self) -> &str {
        &self.config().entity_uri_prefix
    }

    /// Resolve labels to entity ids with one batched query.
    ///
    /// Ambiguous or missing labels are logged and yield `Ok(None)`; callers
    /// treat that as "no such entity". Transport failures are errors.
    pub async fn resolve_labels(
        &self,
        labels: &BTreeSet<String>,
        options: LookupOptions,
    ) -> Result<Option<BTreeMap<String, String>>, GraphError> {
        if labels.is_empty() {
            return Ok(Some(BTreeMap::new()));
        }
        let rows = self
            .sparql(&labels_query(labels, &self.config().language))
            .await?;
        let pairs = parse_label_rows(&rows, self.entity_prefix());
        Ok(report_lookup(match_labels(labels, &pairs, options)))
    }

    /// Find the single item pointing at `node` through `parent_property`.
    pub async fn resolve_parent(
        &self,
        node: &ItemId,
        parent_property: &PropertyId,
    ) -> Result<(String, ItemId), GraphError> {
        let rows = self.sparql(&parent_query(node, parent_property)).await?;
        let parents = parse_parent_rows(&rows, self.entity_prefix());
        single_parent(node, parent_property, parents)
    }

    /// Statements of `node` under `property`, tagged with `label` and
    /// `statement_type`, with the raw provenance qualifier if any.
    pub async fn fetch_statements(
        &self,
        node: &ItemId,
        property: &PropertyId,
        qualifier: &PropertyId,
        label: &str,
        statement_type: StatementType,
    ) -> Result<Vec<StoredStatement>, GraphError> {
        let rows = self
            .sparql(&statements_query(
                node,
                property,
                qualifier,
                &self.config().language,
            ))
            .await?;
        Ok(parse_statement_rows(
            &rows,
            self.entity_prefix(),
            label,
            statement_type,
        ))
    }

    /// Items whose `link_property` points at `node`.
    pub async fn fetch_children(
        &self,
        link_property: &PropertyId,
        node: &ItemId,
    ) -> Result<Vec<ChildItem>, GraphError> {
        let rows = self
            .sparql(&children_query(link_property, node, &self.config().language))
            .await?;
        parse_children(&rows, self.entity_prefix())
    }
}

/// Exactly one parent, or [`GraphError::ParentResolution`].
pub(crate) fn single_parent(
    node: &ItemId,
    parent_property: &PropertyId,
    mut parents: Vec<(String, String)>,
) -> Result<(String, ItemId), GraphError> {
    if parents.len() != 1 {
        return Err(GraphError::ParentResolution {
            node: node.to_string(),
            property: parent_property.to_string(),
            found: parents.into_iter().map(|(_, id)| id).collect(),
        });
    }
    let (label, id) = parents.remove(0);
    Ok((label, ItemId::parse(&id)?))
}

//! Write operations for the knowledge base.
//!
//! Items are created and updated with `wbeditentity`. An update replaces,
//! per property, the stored claims with the ones sent. A property named in
//! the `replace` set but with no claim sent is cleared; other properties are
//! left untouched. Deciding which values to send is the caller's job.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{json, Value};

use catalog_core::{Claim, ClaimValue, ItemId, PropertyId};

use crate::client::{GraphError, WikibaseClient};

/// Namespace of item pages, used for deletion.
pub const ITEM_NAMESPACE: &str = "Item";

const EDIT_SUMMARY: &str = "catalog-sync";

/// Outcome of a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReceipt {
    pub id: ItemId,
    pub revision: Option<u64>,
}

impl WikibaseClient {
    /// Create an item labelled in the configured language.
    ///
    /// A label already used by another item is a [`GraphError::WriteConflict`].
    pub async fn create_item(&self, label: &str, claims: &[Claim]) -> Result<ItemId, GraphError> {
        let session = self.session()?;
        let data = edit_data(Some((self.config().language.as_str(), label)), claims, &[]);
        let data = data.to_string();

        let body = self
            .api_post(&[
                ("action", "wbeditentity"),
                ("new", "item"),
                ("data", data.as_str()),
                ("summary", EDIT_SUMMARY),
                ("token", session.csrf_token.as_str()),
            ])
            .await
            .map_err(|e| conflict_or(e, label))?;

        let receipt = parse_receipt(&body)?;
        tracing::info!(id = %receipt.id, label, claims = claims.len(), "Created item");
        Ok(receipt.id)
    }

    /// Replace the claims of every property present in `claims` or in
    /// `replace`. Properties in `replace` without a claim end up empty.
    pub async fn update_item(
        &self,
        id: &ItemId,
        claims: &[Claim],
        replace: &BTreeSet<PropertyId>,
    ) -> Result<WriteReceipt, GraphError> {
        let session = self.session()?;
        let entity = self.get_entity(id).await?;
        let properties = replaced_properties(claims, replace);
        let stale = stale_claim_ids(&entity, &properties);
        let data = edit_data(None, claims, &stale).to_string();

        let body = self
            .api_post(&[
                ("action", "wbeditentity"),
                ("id", id.as_str()),
                ("data", data.as_str()),
                ("summary", EDIT_SUMMARY),
                ("token", session.csrf_token.as_str()),
            ])
            .await
            .map_err(|e| conflict_or(e, id.as_str()))?;

        let receipt = parse_receipt(&body)?;
        tracing::info!(
            id = %receipt.id,
            revision = ?receipt.revision,
            claims = claims.len(),
            replaced = stale.len(),
            "Updated item"
        );
        Ok(receipt)
    }

    /// Delete an item page.
    pub async fn delete_item(&self, id: &ItemId) -> Result<(), GraphError> {
        let session = self.session()?;
        let title = format!("{ITEM_NAMESPACE}:{id}");
        self.api_post(&[
            ("action", "delete"),
            ("title", title.as_str()),
            ("reason", EDIT_SUMMARY),
            ("token", session.csrf_token.as_str()),
        ])
        .await
        .map_err(|e| match e {
            GraphError::Api { code, .. } if code == "missingtitle" => {
                GraphError::NotFound(id.to_string())
            }
            other => other,
        })?;
        tracing::info!(id = %id, "Deleted item");
        Ok(())
    }

    /// Current JSON of an item (claims only).
    async fn get_entity(&self, id: &ItemId) -> Result<Value, GraphError> {
        let body = self
            .api_get(&[
                ("action", "wbgetentities"),
                ("ids", id.as_str()),
                ("props", "claims"),
            ])
            .await?;
        match body.get("entities").and_then(|e| e.get(id.as_str())) {
            Some(entity) if entity.get("missing").is_none() => Ok(entity.clone()),
            _ => Err(GraphError::NotFound(id.to_string())),
        }
    }
}

fn datavalue(value: &ClaimValue) -> Value {
    match value {
        ClaimValue::String(text) => json!({"value": text, "type": "string"}),
        ClaimValue::Item(id) => json!({
            "value": {"entity-type": "item", "id": id.as_str()},
            "type": "wikibase-entityid"
        }),
    }
}

/// One claim in `wbeditentity` form.
pub fn claim_json(claim: &Claim) -> Value {
    let mut statement = json!({
        "mainsnak": {
            "snaktype": "value",
            "property": claim.property.as_str(),
            "datavalue": datavalue(&claim.value),
        },
        "type": "statement",
        "rank": "normal",
    });
    if let Some((property, text)) = &claim.qualifier {
        statement["qualifiers"] = json!({
            property.as_str(): [{
                "snaktype": "value",
                "property": property.as_str(),
                "datavalue": {"value": text, "type": "string"},
            }]
        });
    }
    statement
}

/// The `data` payload of `wbeditentity`: optional label, claim removals
/// (by statement GUID), then new claims.
pub fn edit_data(label: Option<(&str, &str)>, claims: &[Claim], remove: &[String]) -> Value {
    let mut all: Vec<Value> = remove
        .iter()
        .map(|guid| json!({"id": guid, "remove": ""}))
        .collect();
    all.extend(claims.iter().map(claim_json));

    let mut data = json!({ "claims": all });
    if let Some((language, value)) = label {
        data["labels"] = json!({ language: {"language": language, "value": value} });
    }
    data
}

/// Properties whose stored claims an update removes.
pub fn replaced_properties<'a>(
    claims: &'a [Claim],
    replace: &'a BTreeSet<PropertyId>,
) -> BTreeSet<&'a PropertyId> {
    claims.iter().map(|c| &c.property).chain(replace).collect()
}

/// GUIDs of stored claims under any of `properties`.
pub fn stale_claim_ids(entity: &Value, properties: &BTreeSet<&PropertyId>) -> Vec<String> {
    let Some(claims) = entity.get("claims").and_then(Value::as_object) else {
        return Vec::new();
    };
    properties
        .iter()
        .filter_map(|p| claims.get(p.as_str()).and_then(Value::as_array))
        .flatten()
        .filter_map(|c| c.get("id").and_then(Value::as_str).map(String::from))
        .collect()
}

fn parse_receipt(body: &Value) -> Result<WriteReceipt, GraphError> {
    let entity = body
        .get("entity")
        .ok_or_else(|| GraphError::Serialization("wbeditentity response has no entity".into()))?;
    let id = entity
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| GraphError::Serialization("wbeditentity response has no id".into()))?;
    Ok(WriteReceipt {
        id: ItemId::parse(id)?,
        revision: entity.get("lastrevid").and_then(Value::as_u64),
    })
}

/// Wikibase reports label collisions as `modification-failed` with a
/// label-conflict message.
fn is_label_conflict(code: &str, info: &str) -> bool {
    code == "modification-failed"
        && (info.contains("label-conflict") || info.contains("already has label"))
}

fn conflict_or(error: GraphError, label: &str) -> GraphError {
    match error {
        GraphError::Api { code, info } if is_label_conflict(&code, &info) => {
            GraphError::WriteConflict {
                label: label.to_string(),
                info,
            }
        }
        other => other,
    }
}

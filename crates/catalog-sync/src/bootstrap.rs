//! Startup: resolve the property schema against the knowledge base.
//!
//! Schema entries may name properties (and the company item) by label.
//! All property labels go out in one batched lookup, the company label in
//! another; the result is frozen into a [`PropertySchema`] for the run.

use std::collections::{BTreeMap, BTreeSet};

use catalog_core::config::SchemaConfig;
use catalog_core::{EntityKind, ItemId, PropertyId, PropertySchema};
use catalog_graph::{CatalogStore, LookupOptions};

use crate::error::{Result, SyncError};

/// Labels among `refs` that still need a lookup.
fn pending_labels<'a>(refs: impl IntoIterator<Item = &'a str>, kind: EntityKind) -> BTreeSet<String> {
    refs.into_iter()
        .filter(|value| !value.is_empty() && !kind.matches(value.trim()))
        .map(String::from)
        .collect()
}

async fn resolve<T>(
    store: &dyn CatalogStore,
    labels: BTreeSet<String>,
    options: LookupOptions,
    parse: fn(&str) -> catalog_core::error::Result<T>,
) -> Result<BTreeMap<String, T>> {
    if labels.is_empty() {
        return Ok(BTreeMap::new());
    }
    let found = store
        .resolve_labels(&labels, options)
        .await?
        .ok_or_else(|| {
            SyncError::Config(format!(
                "schema labels could not be resolved to unique entities: {labels:?}"
            ))
        })?;
    found
        .into_iter()
        .map(|(label, id)| -> Result<(String, T)> { Ok((label, parse(&id)?)) })
        .collect()
}

/// Build the run's [`PropertySchema`] from raw config.
pub async fn resolve_schema(store: &dyn CatalogStore, raw: &SchemaConfig) -> Result<PropertySchema> {
    let refs = raw.property_refs();
    let property_labels = pending_labels(refs.iter().map(|(_, v)| *v), EntityKind::Property);
    let item_labels = pending_labels([raw.global.company.as_str()], EntityKind::Item);

    let properties =
        resolve(store, property_labels, LookupOptions::properties(), PropertyId::parse).await?;
    let items = resolve(store, item_labels, LookupOptions::items(), ItemId::parse).await?;

    let schema = PropertySchema::build(raw, &properties, &items)?;
    tracing::info!(
        company = %schema.global.company,
        resolved_properties = properties.len(),
        "Property schema ready"
    );
    Ok(schema)
}

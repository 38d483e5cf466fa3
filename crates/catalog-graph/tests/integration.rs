//! Integration tests for catalog-graph against a live Wikibase instance.
//!
//! These tests need a Wikibase with its query service, reachable through
//! the `CATSYNC__WIKIBASE__*` environment variables (user and password
//! included). Run with:
//! cargo test --package catalog-graph --test integration -- --ignored
//!
//! Skipped automatically if Wikibase is not available.

use std::collections::BTreeSet;

use catalog_core::config::{self, WikibaseConfig};
use catalog_core::{Claim, ClaimValue, ItemId, PropertyId, StatementType};
use catalog_graph::{CatalogStore, GraphError, LookupOptions, WikibaseClient};

use chrono::Utc;

async fn connect_or_skip() -> Option<WikibaseClient> {
    let cfg = config::load("catsync-test").ok()?;
    let wikibase: WikibaseConfig = config::section(&cfg, "wikibase").ok()?;
    if wikibase.user.is_empty() {
        eprintln!("Skipping integration test (no Wikibase user configured)");
        return None;
    }
    match WikibaseClient::connect(&wikibase).await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test (Wikibase not available): {e}");
            None
        }
    }
}

fn unique_label(prefix: &str) -> String {
    format!("{prefix}-{}", Utc::now().format("%Y%m%d%H%M%S%f"))
}

/// A string property to write test claims under, named by environment.
fn test_property() -> Option<PropertyId> {
    std::env::var("CATSYNC_TEST_PROPERTY")
        .ok()
        .and_then(|p| PropertyId::parse(&p).ok())
}

async fn cleanup(client: &WikibaseClient, id: &ItemId) {
    let _ = client.delete_item(id).await;
}

#[tokio::test]
#[ignore = "requires live Wikibase - run with: cargo test --package catalog-graph --test integration -- --ignored"]
async fn test_create_and_resolve_label() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let label = unique_label("catsync-db");

    let id = client.create_item(&label, &[]).await.unwrap();

    // The query service updates asynchronously.
    tokio::time::sleep(std::time::Duration::from_secs(10)).await;

    let labels: BTreeSet<String> = [label.clone()].into();
    let found = client
        .resolve_labels(&labels, LookupOptions::items())
        .await
        .unwrap()
        .expect("label should resolve");
    assert_eq!(found[&label], id.as_str());

    cleanup(&client, &id).await;
}

#[tokio::test]
#[ignore = "requires live Wikibase - run with: cargo test --package catalog-graph --test integration -- --ignored"]
async fn test_duplicate_label_is_write_conflict() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let label = unique_label("catsync-dup");

    let id = client.create_item(&label, &[]).await.unwrap();
    let err = client.create_item(&label, &[]).await.unwrap_err();
    assert!(
        matches!(err, GraphError::WriteConflict { .. }),
        "expected write conflict, got {err:?}"
    );

    cleanup(&client, &id).await;
}

#[tokio::test]
#[ignore = "requires live Wikibase - run with: cargo test --package catalog-graph --test integration -- --ignored"]
async fn test_update_replaces_claims_of_written_property() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let Some(property) = test_property() else {
        eprintln!("Skipping: CATSYNC_TEST_PROPERTY not set");
        return;
    };
    let qualifier = property.clone();
    let label = unique_label("catsync-table");
    let claim = |value: &str| Claim {
        property: property.clone(),
        value: ClaimValue::String(value.to_string()),
        qualifier: None,
    };

    let id = client.create_item(&label, &[claim("first")]).await.unwrap();
    let receipt = client
        .update_item(&id, &[claim("second")], &BTreeSet::new())
        .await
        .unwrap();
    assert_eq!(receipt.id, id);
    assert!(receipt.revision.is_some());

    tokio::time::sleep(std::time::Duration::from_secs(10)).await;

    let rows = client
        .fetch_statements(&id, &property, &qualifier, "probe", StatementType::String)
        .await
        .unwrap();
    let values: Vec<&str> = rows.iter().map(|r| r.value.as_str()).collect();
    assert_eq!(values, vec!["second"]);

    cleanup(&client, &id).await;
}

#[tokio::test]
#[ignore = "requires live Wikibase - run with: cargo test --package catalog-graph --test integration -- --ignored"]
async fn test_delete_missing_item_is_not_found() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let label = unique_label("catsync-gone");
    let id = client.create_item(&label, &[]).await.unwrap();

    client.delete_item(&id).await.unwrap();
    let err = client.delete_item(&id).await.unwrap_err();
    assert!(matches!(err, GraphError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
#[ignore = "requires live Wikibase - run with: cargo test --package catalog-graph --test integration -- --ignored"]
async fn test_trait_object_dispatch() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let store: &dyn CatalogStore = &client;
    let labels: BTreeSet<String> = [unique_label("catsync-absent")].into();
    let found = store
        .resolve_labels(&labels, LookupOptions::items())
        .await
        .unwrap();
    assert!(found.is_none());
}

//! CLI entry point for the catalog synchronizer.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use catalog_core::NodeKind;
use catalog_graph::WikibaseClient;

use catalog_sync::bootstrap::resolve_schema;
use catalog_sync::config::Settings;
use catalog_sync::manifest::Manifest;
use catalog_sync::node::{inspect_parent, CatalogNode, NodeRequest};
use catalog_sync::persist::delete_node;
use catalog_sync::walk::TreeSync;

#[derive(Parser)]
#[command(name = "catalog-sync")]
#[command(about = "Synchronize a data catalog into a Wikibase knowledge base")]
struct Cli {
    /// Config file prefix (default: catsync).
    #[arg(short, long, default_value = "catsync", global = true)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sync every node of a catalog manifest, parents first.
    Sync {
        /// Path to the JSON manifest.
        #[arg(short, long)]
        manifest: PathBuf,

        /// Resolve and reconcile without writing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the reconciled statements of one node without writing.
    Show {
        #[arg(short, long)]
        kind: String,
        #[arg(short, long)]
        label: String,
        /// Parent label (required for databases).
        #[arg(short, long)]
        parent: Option<String>,
    },
    /// Delete the item of one node.
    Delete {
        #[arg(short, long)]
        kind: String,
        #[arg(short, long)]
        label: String,
    },
    /// Show which item links to a node as its parent.
    Parent {
        #[arg(short, long)]
        kind: String,
        #[arg(short, long)]
        label: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let mut settings = Settings::load(&cli.config)?;

    // Validate the manifest before touching the network.
    let manifest = match &cli.command {
        Command::Sync { manifest, .. } => Some(Manifest::load(manifest)?),
        _ => None,
    };

    let client = WikibaseClient::connect(&settings.wikibase).await?;
    tracing::info!(api = %settings.wikibase.api_url, sparql = %settings.wikibase.sparql_url, "Connected to Wikibase");
    let schema = resolve_schema(&client, &settings.schema).await?;

    match cli.command {
        Command::Sync { dry_run, .. } => {
            let manifest =
                manifest.ok_or_else(|| anyhow::anyhow!("manifest was not loaded"))?;
            settings.sync.dry_run |= dry_run;
            let report = TreeSync::new(&client, &schema, &settings.sync)
                .run(&manifest)
                .await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.is_success() {
                anyhow::bail!(
                    "sync run {} finished with {} failed node(s)",
                    report.run_id,
                    report.failed
                );
            }
        }
        Command::Show {
            kind,
            label,
            parent,
        } => {
            let request = NodeRequest {
                kind: parse_kind(&kind)?,
                label,
                parent_label: parent,
                desired: Vec::new(),
            };
            let node = CatalogNode::prepare(&client, &schema, request).await?;
            println!("{}", serde_json::to_string_pretty(&node)?);
        }
        Command::Delete { kind, label } => {
            let id = delete_node(&client, parse_kind(&kind)?, &label).await?;
            println!("{}", serde_json::json!({ "deleted": id, "label": label }));
        }
        Command::Parent { kind, label } => {
            let (parent_label, parent_id) =
                inspect_parent(&client, &schema, parse_kind(&kind)?, &label).await?;
            println!(
                "{}",
                serde_json::json!({ "label": label, "parent": parent_label, "parent_id": parent_id })
            );
        }
    }

    Ok(())
}

fn parse_kind(s: &str) -> anyhow::Result<NodeKind> {
    Ok(s.parse::<NodeKind>()?)
}

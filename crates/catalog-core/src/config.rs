//! Configuration management for catalog-sync.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`CATSYNC__` prefix, `__` separator,
//!    e.g. `CATSYNC__WIKIBASE__PASSWORD`)
//! 2. Config file (`catsync.toml`)
//! 3. Defaults
//!
//! The configuration is read once per process and treated as immutable.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::Result;
use crate::types::NodeKind;

pub const ENV_PREFIX: &str = "CATSYNC";

/// Build the layered configuration: optional file named `file_prefix`
/// (any extension `config` understands) overlaid by environment variables.
pub fn load(file_prefix: &str) -> Result<config::Config> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    Ok(cfg)
}

/// Deserialize one top-level section, falling back to its default when the
/// section is absent.
pub fn section<T: DeserializeOwned + Default>(cfg: &config::Config, name: &str) -> Result<T> {
    match cfg.get::<T>(name) {
        Ok(value) => Ok(value),
        Err(config::ConfigError::NotFound(_)) => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

/// Connection settings for the Wikibase instance.
#[derive(Debug, Clone, Deserialize)]
pub struct WikibaseConfig {
    /// MediaWiki action API endpoint (`.../api.php`).
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// SPARQL query endpoint of the backing triple store.
    #[serde(default = "default_sparql_url")]
    pub sparql_url: String,

    /// Prefix of entity URIs in SPARQL results; stripped to get bare ids.
    #[serde(default = "default_entity_uri_prefix")]
    pub entity_uri_prefix: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Language of item labels.
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:8181/api.php".to_string()
}

fn default_sparql_url() -> String {
    "http://localhost:8989/bigdata/sparql".to_string()
}

fn default_entity_uri_prefix() -> String {
    "http://wikibase.svc/entity/".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_user_agent() -> String {
    concat!("catalog-sync/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for WikibaseConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            sparql_url: default_sparql_url(),
            entity_uri_prefix: default_entity_uri_prefix(),
            user: String::new(),
            password: String::new(),
            language: default_language(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Property schema as written in the config file.
///
/// Every property or item reference may be given either as an id (`P12`,
/// `Q3`) or as the entity's label; labels are resolved against the store
/// at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub global: GlobalSchemaConfig,
    #[serde(default)]
    pub company: KindSchemaConfig,
    #[serde(default)]
    pub database: KindSchemaConfig,
    #[serde(default)]
    pub schema: KindSchemaConfig,
    #[serde(default)]
    pub table: KindSchemaConfig,
    #[serde(default)]
    pub column: KindSchemaConfig,
}

/// Properties and items shared by every catalog level.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalSchemaConfig {
    /// Property linking a node to the company item.
    #[serde(default)]
    pub in_company: String,
    /// Property linking a node to its parent.
    #[serde(default)]
    pub located_in: String,
    /// Qualifier property carrying the provenance text.
    #[serde(default)]
    pub provenance_qualifier: String,
    /// The company item every node is attached to.
    #[serde(default)]
    pub company: String,
}

/// Statement bindings of one catalog level.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KindSchemaConfig {
    /// Property the parent level uses to point at nodes of this level.
    #[serde(default)]
    pub link_property: Option<String>,
    /// String-valued statements: label → property.
    #[serde(default)]
    pub statements: BTreeMap<String, String>,
    /// Item-valued statements: label → property.
    #[serde(default)]
    pub item_statements: BTreeMap<String, String>,
    /// Override whether `in_company` / `located_in` are written.
    #[serde(default)]
    pub structural_links: Option<bool>,
}

impl SchemaConfig {
    pub fn kind(&self, kind: NodeKind) -> &KindSchemaConfig {
        match kind {
            NodeKind::Company => &self.company,
            NodeKind::Database => &self.database,
            NodeKind::Schema => &self.schema,
            NodeKind::Table => &self.table,
            NodeKind::Column => &self.column,
        }
    }

    /// Every configured property reference, with a short description of
    /// where it appears (used in error messages).
    pub fn property_refs(&self) -> Vec<(String, &str)> {
        let mut refs = vec![
            ("global.in_company".to_string(), self.global.in_company.as_str()),
            ("global.located_in".to_string(), self.global.located_in.as_str()),
            (
                "global.provenance_qualifier".to_string(),
                self.global.provenance_qualifier.as_str(),
            ),
        ];
        for kind in NodeKind::ALL {
            let section = self.kind(kind);
            if let Some(link) = &section.link_property {
                refs.push((format!("{kind}.link_property"), link.as_str()));
            }
            for (label, property) in section.statements.iter().chain(&section.item_statements) {
                refs.push((format!("{kind}.{label}"), property.as_str()));
            }
        }
        refs
    }
}

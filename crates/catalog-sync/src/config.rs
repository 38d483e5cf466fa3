//! Configuration for the catalog synchronizer.

use serde::Deserialize;

use catalog_core::config::{self, SchemaConfig, WikibaseConfig};

use crate::error::Result;

/// Behaviour of a sync run.
///
/// Loaded from the `[sync]` section of `catsync.toml` or `CATSYNC__SYNC__`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Keep going with sibling nodes after a node fails.
    #[serde(default = "default_true")]
    pub continue_on_error: bool,

    /// Resolve and reconcile without writing.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            continue_on_error: true,
            dry_run: false,
        }
    }
}

/// Everything the binary reads from configuration.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub wikibase: WikibaseConfig,
    pub schema: SchemaConfig,
    pub sync: SyncConfig,
}

impl Settings {
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::load(file_prefix)?;
        Ok(Self {
            wikibase: config::section(&cfg, "wikibase")?,
            schema: config::section(&cfg, "schema")?,
            sync: config::section(&cfg, "sync")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(config.continue_on_error);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("catsync.toml"),
            r#"
[wikibase]
user = "SyncBot"

[schema.global]
company = "Q1"

[sync]
dry_run = true
"#,
        )
        .unwrap();
        let prefix = dir.path().join("catsync");
        let settings = Settings::load(prefix.to_str().unwrap()).unwrap();

        assert_eq!(settings.wikibase.user, "SyncBot");
        assert_eq!(settings.schema.global.company, "Q1");
        assert!(settings.sync.dry_run);
        assert!(settings.sync.continue_on_error);
    }
}

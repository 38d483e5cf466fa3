//! Property schema: which Wikibase property backs each statement label,
//! per catalog level.
//!
//! Built once at startup from [`SchemaConfig`] after property and item
//! labels have been resolved to ids, then shared read-only for the run.

use std::collections::BTreeMap;

use crate::config::SchemaConfig;
use crate::error::{CatalogError, Result};
use crate::types::{ItemId, NodeKind, PropertyId, StatementType};

/// Statement label of the link to the company item.
pub const IN_COMPANY: &str = "in_company";
/// Statement label of the link to the parent node.
pub const LOCATED_IN: &str = "located_in";

/// Ids shared by all catalog levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalSchema {
    pub in_company: PropertyId,
    pub located_in: PropertyId,
    pub provenance_qualifier: PropertyId,
    pub company: ItemId,
}

/// The property behind a statement label and how its values are encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub property: PropertyId,
    pub statement_type: StatementType,
}

/// Resolved configuration of one catalog level.
#[derive(Debug, Clone)]
pub struct NodeKindConfig {
    pub kind: NodeKind,
    /// Property the parent level uses to point at nodes of this level.
    pub link_property: Option<PropertyId>,
    /// Label of the child-link statement, if this level has children.
    pub repeated_label: Option<String>,
    /// Whether `in_company` / `located_in` are written.
    pub structural_links: bool,
    bindings: BTreeMap<String, Binding>,
}

impl NodeKindConfig {
    pub fn binding(&self, label: &str) -> Option<&Binding> {
        self.bindings.get(label)
    }

    /// All label bindings: configured statements, the child link, and the
    /// structural links when enabled.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.bindings.iter().map(|(label, b)| (label.as_str(), b))
    }

    /// Labels owned by the sync regardless of qualifier.
    pub fn is_structural(&self, label: &str) -> bool {
        self.structural_links && (label == IN_COMPANY || label == LOCATED_IN)
    }
}

/// The full property schema, indexed by [`NodeKind`].
#[derive(Debug, Clone)]
pub struct PropertySchema {
    pub global: GlobalSchema,
    kinds: Vec<NodeKindConfig>,
}

impl PropertySchema {
    /// Build the schema from raw config. Entries that are not ids are
    /// looked up in `properties` / `items` (label → id).
    pub fn build(
        raw: &SchemaConfig,
        properties: &BTreeMap<String, PropertyId>,
        items: &BTreeMap<String, ItemId>,
    ) -> Result<Self> {
        let property = |what: &str, value: &str| -> Result<PropertyId> {
            if value.is_empty() {
                return Err(CatalogError::Config(format!("schema.{what} is not set")));
            }
            PropertyId::parse(value).or_else(|_| {
                properties.get(value).cloned().ok_or_else(|| {
                    CatalogError::Config(format!(
                        "schema.{what}: no property with id or label {value:?}"
                    ))
                })
            })
        };

        let company = if raw.global.company.is_empty() {
            return Err(CatalogError::Config("schema.global.company is not set".to_string()));
        } else {
            ItemId::parse(&raw.global.company).or_else(|_| {
                items.get(&raw.global.company).cloned().ok_or_else(|| {
                    CatalogError::Config(format!(
                        "schema.global.company: no item with id or label {:?}",
                        raw.global.company
                    ))
                })
            })?
        };

        let global = GlobalSchema {
            in_company: property("global.in_company", &raw.global.in_company)?,
            located_in: property("global.located_in", &raw.global.located_in)?,
            provenance_qualifier: property(
                "global.provenance_qualifier",
                &raw.global.provenance_qualifier,
            )?,
            company,
        };

        let mut link_properties = BTreeMap::new();
        for kind in NodeKind::ALL {
            match (&raw.kind(kind).link_property, kind.parent()) {
                (Some(link), _) => {
                    link_properties.insert(kind, property(&format!("{kind}.link_property"), link)?);
                }
                (None, Some(parent)) => {
                    return Err(CatalogError::Config(format!(
                        "schema.{kind}.link_property is required: the {parent} level links to it"
                    )));
                }
                (None, None) => {}
            }
        }

        let mut kinds = Vec::with_capacity(NodeKind::ALL.len());
        for kind in NodeKind::ALL {
            let section = raw.kind(kind);
            let structural_links = section
                .structural_links
                .unwrap_or_else(|| kind.structural_links());
            let repeated_label = kind.repeated_label().map(String::from);

            let mut bindings = BTreeMap::new();
            let mut bind = |label: &str, binding: Binding| -> Result<()> {
                if bindings.insert(label.to_string(), binding).is_some() {
                    return Err(CatalogError::Config(format!(
                        "schema.{kind}: statement label {label:?} is bound twice"
                    )));
                }
                Ok(())
            };

            for (label, value) in &section.statements {
                bind(
                    label,
                    Binding {
                        property: property(&format!("{kind}.{label}"), value)?,
                        statement_type: StatementType::String,
                    },
                )?;
            }
            for (label, value) in &section.item_statements {
                bind(
                    label,
                    Binding {
                        property: property(&format!("{kind}.{label}"), value)?,
                        statement_type: StatementType::Item,
                    },
                )?;
            }
            if let (Some(label), Some(child)) = (&repeated_label, kind.child()) {
                if let Some(link) = link_properties.get(&child) {
                    bind(
                        label,
                        Binding {
                            property: link.clone(),
                            statement_type: StatementType::Item,
                        },
                    )?;
                }
            }
            if structural_links {
                bind(
                    IN_COMPANY,
                    Binding {
                        property: global.in_company.clone(),
                        statement_type: StatementType::Item,
                    },
                )?;
                bind(
                    LOCATED_IN,
                    Binding {
                        property: global.located_in.clone(),
                        statement_type: StatementType::Item,
                    },
                )?;
            }

            tracing::debug!(
                kind = %kind,
                bindings = bindings.len(),
                structural_links,
                "Resolved statement bindings"
            );
            kinds.push(NodeKindConfig {
                kind,
                link_property: link_properties.get(&kind).cloned(),
                repeated_label,
                structural_links,
                bindings,
            });
        }

        Ok(Self { global, kinds })
    }

    pub fn kind(&self, kind: NodeKind) -> &NodeKindConfig {
        &self.kinds[kind as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GlobalSchemaConfig, KindSchemaConfig};

    fn pid(s: &str) -> PropertyId {
        PropertyId::parse(s).unwrap()
    }

    fn raw_schema() -> SchemaConfig {
        let kind = |link: Option<&str>, statements: &[(&str, &str)]| KindSchemaConfig {
            link_property: link.map(String::from),
            statements: statements
                .iter()
                .map(|(l, p)| (l.to_string(), p.to_string()))
                .collect(),
            ..Default::default()
        };
        SchemaConfig {
            global: GlobalSchemaConfig {
                in_company: "P2".to_string(),
                located_in: "located in".to_string(),
                provenance_qualifier: "P4".to_string(),
                company: "Acme".to_string(),
            },
            company: kind(None, &[("website", "P5")]),
            database: kind(Some("P11"), &[("engine", "P6")]),
            schema: kind(Some("P12"), &[]),
            table: kind(Some("P13"), &[("row_count", "P7"), ("owner", "P8")]),
            column: kind(Some("P14"), &[("data_type", "P9")]),
        }
    }

    fn lookups() -> (BTreeMap<String, PropertyId>, BTreeMap<String, ItemId>) {
        let props = BTreeMap::from([("located in".to_string(), pid("P3"))]);
        let items = BTreeMap::from([("Acme".to_string(), ItemId::parse("Q1").unwrap())]);
        (props, items)
    }

    #[test]
    fn test_build_resolves_labels() {
        let (props, items) = lookups();
        let schema = PropertySchema::build(&raw_schema(), &props, &items).unwrap();
        assert_eq!(schema.global.located_in, pid("P3"));
        assert_eq!(schema.global.company.as_str(), "Q1");
    }

    #[test]
    fn test_child_link_binding_uses_child_link_property() {
        let (props, items) = lookups();
        let schema = PropertySchema::build(&raw_schema(), &props, &items).unwrap();

        let table = schema.kind(NodeKind::Table);
        assert_eq!(table.repeated_label.as_deref(), Some("COLUMN"));
        let binding = table.binding("COLUMN").unwrap();
        assert_eq!(binding.property, pid("P14"));
        assert_eq!(binding.statement_type, StatementType::Item);

        let column = schema.kind(NodeKind::Column);
        assert_eq!(column.repeated_label, None);
        assert!(column.binding("COLUMN").is_none());
    }

    #[test]
    fn test_structural_bindings_follow_kind() {
        let (props, items) = lookups();
        let schema = PropertySchema::build(&raw_schema(), &props, &items).unwrap();

        let company = schema.kind(NodeKind::Company);
        assert!(!company.structural_links);
        assert!(company.binding(IN_COMPANY).is_none());
        assert!(!company.is_structural(IN_COMPANY));

        let db = schema.kind(NodeKind::Database);
        assert_eq!(db.binding(LOCATED_IN).unwrap().property, pid("P3"));
        assert!(db.is_structural(LOCATED_IN));
        assert!(!db.is_structural("engine"));
    }

    #[test]
    fn test_unresolved_label_is_config_error() {
        let (props, _) = lookups();
        let err = PropertySchema::build(&raw_schema(), &props, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, CatalogError::Config(msg) if msg.contains("global.company")));
    }

    #[test]
    fn test_missing_link_property_is_config_error() {
        let (props, items) = lookups();
        let mut raw = raw_schema();
        raw.schema.link_property = None;
        let err = PropertySchema::build(&raw, &props, &items).unwrap_err();
        assert!(matches!(err, CatalogError::Config(msg) if msg.contains("schema.link_property")));
    }

    #[test]
    fn test_reserved_label_clash_is_rejected() {
        let (props, items) = lookups();
        let mut raw = raw_schema();
        raw.table
            .statements
            .insert(LOCATED_IN.to_string(), "P30".to_string());
        assert!(PropertySchema::build(&raw, &props, &items).is_err());
    }
}

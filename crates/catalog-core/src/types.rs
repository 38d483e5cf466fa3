//! Core domain types for catalog-sync.
//!
//! Catalog nodes (Company → Database → Schema → Table → Column) are stored
//! as Wikibase items. Their attributes are statements, each tagged with a
//! provenance qualifier telling sync-owned values apart from manual edits.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CatalogError, Result};

// ── Identifiers ───────────────────────────────────────────────────

/// Kind of Wikibase entity, distinguished by the id prefix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Property,
    Item,
}

impl EntityKind {
    pub fn prefix(self) -> char {
        match self {
            Self::Property => 'P',
            Self::Item => 'Q',
        }
    }

    /// Whether `id` is a well-formed id of this kind (`P31`, `Q42`).
    pub fn matches(self, id: &str) -> bool {
        match id.strip_prefix(self.prefix()) {
            Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
            None => false,
        }
    }
}

/// Identifier of a Wikibase item (`Q<digits>`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(String);

impl ItemId {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if EntityKind::Item.matches(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(CatalogError::InvalidId {
                kind: "item",
                value: raw.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a Wikibase property (`P<digits>`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct PropertyId(String);

impl PropertyId {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if EntityKind::Property.matches(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(CatalogError::InvalidId {
                kind: "property",
                value: raw.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ItemId {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl TryFrom<String> for PropertyId {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

impl From<PropertyId> for String {
    fn from(id: PropertyId) -> Self {
        id.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Node Kinds ────────────────────────────────────────────────────

/// The five levels of the catalog hierarchy, root first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Company,
    Database,
    Schema,
    Table,
    Column,
}

/// How a node finds the label of its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRule {
    /// The caller passes the parent label.
    Explicit,
    /// The parent label is the node label without its last dot segment.
    LabelPrefix,
}

impl NodeKind {
    pub const ALL: [NodeKind; 5] = [
        Self::Company,
        Self::Database,
        Self::Schema,
        Self::Table,
        Self::Column,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Database => "database",
            Self::Schema => "schema",
            Self::Table => "table",
            Self::Column => "column",
        }
    }

    /// Upper-case name used as the statement label of child links (`TABLE`).
    pub fn section_name(self) -> &'static str {
        match self {
            Self::Company => "COMPANY",
            Self::Database => "DATABASE",
            Self::Schema => "SCHEMA",
            Self::Table => "TABLE",
            Self::Column => "COLUMN",
        }
    }

    pub fn parent(self) -> Option<NodeKind> {
        match self {
            Self::Company => None,
            Self::Database => Some(Self::Company),
            Self::Schema => Some(Self::Database),
            Self::Table => Some(Self::Schema),
            Self::Column => Some(Self::Table),
        }
    }

    pub fn child(self) -> Option<NodeKind> {
        match self {
            Self::Company => Some(Self::Database),
            Self::Database => Some(Self::Schema),
            Self::Schema => Some(Self::Table),
            Self::Table => Some(Self::Column),
            Self::Column => None,
        }
    }

    /// Label of the repeated statement linking a node to each of its children.
    pub fn repeated_label(self) -> Option<&'static str> {
        self.child().map(NodeKind::section_name)
    }

    pub fn parent_rule(self) -> ParentRule {
        match self {
            Self::Company | Self::Database => ParentRule::Explicit,
            Self::Schema | Self::Table | Self::Column => ParentRule::LabelPrefix,
        }
    }

    /// Whether nodes of this kind carry `in_company` / `located_in` statements.
    pub fn structural_links(self) -> bool {
        !matches!(self, Self::Company)
    }

    /// Work out the parent label of `label`.
    ///
    /// Company is the only kind allowed to have no parent. For label-prefix
    /// kinds an explicit parent is accepted only if it agrees with the prefix.
    pub fn parent_label(self, label: &str, explicit: Option<&str>) -> Result<Option<String>> {
        match self.parent_rule() {
            ParentRule::Explicit => match explicit {
                Some(parent) => Ok(Some(parent.to_string())),
                None if self == Self::Company => Ok(None),
                None => Err(CatalogError::Schema(format!(
                    "{} {label:?} requires an explicit parent label",
                    self.as_str()
                ))),
            },
            ParentRule::LabelPrefix => {
                let derived = match label.rsplit_once('.') {
                    Some((prefix, last)) if !prefix.is_empty() && !last.is_empty() => prefix,
                    _ => {
                        return Err(CatalogError::Schema(format!(
                            "{} label {label:?} has no parent segment",
                            self.as_str()
                        )))
                    }
                };
                if let Some(parent) = explicit {
                    if parent != derived {
                        return Err(CatalogError::Schema(format!(
                            "{} {label:?}: parent {parent:?} does not match label prefix {derived:?}",
                            self.as_str()
                        )));
                    }
                }
                Ok(Some(derived.to_string()))
            }
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "company" => Ok(Self::Company),
            "database" => Ok(Self::Database),
            "schema" => Ok(Self::Schema),
            "table" => Ok(Self::Table),
            "column" => Ok(Self::Column),
            _ => Err(CatalogError::Schema(format!(
                "unknown node kind {s:?}; choose company, database, schema, table, column"
            ))),
        }
    }
}

// ── Statements ────────────────────────────────────────────────────

/// How a statement value is encoded on write.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum StatementType {
    String,
    Item,
}

impl StatementType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Item => "item",
        }
    }
}

impl FromStr for StatementType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "string" => Ok(Self::String),
            "item" => Ok(Self::Item),
            other => Err(CatalogError::Schema(format!(
                "unknown statement type {other:?}"
            ))),
        }
    }
}

pub const API_UPDATE: &str = "API update";
pub const MANUAL_UPDATE: &str = "Manual update";

/// Who owns a statement: the sync (`Api`) or a human editor (`Manual`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provenance {
    #[serde(rename = "API update")]
    Api,
    #[serde(rename = "Manual update")]
    Manual,
}

impl Provenance {
    /// Classify a stored qualifier. API qualifiers carry a timestamp suffix,
    /// so any text containing `API update` counts; anything else is manual.
    pub fn from_qualifier(qualifier: Option<&str>) -> Self {
        match qualifier {
            Some(text) if text.contains(API_UPDATE) => Self::Api,
            _ => Self::Manual,
        }
    }

    /// Qualifier text written to the store.
    pub fn qualifier_text(self, at: DateTime<Utc>) -> String {
        match self {
            Self::Api => format!("{API_UPDATE} {}", at.format("%Y-%m-%d %H:%M:%S")),
            Self::Manual => MANUAL_UPDATE.to_string(),
        }
    }
}

/// A row the caller wants asserted on a node.
///
/// `statement_type` stays raw until reconciliation so that a malformed row
/// is reported there as a schema error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DesiredStatement {
    #[serde(rename = "STATEMENT_VALUE", deserialize_with = "value_as_string")]
    pub value: String,
    #[serde(rename = "STATEMENT_LABEL")]
    pub label: String,
    #[serde(rename = "STATEMENT_TYPE", default = "default_statement_type")]
    pub statement_type: String,
    #[serde(
        rename = "ITEM_LABEL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub item_label: Option<String>,
}

impl DesiredStatement {
    pub fn string(label: &str, value: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
            statement_type: StatementType::String.as_str().to_string(),
            item_label: None,
        }
    }

    pub fn item(label: &str, id: &ItemId, item_label: Option<&str>) -> Self {
        Self {
            value: id.to_string(),
            label: label.to_string(),
            statement_type: StatementType::Item.as_str().to_string(),
            item_label: item_label.map(String::from),
        }
    }
}

fn default_statement_type() -> String {
    StatementType::String.as_str().to_string()
}

/// Catalog extracts often carry numbers and booleans; store them as text.
fn value_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

/// A resolved statement row, ready to be written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Statement {
    #[serde(rename = "STATEMENT_VALUE")]
    pub value: String,
    #[serde(rename = "STATEMENT_LABEL")]
    pub label: String,
    #[serde(rename = "STATEMENT_TYPE")]
    pub statement_type: StatementType,
    #[serde(
        rename = "ITEM_LABEL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub item_label: Option<String>,
    #[serde(rename = "QUALIFIER")]
    pub qualifier: Provenance,
}

/// A statement as read back from the store, tagged with the label it was
/// fetched under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredStatement {
    pub label: String,
    pub statement_type: StatementType,
    pub value: String,
    pub item_label: Option<String>,
    pub qualifier: Option<String>,
}

impl StoredStatement {
    /// Missing qualifiers default to manual.
    pub fn into_statement(self) -> Statement {
        let qualifier = Provenance::from_qualifier(self.qualifier.as_deref());
        Statement {
            value: self.value,
            label: self.label,
            statement_type: self.statement_type,
            item_label: self.item_label,
            qualifier,
        }
    }
}

/// An item linking to a node through `located_in`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChildItem {
    pub id: ItemId,
    pub label: Option<String>,
}

// ── Write Side ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimValue {
    String(String),
    Item(ItemId),
}

/// A statement in the form the write gateway sends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub property: PropertyId,
    pub value: ClaimValue,
    /// Provenance qualifier: (qualifier property, text).
    pub qualifier: Option<(PropertyId, String)>,
}

use crate::item::ItemId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Names of the record fields read by the rewriter.
pub mod fields {
    pub const SOURCE_URL: &str = "SourceUrl";
    pub const TARGET_URL: &str = "TargetUrl";
    pub const SOURCE_HOST_NAME: &str = "SourceHostName";
    pub const TARGET_HOST_NAME: &str = "TargetHostName";
    /// Pipe-delimited bulk rules stored on the rules table item.
    pub const RULES_TABLE: &str = "RulesTable";
}

/// The type tag of a record in the rule source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordKind {
    HostNameRewriteRule,
    UrlRewriteRule,
    /// Any other record type; ignored while loading rules.
    Other(String),
}

impl RecordKind {
    pub fn as_str(&self) -> &str {
        match self {
            RecordKind::HostNameRewriteRule => "HostNameRewriteRule",
            RecordKind::UrlRewriteRule => "UrlRewriteRule",
            RecordKind::Other(kind) => kind,
        }
    }
}

impl From<&str> for RecordKind {
    fn from(value: &str) -> Self {
        match value {
            "HostNameRewriteRule" => RecordKind::HostNameRewriteRule,
            "UrlRewriteRule" => RecordKind::UrlRewriteRule,
            other => RecordKind::Other(other.to_string()),
        }
    }
}

impl From<String> for RecordKind {
    fn from(value: String) -> Self {
        RecordKind::from(value.as_str())
    }
}

impl From<RecordKind> for String {
    fn from(value: RecordKind) -> Self {
        value.as_str().to_string()
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw record as stored in the rule source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub id: ItemId,
    pub kind: RecordKind,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl RuleRecord {
    pub fn new(id: ItemId, kind: RecordKind) -> Self {
        Self {
            id,
            kind,
            fields: BTreeMap::new(),
        }
    }

    /// Adds a named field value.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns the value of a field, or the empty string when it is absent.
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }
}

use crate::item::ItemId;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Errors related to the core types of the rewriter.
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid item id: {0}")]
    InvalidItemId(String),
}

/// A field of a rewrite rule record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleField {
    SourceUrl,
    TargetUrl,
    SourceHostName,
    TargetHostName,
}

impl RuleField {
    /// Returns the kind of rule this field belongs to, for log messages.
    fn rule_kind(&self) -> &'static str {
        match self {
            RuleField::SourceUrl | RuleField::TargetUrl => "URL",
            RuleField::SourceHostName | RuleField::TargetHostName => "Hostname",
        }
    }
}

impl Display for RuleField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleField::SourceUrl => f.write_str("Source URL"),
            RuleField::TargetUrl => f.write_str("Target URL"),
            RuleField::SourceHostName => f.write_str("Source Hostname"),
            RuleField::TargetHostName => f.write_str("Target Hostname"),
        }
    }
}

/// Why a rule field was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReason {
    #[error("is empty")]
    Empty,
    #[error("does not contain a hostname or IP")]
    NotAHostName,
    #[error("does not contain a valid URL ({0})")]
    InvalidUrl(String),
}

/// A single rule record failed its field checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} rewrite rule '{rule_id}' is invalid because the {field} field {reason}", .field.rule_kind())]
pub struct ValidationError {
    pub rule_id: ItemId,
    pub field: RuleField,
    pub reason: InvalidReason,
}

impl ValidationError {
    pub fn new(rule_id: &ItemId, field: RuleField, reason: InvalidReason) -> Self {
        Self {
            rule_id: rule_id.clone(),
            field,
            reason,
        }
    }
}

/// A rule URL could not be resolved into a well-formed absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("URL '{url}' defined in rewrite rule '{rule_id}' is not well formed: {reason}")]
pub struct MalformedUrlError {
    pub rule_id: ItemId,
    pub url: String,
    pub reason: String,
}

/// Missing or unusable configuration, including an unreachable rule location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("setting '{0}' could not be found and is required")]
    MissingSetting(&'static str),
    #[error("setting '{name}' has an invalid value '{value}' ({expected} expected)")]
    InvalidSetting {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("rules folder with id '{0}' does not exist")]
    RulesFolderNotFound(ItemId),
    #[error("rule source is unreachable: {0}")]
    Unreachable(String),
}

impl From<StorageError> for ConfigurationError {
    fn from(value: StorageError) -> Self {
        ConfigurationError::Unreachable(value.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_rule_and_field() {
        let id = ItemId::new_unchecked("rule-1");
        let err = ValidationError::new(&id, RuleField::TargetHostName, InvalidReason::Empty);
        assert_eq!(
            err.to_string(),
            "Hostname rewrite rule 'rule-1' is invalid because the Target Hostname field is empty"
        );
    }

    #[test]
    fn storage_error_becomes_unreachable() {
        let err: ConfigurationError = StorageError::Timeout("pool".into()).into();
        assert!(matches!(err, ConfigurationError::Unreachable(_)));
    }
}

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

const MAX_LENGTH: usize = 128;

/// An opaque identifier of an item in the rule source.
///
/// Ids are non-empty, at most 128 characters and contain no whitespace
/// or control characters. Beyond that they are not interpreted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(String);

impl ItemId {
    /// Creates a new `ItemId` after validating the input.
    pub fn new(id: impl Into<String>) -> std::result::Result<Self, CoreError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Creates an `ItemId` without validation.
    ///
    /// Use this only for ids produced by trusted internal sources
    /// (e.g. synthetic ids for rules parsed from a rules table).
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives the id of a rule defined on `line` (1-based) of the rules table
    /// stored in this item.
    pub fn table_line(&self, line: usize) -> Self {
        Self(format!("{}#{}", self.0, line))
    }

    fn validate(id: &str) -> std::result::Result<(), CoreError> {
        if id.is_empty() || id.len() > MAX_LENGTH {
            return Err(CoreError::InvalidItemId(format!(
                "length must be between 1 and {}, got {}",
                MAX_LENGTH,
                id.len()
            )));
        }

        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(CoreError::InvalidItemId(format!(
                "must not contain whitespace or control characters: '{}'",
                id
            )));
        }

        Ok(())
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ItemId {
    type Error = CoreError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ItemId> for String {
    fn from(value: ItemId) -> Self {
        value.0
    }
}

impl std::str::FromStr for ItemId {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}

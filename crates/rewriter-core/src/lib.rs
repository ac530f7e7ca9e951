//! Core types and traits for the rewriter.
//!
//! This crate provides the rule models, the read-only [`RuleSource`]
//! abstraction over the repository that defines rules, the typed
//! [`RewriterSettings`] and the error taxonomy shared by the other crates.

pub mod error;
pub mod host_rule;
pub mod item;
pub mod record;
pub mod settings;
pub mod source;
pub mod store;
pub mod url_rule;

pub use error::{
    ConfigurationError, CoreError, InvalidReason, MalformedUrlError, RuleField, StorageError,
    ValidationError,
};
pub use host_rule::HostNameRule;
pub use item::ItemId;
pub use record::{fields, RecordKind, RuleRecord};
pub use settings::RewriterSettings;
pub use source::RuleSource;
pub use store::{LoadedRules, RuleStore};
pub use url_rule::{LookupKey, OriginKey, UrlRule};

use crate::error::{InvalidReason, RuleField, ValidationError};
use crate::item::ItemId;
use crate::record::{fields, RuleRecord};
use std::net::Ipv4Addr;

/// Rewrites requests for one hostname to another, keeping path and query.
///
/// Both hostnames are given without scheme, port or slashes, e.g.
/// `www.example.com` or `10.0.0.1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostNameRule {
    id: ItemId,
    source_host: String,
    target_host: String,
}

impl HostNameRule {
    /// Creates a validated hostname rule.
    pub fn new(
        id: ItemId,
        source_host: impl Into<String>,
        target_host: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let source_host = source_host.into();
        let target_host = target_host.into();

        validate_host(&id, RuleField::SourceHostName, &source_host)?;
        validate_host(&id, RuleField::TargetHostName, &target_host)?;

        Ok(Self {
            id,
            source_host,
            target_host,
        })
    }

    /// Builds a rule from a `HostNameRewriteRule` record.
    pub fn from_record(record: &RuleRecord) -> Result<Self, ValidationError> {
        Self::new(
            record.id.clone(),
            record.field(fields::SOURCE_HOST_NAME),
            record.field(fields::TARGET_HOST_NAME),
        )
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn source_host(&self) -> &str {
        &self.source_host
    }

    pub fn target_host(&self) -> &str {
        &self.target_host
    }
}

fn validate_host(id: &ItemId, field: RuleField, host: &str) -> Result<(), ValidationError> {
    if host.is_empty() {
        return Err(ValidationError::new(id, field, InvalidReason::Empty));
    }

    if host.parse::<Ipv4Addr>().is_ok() || is_host_name(host) {
        Ok(())
    } else {
        Err(ValidationError::new(id, field, InvalidReason::NotAHostName))
    }
}

/// Dot-separated labels of ASCII letters, digits and inner hyphens.
fn is_host_name(host: &str) -> bool {
    host.split('.').all(|label| {
        !label.is_empty()
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}

use crate::error::ConfigurationError;
use crate::host_rule::HostNameRule;
use crate::url_rule::UrlRule;
use async_trait::async_trait;

/// One complete snapshot of the rules read from the rule source, in
/// source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedRules {
    pub url_rules: Vec<UrlRule>,
    pub host_rules: Vec<HostNameRule>,
}

impl LoadedRules {
    pub fn is_empty(&self) -> bool {
        self.url_rules.is_empty() && self.host_rules.is_empty()
    }
}

/// Loads validated rules from wherever they are defined.
///
/// Invalid individual records are dropped by the implementation; only a
/// failure to reach the rules as a whole is reported as an error.
#[async_trait]
pub trait RuleStore: Send + Sync + 'static {
    async fn load(&self) -> Result<LoadedRules, ConfigurationError>;
}

use rewriter_core::{HostNameRule, LoadedRules, LookupKey, OriginKey, UrlRule};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Positions of URL rules in load order.
type Positions = Vec<usize>;

/// One complete generation of rules, as seen by lookups.
///
/// URL rules are unique on their lower-cased source URL; when the source
/// defines the same source URL more than once the first rule wins. Both
/// collections keep source order.
///
/// URL rules are indexed by lower-cased path, and absolute ones also by
/// origin, so a lookup only visits the rules sharing the request's
/// location. Hostname rules are indexed by lower-cased source hostname.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    url_rules: Vec<UrlRule>,
    host_rules: Vec<HostNameRule>,
    relative_by_path: HashMap<String, Positions>,
    absolute_by_origin: HashMap<OriginKey, HashMap<String, Positions>>,
    host_by_source: HashMap<String, usize>,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn url_rules(&self) -> &[UrlRule] {
        &self.url_rules
    }

    pub fn host_rules(&self) -> &[HostNameRule] {
        &self.host_rules
    }

    pub fn is_empty(&self) -> bool {
        self.url_rules.is_empty() && self.host_rules.is_empty()
    }

    /// URL rules whose source location (scheme, host, port and path) equals
    /// `key`'s, in load order. Relative sources match on any origin.
    pub fn url_candidates(&self, key: &LookupKey) -> Vec<&UrlRule> {
        let relative = self
            .relative_by_path
            .get(&key.path)
            .map_or(&[][..], Vec::as_slice);
        let absolute = key
            .origin
            .as_ref()
            .and_then(|origin| self.absolute_by_origin.get(origin))
            .and_then(|paths| paths.get(&key.path))
            .map_or(&[][..], Vec::as_slice);

        let mut positions = Vec::with_capacity(relative.len() + absolute.len());
        positions.extend_from_slice(relative);
        positions.extend_from_slice(absolute);
        positions.sort_unstable();

        positions
            .into_iter()
            .filter_map(|position| self.url_rules.get(position))
            .collect()
    }

    /// The first hostname rule whose source equals `host`, ignoring case.
    pub fn host_rule(&self, host: &str) -> Option<&HostNameRule> {
        self.host_by_source
            .get(&host.to_ascii_lowercase())
            .and_then(|&position| self.host_rules.get(position))
    }
}

impl From<LoadedRules> for RuleSet {
    fn from(loaded: LoadedRules) -> Self {
        let mut seen = HashSet::with_capacity(loaded.url_rules.len());
        let url_rules: Vec<UrlRule> = loaded
            .url_rules
            .into_iter()
            .filter(|rule| {
                let first = seen.insert(rule.source_key());
                if !first {
                    debug!(rule_id = %rule.id(), source = rule.source_url(), "duplicate source URL, keeping the first rule");
                }
                first
            })
            .collect();

        let mut relative_by_path: HashMap<String, Positions> = HashMap::new();
        let mut absolute_by_origin: HashMap<OriginKey, HashMap<String, Positions>> = HashMap::new();
        for (position, rule) in url_rules.iter().enumerate() {
            let key = rule.lookup_key();
            let paths = match &key.origin {
                Some(origin) => absolute_by_origin.entry(origin.clone()).or_default(),
                None => &mut relative_by_path,
            };
            paths.entry(key.path.clone()).or_default().push(position);
        }

        let mut host_by_source = HashMap::with_capacity(loaded.host_rules.len());
        for (position, rule) in loaded.host_rules.iter().enumerate() {
            host_by_source
                .entry(rule.source_host().to_ascii_lowercase())
                .or_insert(position);
        }

        Self {
            url_rules,
            host_rules: loaded.host_rules,
            relative_by_path,
            absolute_by_origin,
            host_by_source,
        }
    }
}

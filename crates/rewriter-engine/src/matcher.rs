//! Lookups of the rule matching a request.
//!
//! URLs are compared component by component after parsing: scheme, host,
//! effective port, path and (in the first phase) query, all ignoring ASCII
//! case. Percent-encoded sequences are compared as they appear in the
//! parsed URL and are not decoded.

use rewriter_cache::RuleSet;
use rewriter_core::{HostNameRule, LookupKey, UrlRule};
use url::Url;

/// A URL rule matching a request.
#[derive(Debug, Clone, Copy)]
pub struct UrlMatch<'a> {
    pub rule: &'a UrlRule,
    /// The rule matched without the query; the request's query is carried
    /// over to the target.
    pub preserve_query: bool,
}

/// Returns the first host rule whose source hostname equals `host`,
/// ignoring case.
pub fn match_host<'a>(rules: &'a RuleSet, host: &str) -> Option<&'a HostNameRule> {
    rules.host_rule(host)
}

/// Returns the first URL rule matching `request`.
///
/// Rules whose source equals the full request URL including the query win
/// over rules matching scheme, host, port and path only. Within each phase
/// the first rule in load order wins. In the second phase the query of the
/// rule's source is not looked at.
pub fn match_url<'a>(rules: &'a RuleSet, request: &Url) -> Option<UrlMatch<'a>> {
    let key = LookupKey::of(request);
    let candidates = rules.url_candidates(&key);

    if let Some(rule) = candidates
        .iter()
        .find(|rule| rule.lookup_key().query == key.query)
    {
        return Some(UrlMatch {
            rule: *rule,
            preserve_query: false,
        });
    }

    candidates.first().map(|rule| UrlMatch {
        rule: *rule,
        preserve_query: true,
    })
}

/// The query of `url`, treating an empty query as none.
pub(crate) fn query(url: &Url) -> Option<&str> {
    url.query().filter(|query| !query.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewriter_core::{ItemId, LoadedRules};

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn url_rule(id: &str, source: &str, target: &str) -> UrlRule {
        UrlRule::new(ItemId::new_unchecked(id), source, target).unwrap()
    }

    fn host_rule(id: &str, source: &str, target: &str) -> HostNameRule {
        HostNameRule::new(ItemId::new_unchecked(id), source, target).unwrap()
    }

    fn url_rules(rules: Vec<UrlRule>) -> RuleSet {
        RuleSet::from(LoadedRules {
            url_rules: rules,
            host_rules: vec![],
        })
    }

    fn matched<'a>(rules: &'a RuleSet, request: &str) -> Option<(&'a str, bool)> {
        match_url(rules, &url(request)).map(|m| (m.rule.id().as_str(), m.preserve_query))
    }

    #[test]
    fn host_match_is_case_insensitive_and_exact() {
        let rules = RuleSet::from(LoadedRules {
            url_rules: vec![],
            host_rules: vec![
                host_rule("h1", "www.old.com", "www.new.com"),
                host_rule("h2", "WWW.OLD.COM", "other.com"),
            ],
        });

        assert_eq!(match_host(&rules, "WWW.Old.com").map(|r| r.id().as_str()), Some("h1"));
        assert!(match_host(&rules, "old.com").is_none());
        assert!(match_host(&rules, "www.old.com.evil").is_none());
    }

    #[test]
    fn full_url_match_discards_request_query() {
        let rules = url_rules(vec![url_rule("u1", "http://a.com/p?x=1", "http://b.com/q?y=2")]);

        assert_eq!(matched(&rules, "http://a.com/p?x=1"), Some(("u1", false)));
        assert_eq!(matched(&rules, "HTTP://A.COM/P?X=1"), Some(("u1", false)));
    }

    #[test]
    fn path_match_preserves_request_query() {
        let rules = url_rules(vec![url_rule("u1", "/old.html", "/new.html")]);

        assert_eq!(matched(&rules, "http://x.com/old.html?q=1"), Some(("u1", true)));
        assert_eq!(matched(&rules, "https://y.com/OLD.html"), Some(("u1", false)));
        assert_eq!(matched(&rules, "http://x.com/old.html/"), None);
    }

    #[test]
    fn full_match_wins_over_earlier_path_match() {
        let rules = url_rules(vec![
            url_rule("path", "/p", "/a"),
            url_rule("full", "/P?x=1", "/b"),
        ]);

        assert_eq!(matched(&rules, "http://x.com/p?x=1"), Some(("full", false)));
        assert_eq!(matched(&rules, "http://x.com/p?x=2"), Some(("path", true)));
    }

    #[test]
    fn first_rule_wins_within_a_phase() {
        let rules = url_rules(vec![
            url_rule("first", "/p?a=1", "/a"),
            url_rule("second", "/p?b=2", "/b"),
        ]);

        assert_eq!(matched(&rules, "http://x.com/p?c=3"), Some(("first", true)));
    }

    #[test]
    fn absolute_sources_compare_scheme_host_and_port() {
        let rules = url_rules(vec![url_rule("u1", "http://a.com/p", "/q")]);

        assert_eq!(matched(&rules, "http://a.com:80/p"), Some(("u1", false)));
        assert_eq!(matched(&rules, "https://a.com/p"), None);
        assert_eq!(matched(&rules, "http://a.com:8080/p"), None);
        assert_eq!(matched(&rules, "http://b.com/p"), None);
    }

    #[test]
    fn empty_query_counts_as_no_query() {
        let rules = url_rules(vec![url_rule("u1", "/p", "/q")]);
        assert_eq!(matched(&rules, "http://x.com/p?"), Some(("u1", false)));
    }

    #[test]
    fn path_phase_ignores_rule_query_and_keeps_request_query() {
        let rules = url_rules(vec![url_rule("u1", "/p?a=1", "/q")]);

        assert_eq!(matched(&rules, "http://x.com/p?a=1"), Some(("u1", false)));
        assert_eq!(matched(&rules, "http://x.com/p?b=2"), Some(("u1", true)));
        assert_eq!(matched(&rules, "http://x.com/p"), Some(("u1", true)));
    }

    #[test]
    fn large_rule_table_is_looked_up_by_location() {
        let rules = url_rules(
            (0..20_000)
                .map(|i| url_rule(&format!("u{i}"), &format!("/page-{i}.html"), "/target"))
                .collect(),
        );

        assert_eq!(matched(&rules, "http://x.com/PAGE-19999.html"), Some(("u19999", false)));
        assert_eq!(matched(&rules, "http://x.com/page-7.html?q=1"), Some(("u7", true)));

        let missing = url("http://x.com/missing.html");
        let started = std::time::Instant::now();
        for _ in 0..1_000 {
            assert!(match_url(&rules, &missing).is_none());
        }
        assert!(
            started.elapsed() < std::time::Duration::from_secs(2),
            "1000 lookups took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn no_rules_no_match() {
        assert!(match_url(&RuleSet::empty(), &url("http://x.com/")).is_none());
        assert!(match_host(&RuleSet::empty(), "x.com").is_none());
    }
}

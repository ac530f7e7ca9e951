use crate::matcher::{self, match_host, match_url};
use crate::request::InboundRequest;
use rewriter_cache::{RuleCache, RuleSet};
use rewriter_core::{ItemId, RewriterSettings};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{error, info, trace};
use url::Url;

/// Why a request was redirected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectReason {
    TrailingSlash,
    UrlRule(ItemId),
    HostName(ItemId),
}

impl Display for RedirectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedirectReason::TrailingSlash => f.write_str("trailing slash"),
            RedirectReason::UrlRule(id) => write!(f, "URL rule '{id}'"),
            RedirectReason::HostName(id) => write!(f, "hostname rule '{id}'"),
        }
    }
}

/// The result of running a request through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// Leave the request alone.
    Passthrough,
    /// Answer with a permanent redirect to `location`.
    Redirect { location: Url, reason: RedirectReason },
}

/// Decides, per request, whether and where to redirect.
///
/// The steps run in order and the first one producing a redirect wins:
/// eligibility filter, rule load, trailing slash removal, URL rules,
/// hostname rules.
#[derive(Clone)]
pub struct RewritePipeline {
    settings: Arc<RewriterSettings>,
    cache: Arc<RuleCache>,
}

impl RewritePipeline {
    pub fn new(settings: RewriterSettings, cache: Arc<RuleCache>) -> Self {
        Self {
            settings: Arc::new(settings),
            cache,
        }
    }

    pub fn settings(&self) -> &RewriterSettings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<RuleCache> {
        &self.cache
    }

    pub async fn process(&self, request: &InboundRequest) -> RewriteOutcome {
        if !self.is_eligible(request) {
            return RewriteOutcome::Passthrough;
        }

        let rules = self.cache.ensure_loaded().await;

        let redirect = self
            .remove_trailing_slash(request)
            .or_else(|| self.rewrite_url(&rules, request))
            .or_else(|| self.rewrite_host(&rules, request));

        match redirect {
            Some((location, reason)) => {
                if self.settings.log_rewrites {
                    info!(reason = %reason, from = %request.url, to = %location, "rewrote request");
                }
                RewriteOutcome::Redirect { location, reason }
            }
            None => RewriteOutcome::Passthrough,
        }
    }

    fn is_eligible(&self, request: &InboundRequest) -> bool {
        let settings = &self.settings;

        let skipped = if !settings.enabled {
            "rewriter disabled"
        } else if !request.is_get() {
            "not a GET request"
        } else if settings.is_core_database(&request.site.database) {
            "core database"
        } else if settings.is_ignored_site(&request.site.name) {
            "ignored site"
        } else if settings.is_ignored_path(&request.raw_path) {
            "ignored path"
        } else {
            return true;
        };

        trace!(url = %request.url, site = %request.site.name, reason = skipped, "request not eligible for rewriting");
        false
    }

    fn remove_trailing_slash(&self, request: &InboundRequest) -> Option<(Url, RedirectReason)> {
        if !self.settings.remove_trailing_slash {
            return None;
        }

        let path = request.url.path();
        if path == "/" || !path.ends_with('/') {
            return None;
        }

        let trimmed = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };

        let mut location = request.url.clone();
        location.set_path(trimmed);
        location.set_query(matcher::query(&request.url));
        location.set_fragment(None);
        Some((location, RedirectReason::TrailingSlash))
    }

    fn rewrite_url(&self, rules: &RuleSet, request: &InboundRequest) -> Option<(Url, RedirectReason)> {
        let matched = match_url(rules, &request.url)?;
        let rule = matched.rule;

        let mut location = match rule.resolve_target(&request.url) {
            Ok(location) => location,
            Err(e) => {
                error!(error = %e, "skipping URL rule with malformed target");
                return None;
            }
        };

        if matched.preserve_query {
            location.set_query(matcher::query(&request.url));
            location.set_fragment(None);
        }

        Some((location, RedirectReason::UrlRule(rule.id().clone())))
    }

    fn rewrite_host(&self, rules: &RuleSet, request: &InboundRequest) -> Option<(Url, RedirectReason)> {
        let host = request.url.host_str()?;
        let rule = match_host(rules, host)?;

        let mut location = request.url.clone();
        if let Err(e) = location.set_host(Some(rule.target_host())) {
            error!(rule_id = %rule.id(), host = rule.target_host(), error = %e, "cannot build redirect to target host");
            return None;
        }
        // The target host is served on the scheme's default port.
        if location.set_port(None).is_err() {
            return None;
        }
        location.set_query(matcher::query(&request.url));
        location.set_fragment(None);

        Some((location, RedirectReason::HostName(rule.id().clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::SiteContext;
    use async_trait::async_trait;
    use rewriter_core::{ConfigurationError, HostNameRule, LoadedRules, RuleStore, UrlRule};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct FixedStore {
        rules: LoadedRules,
        loads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RuleStore for FixedStore {
        async fn load(&self) -> Result<LoadedRules, ConfigurationError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.rules.clone())
        }
    }

    fn id(s: &str) -> ItemId {
        ItemId::new_unchecked(s)
    }

    fn url_rule(rule_id: &str, source: &str, target: &str) -> UrlRule {
        UrlRule::new(id(rule_id), source, target).unwrap()
    }

    fn host_rule(rule_id: &str, source: &str, target: &str) -> HostNameRule {
        HostNameRule::new(id(rule_id), source, target).unwrap()
    }

    fn settings() -> RewriterSettings {
        RewriterSettings::builder()
            .rules_folder_id(id("rules"))
            .remove_trailing_slash(true)
            .enabled(true)
            .log_rewrites(true)
            .build()
    }

    struct Harness {
        pipeline: RewritePipeline,
        loads: Arc<AtomicUsize>,
    }

    fn harness(settings: RewriterSettings, url_rules: Vec<UrlRule>, host_rules: Vec<HostNameRule>) -> Harness {
        let loads = Arc::new(AtomicUsize::new(0));
        let store = FixedStore {
            rules: LoadedRules {
                url_rules,
                host_rules,
            },
            loads: Arc::clone(&loads),
        };
        Harness {
            pipeline: RewritePipeline::new(settings, Arc::new(RuleCache::new(store))),
            loads,
        }
    }

    fn get(url: &str) -> InboundRequest {
        InboundRequest::new("GET", Url::parse(url).unwrap(), SiteContext::default())
    }

    async fn location(pipeline: &RewritePipeline, request: InboundRequest) -> Option<String> {
        match pipeline.process(&request).await {
            RewriteOutcome::Redirect { location, .. } => Some(location.to_string()),
            RewriteOutcome::Passthrough => None,
        }
    }

    #[tokio::test]
    async fn relative_rule_keeps_request_query() {
        let h = harness(settings(), vec![url_rule("u1", "/old.html", "/new.html")], vec![]);

        let outcome = h.pipeline.process(&get("http://x.com/old.html?q=1")).await;

        assert_eq!(
            outcome,
            RewriteOutcome::Redirect {
                location: Url::parse("http://x.com/new.html?q=1").unwrap(),
                reason: RedirectReason::UrlRule(id("u1")),
            }
        );
    }

    #[tokio::test]
    async fn full_url_rule_discards_request_query() {
        let h = harness(
            settings(),
            vec![url_rule("u1", "http://a.com/p?x=1", "http://b.com/q?y=2")],
            vec![],
        );

        assert_eq!(
            location(&h.pipeline, get("http://a.com/p?x=1")).await.as_deref(),
            Some("http://b.com/q?y=2")
        );
    }

    #[tokio::test]
    async fn path_only_match_replaces_target_query() {
        let h = harness(settings(), vec![url_rule("u1", "/p", "/q?y=2")], vec![]);

        assert_eq!(
            location(&h.pipeline, get("http://x.com/p?z=1")).await.as_deref(),
            Some("http://x.com/q?z=1")
        );
        assert_eq!(
            location(&h.pipeline, get("http://x.com/p")).await.as_deref(),
            Some("http://x.com/q?y=2")
        );
    }

    #[tokio::test]
    async fn rule_with_query_matches_other_queries_on_path() {
        let h = harness(settings(), vec![url_rule("u1", "/p?a=1", "/q")], vec![]);

        assert_eq!(
            location(&h.pipeline, get("http://x.com/p?a=1")).await.as_deref(),
            Some("http://x.com/q")
        );
        assert_eq!(
            location(&h.pipeline, get("http://x.com/p?b=2")).await.as_deref(),
            Some("http://x.com/q?b=2")
        );
    }

    #[tokio::test]
    async fn host_rule_keeps_path_and_query() {
        let h = harness(settings(), vec![], vec![host_rule("h1", "www.old.com", "www.new.com")]);

        let outcome = h.pipeline.process(&get("http://www.old.com/path?z=3")).await;

        assert_eq!(
            outcome,
            RewriteOutcome::Redirect {
                location: Url::parse("http://www.new.com/path?z=3").unwrap(),
                reason: RedirectReason::HostName(id("h1")),
            }
        );
    }

    #[tokio::test]
    async fn host_rule_drops_port() {
        let h = harness(settings(), vec![], vec![host_rule("h1", "old.com", "new.com")]);

        assert_eq!(
            location(&h.pipeline, get("https://old.com:8443/a")).await.as_deref(),
            Some("https://new.com/a")
        );
    }

    #[tokio::test]
    async fn trailing_slash_is_removed() {
        let h = harness(settings(), vec![], vec![]);

        assert_eq!(
            location(&h.pipeline, get("http://x.com/foo/?a=1")).await.as_deref(),
            Some("http://x.com/foo?a=1")
        );
        assert_eq!(
            location(&h.pipeline, get("http://x.com:8080/foo//")).await.as_deref(),
            Some("http://x.com:8080/foo")
        );
        assert_eq!(location(&h.pipeline, get("http://x.com/")).await, None);
        assert_eq!(location(&h.pipeline, get("http://x.com/foo")).await, None);
    }

    #[tokio::test]
    async fn trailing_slash_wins_over_rules() {
        let h = harness(
            settings(),
            vec![url_rule("u1", "/foo/", "/bar")],
            vec![host_rule("h1", "x.com", "y.com")],
        );

        let outcome = h.pipeline.process(&get("http://x.com/foo/")).await;
        assert!(matches!(
            outcome,
            RewriteOutcome::Redirect { reason: RedirectReason::TrailingSlash, .. }
        ));
    }

    #[tokio::test]
    async fn trailing_slash_kept_when_disabled() {
        let mut settings = settings();
        settings.remove_trailing_slash = false;
        let h = harness(settings, vec![url_rule("u1", "/foo/", "/bar")], vec![]);

        assert_eq!(
            location(&h.pipeline, get("http://x.com/foo/")).await.as_deref(),
            Some("http://x.com/bar")
        );
    }

    #[tokio::test]
    async fn url_rule_wins_over_host_rule() {
        let h = harness(
            settings(),
            vec![url_rule("u1", "/a", "/b")],
            vec![host_rule("h1", "x.com", "y.com")],
        );

        assert_eq!(
            location(&h.pipeline, get("http://x.com/a")).await.as_deref(),
            Some("http://x.com/b")
        );
        assert_eq!(
            location(&h.pipeline, get("http://x.com/c")).await.as_deref(),
            Some("http://y.com/c")
        );
    }

    #[tokio::test]
    async fn unmatched_request_passes_through() {
        let h = harness(settings(), vec![url_rule("u1", "/a", "/b")], vec![]);

        assert_eq!(
            h.pipeline.process(&get("http://x.com/other")).await,
            RewriteOutcome::Passthrough
        );
        assert_eq!(h.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ineligible_requests_do_not_load_rules() {
        let h = harness(settings(), vec![url_rule("u1", "/a", "/b")], vec![]);
        let url = Url::parse("http://x.com/a").unwrap();

        let requests = [
            InboundRequest::new("POST", url.clone(), SiteContext::default()),
            InboundRequest::new("GET", url.clone(), SiteContext::new("shell", "core")),
            InboundRequest::new("GET", url.clone(), SiteContext::new("Login", "web")),
            InboundRequest::new("GET", url.clone(), SiteContext::new("website", "CORE")),
            InboundRequest::new("GET", url.clone(), SiteContext::default())
                .with_raw_path("/~/Media/a"),
            InboundRequest::new("GET", url, SiteContext::default()).with_raw_path("/mvc/a"),
        ];

        for request in requests {
            assert_eq!(h.pipeline.process(&request).await, RewriteOutcome::Passthrough);
        }
        assert_eq!(h.loads.load(Ordering::SeqCst), 0);
        assert!(!h.pipeline.cache().is_loaded());
    }

    #[tokio::test]
    async fn disabled_rewriter_passes_everything_through() {
        let mut settings = settings();
        settings.enabled = false;
        let h = harness(settings, vec![url_rule("u1", "/a", "/b")], vec![]);

        assert_eq!(
            h.pipeline.process(&get("http://x.com/a")).await,
            RewriteOutcome::Passthrough
        );
        assert_eq!(h.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cleared_cache_reloads_on_next_request() {
        let h = harness(settings(), vec![url_rule("u1", "/a", "/b")], vec![]);

        assert!(location(&h.pipeline, get("http://x.com/a")).await.is_some());
        h.pipeline.cache().clear().await;
        assert!(location(&h.pipeline, get("http://x.com/a")).await.is_some());

        assert_eq!(h.loads.load(Ordering::SeqCst), 2);
    }
}

use rewriter_cache::CacheInvalidator;
use rewriter_engine::{RewritePipeline, SiteResolver};
use std::sync::Arc;

pub const DEFAULT_SCHEME: &str = "http";

#[derive(Clone)]
pub struct AppState {
    pub(crate) pipeline: RewritePipeline,
    pub(crate) invalidator: CacheInvalidator,
    pub(crate) sites: Arc<dyn SiteResolver>,
    /// Scheme assumed when neither the request URI nor `X-Forwarded-Proto`
    /// names one.
    pub(crate) default_scheme: String,
    /// Bearer token required by the administrative routes; `None` disables them.
    pub(crate) admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        pipeline: RewritePipeline,
        invalidator: CacheInvalidator,
        sites: Arc<dyn SiteResolver>,
    ) -> Self {
        Self {
            pipeline,
            invalidator,
            sites,
            default_scheme: DEFAULT_SCHEME.to_string(),
            admin_token: None,
        }
    }

    pub fn with_default_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.default_scheme = scheme.into();
        self
    }

    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(Arc::from(token.into()));
        self
    }

    pub fn pipeline(&self) -> &RewritePipeline {
        &self.pipeline
    }
}

use rewriter_core::ConfigurationError;
use std::str::FromStr;
use url::Url;

pub const DEFAULT_SITE_NAME: &str = "website";
pub const DEFAULT_SITE_DATABASE: &str = "web";

/// The site a request was resolved to and the content database serving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteContext {
    pub name: String,
    pub database: String,
}

impl SiteContext {
    pub fn new(name: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database: database.into(),
        }
    }
}

impl Default for SiteContext {
    fn default() -> Self {
        Self::new(DEFAULT_SITE_NAME, DEFAULT_SITE_DATABASE)
    }
}

/// A request as seen by the rewrite pipeline.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: String,
    /// Absolute URL of the request, including scheme, host and query.
    pub url: Url,
    /// Path as received, before any normalization.
    pub raw_path: String,
    pub site: SiteContext,
}

impl InboundRequest {
    /// Creates a request whose raw path is taken from `url`.
    pub fn new(method: impl Into<String>, url: Url, site: SiteContext) -> Self {
        let raw_path = url.path().to_string();
        Self {
            method: method.into(),
            url,
            raw_path,
            site,
        }
    }

    pub fn with_raw_path(mut self, raw_path: impl Into<String>) -> Self {
        self.raw_path = raw_path.into();
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}

/// Maps the host a request was sent to onto a site.
pub trait SiteResolver: Send + Sync + 'static {
    fn resolve(&self, host: &str) -> SiteContext;
}

/// One `name=host@database` entry of a [`SiteMap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteBinding {
    pub host: String,
    pub site: SiteContext,
}

impl FromStr for SiteBinding {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigurationError::InvalidSetting {
            name: "Site",
            value: value.to_string(),
            expected: "name=host@database",
        };

        let (name, rest) = value.split_once('=').ok_or_else(invalid)?;
        let (host, database) = rest.split_once('@').ok_or_else(invalid)?;

        let (name, host, database) = (name.trim(), host.trim(), database.trim());
        if name.is_empty() || host.is_empty() || database.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            host: host.to_ascii_lowercase(),
            site: SiteContext::new(name.to_ascii_lowercase(), database),
        })
    }
}

/// Resolves sites from a fixed list of host bindings, falling back to a
/// default site for unknown hosts.
#[derive(Debug, Clone, Default)]
pub struct SiteMap {
    bindings: Vec<SiteBinding>,
    fallback: SiteContext,
}

impl SiteMap {
    pub fn new(bindings: Vec<SiteBinding>, fallback: SiteContext) -> Self {
        Self { bindings, fallback }
    }

    /// Parses `name=host@database` entries, using the default site as the
    /// fallback.
    pub fn parse<'a>(entries: impl IntoIterator<Item = &'a str>) -> Result<Self, ConfigurationError> {
        let bindings = entries
            .into_iter()
            .map(SiteBinding::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(bindings, SiteContext::default()))
    }
}

impl SiteResolver for SiteMap {
    fn resolve(&self, host: &str) -> SiteContext {
        self.bindings
            .iter()
            .find(|binding| binding.host.eq_ignore_ascii_case(host))
            .map_or_else(|| self.fallback.clone(), |binding| binding.site.clone())
    }
}

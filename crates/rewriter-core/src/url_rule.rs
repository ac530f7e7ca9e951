use crate::error::{InvalidReason, MalformedUrlError, RuleField, ValidationError};
use crate::item::ItemId;
use crate::record::{fields, RuleRecord};
use url::{ParseError, Url};

const PLACEHOLDER_ORIGIN: &str = "http://localhost";

/// A rule URL as written by an editor: either absolute, or relative to the
/// scheme and host of the request being rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RuleUrl {
    Absolute(Url),
    /// Root-relative path with optional query, always starting with `/`.
    Relative(String),
}

impl RuleUrl {
    fn parse(raw: &str) -> Result<Self, String> {
        match Url::parse(raw) {
            Ok(url) if is_web_url(&url) => Ok(RuleUrl::Absolute(url)),
            Ok(url) => Err(format!("unsupported scheme '{}'", url.scheme())),
            Err(ParseError::RelativeUrlWithoutBase) => {
                let relative = format!("/{}", raw.trim_start_matches('/'));
                // The origin is substituted per request; any http origin must accept the path.
                Url::parse(&format!("{PLACEHOLDER_ORIGIN}{relative}")).map_err(|e| e.to_string())?;
                Ok(RuleUrl::Relative(relative))
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// Path and query are normalized the same way for every http(s) origin,
    /// so relative URLs are keyed through a placeholder origin.
    fn lookup_key(&self) -> Result<LookupKey, ParseError> {
        match self {
            RuleUrl::Absolute(url) => Ok(LookupKey::of(url)),
            RuleUrl::Relative(path) => Ok(LookupKey::with_origin(
                None,
                &Url::parse(&format!("{PLACEHOLDER_ORIGIN}{path}"))?,
            )),
        }
    }

    fn resolve(&self, request: &Url) -> Result<Url, ParseError> {
        match self {
            RuleUrl::Absolute(url) => Ok(url.clone()),
            RuleUrl::Relative(path) => {
                Url::parse(&format!("{}{}", request.origin().ascii_serialization(), path))
            }
        }
    }
}

fn is_web_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.has_host()
}

/// Scheme, host and effective port of an absolute URL, lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OriginKey {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
}

impl OriginKey {
    /// Returns `None` for URLs without a host.
    pub fn of(url: &Url) -> Option<Self> {
        Some(Self {
            scheme: url.scheme().to_ascii_lowercase(),
            host: url.host_str()?.to_ascii_lowercase(),
            port: url.port_or_known_default(),
        })
    }
}

/// Normalized location of a URL, compared ignoring ASCII case.
///
/// Rule sources with `origin: None` are relative and apply on every origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupKey {
    pub origin: Option<OriginKey>,
    pub path: String,
    /// `None` when the URL has no query or an empty one.
    pub query: Option<String>,
}

impl LookupKey {
    pub fn of(url: &Url) -> Self {
        Self::with_origin(OriginKey::of(url), url)
    }

    fn with_origin(origin: Option<OriginKey>, url: &Url) -> Self {
        Self {
            origin,
            path: url.path().to_ascii_lowercase(),
            query: url
                .query()
                .filter(|query| !query.is_empty())
                .map(str::to_ascii_lowercase),
        }
    }
}

/// Rewrites one URL to another.
///
/// Source and target are either absolute (`http://a.com/p?x=1`) or
/// root-relative (`/old.html`). Relative URLs are resolved against the
/// scheme, host and port of the request being rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRule {
    id: ItemId,
    source_url: String,
    target_url: String,
    target: RuleUrl,
    lookup_key: LookupKey,
}

impl UrlRule {
    /// Creates a validated URL rule.
    pub fn new(
        id: ItemId,
        source_url: impl Into<String>,
        target_url: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let source_url = source_url.into();
        let target_url = target_url.into();

        let source = parse_field(&id, RuleField::SourceUrl, &source_url)?;
        let target = parse_field(&id, RuleField::TargetUrl, &target_url)?;
        let lookup_key = source.lookup_key().map_err(|e| {
            ValidationError::new(&id, RuleField::SourceUrl, InvalidReason::InvalidUrl(e.to_string()))
        })?;

        Ok(Self {
            id,
            source_url,
            target_url,
            target,
            lookup_key,
        })
    }

    /// Builds a rule from a `UrlRewriteRule` record.
    pub fn from_record(record: &RuleRecord) -> Result<Self, ValidationError> {
        Self::new(
            record.id.clone(),
            record.field(fields::SOURCE_URL),
            record.field(fields::TARGET_URL),
        )
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    /// The source URL exactly as configured.
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// The target URL exactly as configured.
    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    /// Key used to deduplicate rules: the lower-cased configured source URL.
    pub fn source_key(&self) -> String {
        self.source_url.to_lowercase()
    }

    /// Normalized source location used to look the rule up.
    pub fn lookup_key(&self) -> &LookupKey {
        &self.lookup_key
    }

    /// Resolves the target URL to an absolute URL for `request`.
    pub fn resolve_target(&self, request: &Url) -> Result<Url, MalformedUrlError> {
        self.target.resolve(request).map_err(|e| MalformedUrlError {
            rule_id: self.id.clone(),
            url: self.target_url.clone(),
            reason: e.to_string(),
        })
    }
}

fn parse_field(id: &ItemId, field: RuleField, value: &str) -> Result<RuleUrl, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(id, field, InvalidReason::Empty));
    }

    RuleUrl::parse(value)
        .map_err(|reason| ValidationError::new(id, field, InvalidReason::InvalidUrl(reason)))
}

use rewriter_cache::CacheStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct ClearCacheRequest {
    /// Must be `true` for the cache to be cleared.
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub event_id: String,
}

#[derive(Debug, Serialize)]
pub struct CacheStatusResponse {
    pub loaded: bool,
    pub generation: u64,
    pub url_rules: usize,
    pub host_rules: usize,
}

impl From<CacheStatus> for CacheStatusResponse {
    fn from(status: CacheStatus) -> Self {
        Self {
            loaded: status.loaded,
            generation: status.generation,
            url_rules: status.url_rules,
            host_rules: status.host_rules,
        }
    }
}

use crate::rule_set::RuleSet;
use parking_lot::RwLock;
use rewriter_core::RuleStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, trace};

/// A point-in-time view of the cache, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatus {
    pub loaded: bool,
    /// Number of successful loads since startup.
    pub generation: u64,
    pub url_rules: usize,
    pub host_rules: usize,
}

#[derive(Debug)]
struct State {
    rules: Arc<RuleSet>,
    loaded: bool,
    generation: u64,
}

/// Process-local cache of the current rule generation.
///
/// Lookups take a shared lock just long enough to clone the current
/// [`Arc<RuleSet>`]; a generation is built completely before it is
/// published, so readers see either the previous or the new one. Loading
/// and clearing are serialized by a separate async mutex, so at most one
/// load runs at a time and concurrent callers of [`RuleCache::ensure_loaded`]
/// wait for it instead of loading again.
pub struct RuleCache {
    store: Box<dyn RuleStore>,
    state: RwLock<State>,
    reload: Mutex<()>,
}

impl RuleCache {
    /// Creates an unloaded cache backed by `store`.
    pub fn new(store: impl RuleStore) -> Self {
        Self {
            store: Box::new(store),
            state: RwLock::new(State {
                rules: Arc::new(RuleSet::empty()),
                loaded: false,
                generation: 0,
            }),
            reload: Mutex::new(()),
        }
    }

    /// Returns the current rules without triggering a load.
    pub fn snapshot(&self) -> Arc<RuleSet> {
        Arc::clone(&self.state.read().rules)
    }

    pub fn is_loaded(&self) -> bool {
        self.state.read().loaded
    }

    pub fn status(&self) -> CacheStatus {
        let state = self.state.read();
        CacheStatus {
            loaded: state.loaded,
            generation: state.generation,
            url_rules: state.rules.url_rules().len(),
            host_rules: state.rules.host_rules().len(),
        }
    }

    /// Returns the loaded rules, loading them first if needed.
    ///
    /// A failed load is logged and leaves the cache unloaded with an empty
    /// rule set; the next call tries again.
    pub async fn ensure_loaded(&self) -> Arc<RuleSet> {
        if let Some(rules) = self.loaded_rules() {
            return rules;
        }

        let _guard = self.reload.lock().await;

        // Another caller may have finished loading while we waited.
        if let Some(rules) = self.loaded_rules() {
            trace!("rules loaded by a concurrent caller");
            return rules;
        }

        match self.store.load().await {
            Ok(loaded) => {
                let rules = Arc::new(RuleSet::from(loaded));

                let mut state = self.state.write();
                state.generation += 1;
                state.rules = Arc::clone(&rules);
                state.loaded = true;

                info!(
                    generation = state.generation,
                    url_rules = rules.url_rules().len(),
                    host_rules = rules.host_rules().len(),
                    "loaded rewrite rules"
                );
                rules
            }
            Err(e) => {
                error!(error = %e, "failed to load rewrite rules, requests pass through until the next attempt");
                self.snapshot()
            }
        }
    }

    /// Discards the current rules; the next [`RuleCache::ensure_loaded`]
    /// loads them again.
    pub async fn clear(&self) {
        let _guard = self.reload.lock().await;

        let mut state = self.state.write();
        state.rules = Arc::new(RuleSet::empty());
        state.loaded = false;

        info!(generation = state.generation, "cleared rewrite rule cache");
    }

    fn loaded_rules(&self) -> Option<Arc<RuleSet>> {
        let state = self.state.read();
        state.loaded.then(|| Arc::clone(&state.rules))
    }
}

impl std::fmt::Debug for RuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleCache")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use rewriter_core::{
        ConfigurationError, HostNameRule, ItemId, LoadedRules, StorageError, UrlRule,
    };
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// A store that counts loads and can be switched to fail.
    #[derive(Clone, Default)]
    pub(crate) struct CountingStore {
        pub loads: Arc<AtomicUsize>,
        pub failing: Arc<AtomicBool>,
        pub delay: Duration,
    }

    pub(crate) fn rules() -> LoadedRules {
        LoadedRules {
            url_rules: vec![
                UrlRule::new(ItemId::new_unchecked("u1"), "/old", "/new").unwrap(),
                UrlRule::new(ItemId::new_unchecked("u2"), "/a", "/b").unwrap(),
            ],
            host_rules: vec![HostNameRule::new(
                ItemId::new_unchecked("h1"),
                "old.com",
                "new.com",
            )
            .unwrap()],
        }
    }

    #[async_trait]
    impl RuleStore for CountingStore {
        async fn load(&self) -> Result<LoadedRules, ConfigurationError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("connection refused".into()).into());
            }
            Ok(rules())
        }
    }

    #[tokio::test]
    async fn starts_unloaded_and_empty() {
        let cache = RuleCache::new(CountingStore::default());
        assert!(!cache.is_loaded());
        assert!(cache.snapshot().is_empty());
        assert_eq!(cache.status().generation, 0);
    }

    #[tokio::test]
    async fn loads_once() {
        let store = CountingStore::default();
        let cache = RuleCache::new(store.clone());

        let first = cache.ensure_loaded().await;
        let second = cache.ensure_loaded().await;

        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            cache.status(),
            CacheStatus {
                loaded: true,
                generation: 1,
                url_rules: 2,
                host_rules: 1,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_load() {
        let store = CountingStore {
            delay: Duration::from_millis(50),
            ..Default::default()
        };
        let cache = Arc::new(RuleCache::new(store.clone()));

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.ensure_loaded().await })
            })
            .collect();

        for task in tasks {
            let rules = task.await.unwrap();
            assert_eq!(rules.url_rules().len(), 2);
            assert_eq!(rules.host_rules().len(), 1);
        }
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clear_then_reload_matches_fresh_load() {
        let store = CountingStore::default();
        let cache = RuleCache::new(store.clone());
        let fresh = cache.ensure_loaded().await;

        cache.clear().await;
        cache.clear().await;
        assert!(!cache.is_loaded());
        assert!(cache.snapshot().is_empty());

        let reloaded = cache.ensure_loaded().await;
        assert_eq!(*reloaded, *fresh);
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
        assert_eq!(cache.status().generation, 2);
    }

    #[tokio::test]
    async fn clearing_an_empty_cache_is_harmless() {
        let cache = RuleCache::new(CountingStore::default());
        cache.clear().await;
        assert!(!cache.is_loaded());
        assert_eq!(cache.ensure_loaded().await.url_rules().len(), 2);
    }

    #[tokio::test]
    async fn failed_load_stays_unloaded_and_is_retried() {
        let store = CountingStore::default();
        store.failing.store(true, Ordering::SeqCst);
        let cache = RuleCache::new(store.clone());

        assert!(cache.ensure_loaded().await.is_empty());
        assert!(!cache.is_loaded());

        store.failing.store(false, Ordering::SeqCst);
        assert_eq!(cache.ensure_loaded().await.url_rules().len(), 2);
        assert!(cache.is_loaded());
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
        assert_eq!(cache.status().generation, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_see_partial_generation_during_clear() {
        let store = CountingStore {
            delay: Duration::from_millis(1),
            ..Default::default()
        };
        let cache = Arc::new(RuleCache::new(store));
        cache.ensure_loaded().await;

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    for _ in 0..200 {
                        let rules = cache.ensure_loaded().await;
                        let sizes = (rules.url_rules().len(), rules.host_rules().len());
                        assert!(sizes == (2, 1) || sizes == (0, 0), "partial set {sizes:?}");
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        for _ in 0..20 {
            cache.clear().await;
            tokio::task::yield_now().await;
        }

        for reader in readers {
            reader.await.unwrap();
        }
    }
}

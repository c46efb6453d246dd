//! Process-wide read-through cache in front of a [`MetadataSource`].
//!
//! Version listings and component metadata are memoized per module and per
//! module version. Errors other than timeouts and staleness are cached as
//! well, so a missing module is only asked for once. A `Stale` answer drops
//! every cached entry of that module and retries once.
//!
//! Transient failures never enter the cache. [`MetadataCache::prefetch`]
//! hands them back to the caller, which decides how long to remember them.

use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use trellis_core::component::ComponentMetadata;
use trellis_core::dependency::ModuleId;

use crate::source::{MetadataSource, SourceError};

type Listing = Result<Arc<Vec<String>>, SourceError>;
type Metadata = Result<Arc<ComponentMetadata>, SourceError>;

/// Counters for cache effectiveness.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub invalidations: AtomicU64,
}

/// What a prefetch should load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Prefetch {
    Versions(ModuleId),
    Metadata(ModuleId, String),
}

impl std::fmt::Display for Prefetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Prefetch::Versions(module) => write!(f, "{module}"),
            Prefetch::Metadata(module, version) => write!(f, "{module}:{version}"),
        }
    }
}

pub struct MetadataCache {
    source: Arc<dyn MetadataSource>,
    versions: DashMap<ModuleId, Listing>,
    metadata: DashMap<(ModuleId, String), Metadata>,
    fetch_timeout: Duration,
    stats: CacheStats,
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("versions", &self.versions.len())
            .field("metadata", &self.metadata.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl MetadataCache {
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self {
            source,
            versions: DashMap::new(),
            metadata: DashMap::new(),
            fetch_timeout: Duration::from_secs(30),
            stats: CacheStats::default(),
        }
    }

    /// Prefetches slower than this report [`SourceError::Timeout`].
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn is_cached(&self, request: &Prefetch) -> bool {
        match request {
            Prefetch::Versions(module) => self.versions.contains_key(module),
            Prefetch::Metadata(module, version) => {
                self.metadata.contains_key(&(module.clone(), version.clone()))
            }
        }
    }

    /// Published versions of `module`.
    pub fn versions(&self, module: &ModuleId) -> Listing {
        if let Some(hit) = self.versions.get(module) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return hit.value().clone();
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let result = self
            .with_stale_retry(module, || self.source.list_versions(module))
            .map(Arc::new);
        self.remember_versions(module, &result);
        result
    }

    /// Metadata of one component version.
    pub fn metadata(&self, module: &ModuleId, version: &str) -> Metadata {
        let key = (module.clone(), version.to_string());
        if let Some(hit) = self.metadata.get(&key) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return hit.value().clone();
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let result = self
            .with_stale_retry(module, || self.source.fetch_metadata(module, version))
            .map(Arc::new);
        if !result.as_ref().is_err_and(SourceError::is_transient) {
            self.metadata.insert(key, result.clone());
        }
        result
    }

    /// The cached listing of `module`, without asking the source.
    pub fn cached_versions(&self, module: &ModuleId) -> Option<Listing> {
        let hit = self.versions.get(module)?.value().clone();
        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        Some(hit)
    }

    /// Cached metadata of one component version, without asking the source.
    pub fn cached_metadata(&self, module: &ModuleId, version: &str) -> Option<Metadata> {
        let hit = self
            .metadata
            .get(&(module.clone(), version.to_string()))?
            .value()
            .clone();
        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        Some(hit)
    }

    fn remember_versions(&self, module: &ModuleId, result: &Listing) {
        if !result.as_ref().is_err_and(SourceError::is_transient) {
            self.versions.insert(module.clone(), result.clone());
        }
    }

    fn with_stale_retry<T>(
        &self,
        module: &ModuleId,
        fetch: impl Fn() -> Result<T, SourceError>,
    ) -> Result<T, SourceError> {
        match fetch() {
            Err(SourceError::Stale(what)) => {
                tracing::warn!("Stale metadata for {what}; invalidating {module} and retrying");
                self.invalidate(module);
                fetch()
            }
            other => other,
        }
    }

    /// Drop every cached entry of `module`.
    pub fn invalidate(&self, module: &ModuleId) {
        self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
        self.versions.remove(module);
        self.metadata.retain(|(m, _), _| m != module);
    }

    /// Load everything in `requests` that is not cached yet, at most
    /// `max_concurrent` at a time, and wait for all of it. Results land in
    /// the cache. Requests that timed out or failed transiently are
    /// returned with their error instead.
    pub async fn prefetch(
        self: Arc<Self>,
        requests: Vec<Prefetch>,
        max_concurrent: usize,
    ) -> HashMap<Prefetch, SourceError> {
        let pending: HashSet<Prefetch> = requests
            .into_iter()
            .filter(|r| !self.is_cached(r))
            .collect();
        let mut transient = HashMap::new();
        if pending.is_empty() {
            return transient;
        }
        tracing::debug!("Prefetching {} metadata entries", pending.len());

        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut join_set = JoinSet::new();
        for request in pending {
            let cache = Arc::clone(&self);
            let sem = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = sem.acquire().await;
                let timeout = cache.fetch_timeout;
                let worker = Arc::clone(&cache);
                let task_request = request.clone();
                // The blocking fetch keeps running after a timeout and still
                // fills the cache for later resolutions.
                let fetch = tokio::task::spawn_blocking(move || match &task_request {
                    Prefetch::Versions(module) => worker.versions(module).err(),
                    Prefetch::Metadata(module, version) => worker.metadata(module, version).err(),
                });
                let error = match tokio::time::timeout(timeout, fetch).await {
                    Ok(Ok(error)) => error.filter(SourceError::is_transient),
                    Ok(Err(e)) => Some(SourceError::Other(format!("fetch of {request} failed: {e}"))),
                    Err(_) => {
                        tracing::warn!("Fetching {request} timed out after {timeout:?}");
                        Some(SourceError::Timeout(request.to_string()))
                    }
                };
                error.map(|e| (request, e))
            });
        }
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Some((request, error))) => {
                    transient.insert(request, error);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Metadata prefetch task failed: {e}"),
            }
        }
        transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Reports `Stale` on the first listing call, then succeeds.
    #[derive(Default)]
    struct FlakySource {
        calls: AtomicUsize,
        stale_once: Mutex<bool>,
    }

    impl MetadataSource for FlakySource {
        fn list_versions(&self, module: &ModuleId) -> Result<Vec<String>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut stale = self.stale_once.lock().unwrap();
            if !*stale {
                *stale = true;
                return Err(SourceError::Stale(module.to_string()));
            }
            Ok(vec!["1.0".to_string()])
        }

        fn fetch_metadata(
            &self,
            module: &ModuleId,
            version: &str,
        ) -> Result<ComponentMetadata, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ComponentMetadata::new(module.clone(), version))
        }
    }

    #[test]
    fn stale_listing_is_retried_once() {
        let source = Arc::new(FlakySource::default());
        let cache = MetadataCache::new(source.clone());
        let module = ModuleId::new("org.example", "lib");

        assert_eq!(*cache.versions(&module).unwrap(), vec!["1.0"]);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().invalidations.load(Ordering::Relaxed), 1);

        cache.versions(&module).unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn invalidate_drops_module_entries_only() {
        let source = Arc::new(FlakySource::default());
        let cache = MetadataCache::new(source.clone());
        let a = ModuleId::new("org.example", "a");
        let b = ModuleId::new("org.example", "b");
        cache.metadata(&a, "1.0").unwrap();
        cache.metadata(&b, "1.0").unwrap();

        cache.invalidate(&a);
        assert!(!cache.is_cached(&Prefetch::Metadata(a, "1.0".into())));
        assert!(cache.is_cached(&Prefetch::Metadata(b, "1.0".into())));
    }

    #[tokio::test]
    async fn prefetch_fills_the_cache() {
        let source = Arc::new(FlakySource::default());
        let cache = Arc::new(MetadataCache::new(source.clone()));
        let requests: Vec<Prefetch> = (0..5)
            .map(|i| Prefetch::Metadata(ModuleId::new("org.example", format!("m{i}")), "1.0".into()))
            .collect();

        Arc::clone(&cache).prefetch(requests.clone(), 2).await;
        assert!(requests.iter().all(|r| cache.is_cached(r)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
    }

    /// Takes `delay` to answer any metadata request.
    struct SlowSource {
        delay: Duration,
    }

    impl MetadataSource for SlowSource {
        fn list_versions(&self, _module: &ModuleId) -> Result<Vec<String>, SourceError> {
            Ok(vec!["1.0".to_string()])
        }

        fn fetch_metadata(
            &self,
            module: &ModuleId,
            version: &str,
        ) -> Result<ComponentMetadata, SourceError> {
            std::thread::sleep(self.delay);
            Ok(ComponentMetadata::new(module.clone(), version))
        }
    }

    #[tokio::test]
    async fn timed_out_prefetch_is_reported_not_cached() {
        let source = Arc::new(SlowSource {
            delay: Duration::from_millis(300),
        });
        let cache = Arc::new(
            MetadataCache::new(source).with_fetch_timeout(Duration::from_millis(20)),
        );
        let request = Prefetch::Metadata(ModuleId::new("org.example", "slow"), "1.0".into());

        let transient = Arc::clone(&cache).prefetch(vec![request.clone()], 1).await;
        assert!(matches!(transient.get(&request), Some(SourceError::Timeout(s)) if s == "org.example:slow:1.0"));
        assert!(!cache.is_cached(&request));
        assert!(cache
            .cached_metadata(&ModuleId::new("org.example", "slow"), "1.0")
            .is_none());
    }

    #[tokio::test]
    async fn prefetch_reports_nothing_when_everything_loads() {
        let source = Arc::new(FlakySource::default());
        let cache = Arc::new(MetadataCache::new(source));
        let module = ModuleId::new("org.example", "lib");

        let transient = Arc::clone(&cache)
            .prefetch(vec![Prefetch::Versions(module.clone())], 1)
            .await;
        assert!(transient.is_empty());
        assert_eq!(*cache.cached_versions(&module).unwrap().unwrap(), vec!["1.0"]);
    }
}

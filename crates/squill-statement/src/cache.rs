//! Join-graph caching.
//!
//! Resolving a join specification touches the registry, compiles ON
//! predicates, and builds a decomposition schema; statements against the
//! same compound source repeat identically, so resolved graphs are cached
//! process-wide keyed by structural identity. The registry's generation
//! counter is part of the key: a schema reload bumps it and stale entries
//! simply stop matching, with no blocking sweep. Entries are immutable once
//! inserted, so readers share a lock-free-of-writers fast path.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock, RwLock};
use std::time::Instant;

use squill_core::{Registry, Relation, Result};

use crate::join::{self, JoinSource, JoinSpec};

/// Compute a hash key for caching from any hashable value.
pub fn cache_key(value: &impl Hash) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug)]
struct CacheEntry {
    source: Arc<JoinSource>,
    inserted: Instant,
}

/// A bounded cache of resolved join graphs.
///
/// When the cache exceeds `max_size`, the oldest entry is evicted.
#[derive(Debug)]
pub struct JoinCache {
    inner: RwLock<HashMap<u64, CacheEntry>>,
    max_size: usize,
}

static GLOBAL: LazyLock<JoinCache> = LazyLock::new(|| JoinCache::new(1024));

impl JoinCache {
    /// Create a cache holding at most `max_size` graphs.
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::with_capacity(max_size.min(256))),
            max_size,
        }
    }

    /// The process-wide cache used by [`crate::source::Source::join`].
    pub fn global() -> &'static JoinCache {
        &GLOBAL
    }

    /// Fetch the resolved graph for (origin, spec), resolving and caching
    /// on miss.
    ///
    /// # Errors
    ///
    /// Any join-resolution error; failures are not cached.
    pub fn resolve(
        &self,
        registry: &Registry,
        origin: Arc<Relation>,
        spec: &JoinSpec,
    ) -> Result<Arc<JoinSource>> {
        let key = cache_key(&(
            registry.instance(),
            registry.generation(),
            origin.schema.as_str(),
            origin.name.as_str(),
            spec,
        ));

        if let Some(entry) = self.inner.read().expect("join cache lock poisoned").get(&key) {
            return Ok(entry.source.clone());
        }

        let resolved = Arc::new(join::resolve_join(registry, origin, spec)?);

        let mut cache = self.inner.write().expect("join cache lock poisoned");
        if !cache.contains_key(&key) && cache.len() >= self.max_size {
            if let Some((&oldest, _)) = cache.iter().min_by_key(|(_, entry)| entry.inserted) {
                cache.remove(&oldest);
            }
        }

        tracing::debug!(key, "join graph resolved and cached");
        cache.insert(
            key,
            CacheEntry {
                source: resolved.clone(),
                inserted: Instant::now(),
            },
        );

        Ok(resolved)
    }

    /// Number of cached graphs.
    pub fn len(&self) -> usize {
        self.inner.read().expect("join cache lock poisoned").len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached graph.
    pub fn clear(&self) {
        self.inner.write().expect("join cache lock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use squill_core::Relation;

    fn registry() -> Registry {
        let registry = Registry::new("public");
        registry.add(Relation::new("public", "alpha", &["id", "val"]).with_pk(&["id"]));
        registry.add(
            Relation::new("public", "beta", &["id", "alpha_id", "val"]).with_pk(&["id"]),
        );
        registry
    }

    fn spec(on: &str) -> JoinSpec {
        JoinSpec::from_json(&json!({"beta": {"on": {"alpha_id": on}}})).unwrap()
    }

    #[test]
    fn test_structural_identity_hits() {
        let registry = registry();
        let cache = JoinCache::new(10);
        let origin = registry.resolve("alpha").unwrap();

        let a = cache.resolve(&registry, origin.clone(), &spec("id")).unwrap();
        let b = cache.resolve(&registry, origin.clone(), &spec("id")).unwrap();
        let c = cache.resolve(&registry, origin, &spec("val")).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_reload_invalidates_by_generation() {
        let registry = registry();
        let cache = JoinCache::new(10);
        let origin = registry.resolve("alpha").unwrap();

        let before = cache.resolve(&registry, origin, &spec("id")).unwrap();

        registry.reload(vec![
            Relation::new("public", "alpha", &["id", "val"]).with_pk(&["id"]),
            Relation::new("public", "beta", &["id", "alpha_id", "val"]).with_pk(&["id"]),
        ]);

        let origin = registry.resolve("alpha").unwrap();
        let after = cache.resolve(&registry, origin, &spec("id")).unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_eviction() {
        let registry = registry();
        let cache = JoinCache::new(1);
        let origin = registry.resolve("alpha").unwrap();

        cache.resolve(&registry, origin.clone(), &spec("id")).unwrap();
        cache.resolve(&registry, origin, &spec("val")).unwrap();

        assert_eq!(cache.len(), 1);
    }
}

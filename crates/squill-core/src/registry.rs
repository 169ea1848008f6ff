//! The relation registry.
//!
//! The registry is the compiler's window onto the database schema: a map of
//! schema-qualified names to immutable relation descriptors, plus the
//! connection's current schema for bare-name resolution. It carries a
//! generation counter that a schema reload bumps atomically; caches keyed by
//! generation are thereby invalidated without a sweep.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::relation::Relation;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(0);

/// An immutable snapshot registry of relation descriptors.
#[derive(Debug)]
pub struct Registry {
    instance: u64,
    current_schema: String,
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    relations: HashMap<String, Arc<Relation>>,
    generation: u64,
}

impl Registry {
    /// Create an empty registry resolving bare names against
    /// `current_schema`.
    pub fn new(current_schema: impl Into<String>) -> Self {
        Self {
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            current_schema: current_schema.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// The schema bare relation names resolve against.
    pub fn current_schema(&self) -> &str {
        &self.current_schema
    }

    /// A process-unique identity for this registry, distinguishing cache
    /// entries of unrelated registries.
    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// Register a relation under its qualified name.
    pub fn add(&self, relation: Relation) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner
            .relations
            .insert(relation.qualified_name(), Arc::new(relation));
    }

    /// Resolve `name` — bare or `schema.name` — to a relation.
    pub fn resolve(&self, name: &str) -> Option<Arc<Relation>> {
        let inner = self.inner.read().expect("registry lock poisoned");

        if name.contains('.') {
            inner.relations.get(name).cloned()
        } else {
            inner
                .relations
                .get(&format!("{}.{name}", self.current_schema))
                .cloned()
        }
    }

    /// The current snapshot generation.
    pub fn generation(&self) -> u64 {
        self.inner.read().expect("registry lock poisoned").generation
    }

    /// Atomically replace the registry contents and bump the generation.
    ///
    /// Callers holding resolved join graphs keyed by the previous generation
    /// will miss the cache on their next lookup and re-resolve against the
    /// new snapshot.
    pub fn reload(&self, relations: Vec<Relation>) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.relations = relations
            .into_iter()
            .map(|r| (r.qualified_name(), Arc::new(r)))
            .collect();
        inner.generation += 1;

        tracing::debug!(
            generation = inner.generation,
            relations = inner.relations.len(),
            "registry reloaded"
        );
    }

    /// Number of registered relations.
    pub fn len(&self) -> usize {
        self.inner.read().expect("registry lock poisoned").relations.len()
    }

    /// Whether the registry holds no relations.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

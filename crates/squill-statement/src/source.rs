//! Query sources.
//!
//! A statement targets either a single relation or a resolved join graph.
//! `Source` is the uniform view the identifier parser and condition compiler
//! work against: it answers "what relation does this alias mean" and "what
//! does an unqualified field reference default to".

use std::sync::Arc;

use squill_core::{Error, Registry, Relation, Result};

use crate::cache::JoinCache;
use crate::join::{JoinSource, JoinSpec};

/// The target of a statement: one relation, or a join graph.
#[derive(Debug, Clone)]
pub enum Source {
    /// A single table or view.
    Table(TableSource),
    /// A resolved, aliased join graph.
    Join(Arc<JoinSource>),
}

/// A single-relation source.
#[derive(Debug, Clone)]
pub struct TableSource {
    /// The target relation.
    pub relation: Arc<Relation>,
    /// The connection's current schema, for name delimiting.
    pub current_schema: String,
}

impl Source {
    /// Look up `name` in the registry and wrap it as a single-table source.
    ///
    /// # Errors
    ///
    /// `UnknownRelation` if the registry has no such relation.
    pub fn table(registry: &Registry, name: &str) -> Result<Self> {
        let relation = registry
            .resolve(name)
            .ok_or_else(|| Error::UnknownRelation(name.to_string()))?;

        Ok(Source::Table(TableSource {
            relation,
            current_schema: registry.current_schema().to_string(),
        }))
    }

    /// Resolve a join specification against the registry, through the
    /// process-wide join-graph cache.
    ///
    /// # Errors
    ///
    /// `UnknownRelation` for a missing origin; any join-resolution error
    /// (`DuplicateJoinAlias`, `UnknownJoinTarget`, `NoImplicitJoinKey`,
    /// `AmbiguousJoinKey`, `MissingExplicitPrimaryKey`) from the resolver.
    pub fn join(registry: &Registry, origin: &str, spec: &JoinSpec) -> Result<Self> {
        let relation = registry
            .resolve(origin)
            .ok_or_else(|| Error::UnknownRelation(origin.to_string()))?;

        Ok(Source::Join(JoinCache::global().resolve(
            registry, relation, spec,
        )?))
    }

    /// The origin relation.
    pub fn relation(&self) -> &Arc<Relation> {
        match self {
            Source::Table(table) => &table.relation,
            Source::Join(join) => &join.origin,
        }
    }

    /// The connection's current schema.
    pub fn current_schema(&self) -> &str {
        match self {
            Source::Table(table) => &table.current_schema,
            Source::Join(join) => &join.current_schema,
        }
    }

    /// The origin's delimited SQL reference.
    pub fn delimited_name(&self) -> String {
        self.relation().delimited_name(self.current_schema())
    }

    /// The join graph, when this source is one.
    pub fn join_source(&self) -> Option<&Arc<JoinSource>> {
        match self {
            Source::Table(_) => None,
            Source::Join(join) => Some(join),
        }
    }

    /// Whether this source is a join graph.
    pub fn is_join(&self) -> bool {
        matches!(self, Source::Join(_))
    }
}

impl TableSource {
    /// Build a table source directly from a relation descriptor.
    pub fn new(relation: Arc<Relation>, current_schema: impl Into<String>) -> Self {
        Self {
            relation,
            current_schema: current_schema.into(),
        }
    }
}

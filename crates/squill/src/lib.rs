//! Squill — a dynamic SQL statement builder and criteria compiler for
//! PostgreSQL.
//!
//! Squill takes relation descriptors, a criteria object, and options, and
//! produces parameterized SQL text plus an ordered parameter list. For
//! joined reads it also builds a decomposition schema that folds the flat
//! result rows back into nested records.
//!
//! # Quick Start
//!
//! ```
//! use serde_json::json;
//! use squill::{Criteria, Registry, Relation, Select, SelectOptions, Source};
//!
//! let registry = Registry::new("public");
//! registry.add(
//!     Relation::new("public", "users", &["id", "name", "age"]).with_pk(&["id"]),
//! );
//!
//! let source = Source::table(&registry, "users").unwrap();
//! let criteria = Criteria::from_json(&json!({
//!     "name": "Alice",
//!     "or": [{"age": 30}, {"age": 31}]
//! }))
//! .unwrap();
//!
//! let select = Select::new(source, &criteria, SelectOptions::default()).unwrap();
//!
//! assert_eq!(
//!     select.format(),
//!     "SELECT * FROM \"users\" WHERE \"name\" = $1 AND ((\"age\" = $2) OR (\"age\" = $3))"
//! );
//! assert_eq!(select.params().len(), 3);
//! ```
//!
//! # Architecture
//!
//! - `squill-core` holds the data model: [`Value`], [`Error`], relation
//!   descriptors, the [`Registry`], and the [`Criteria`] tree.
//! - `squill-statement` holds the compiler: identifier parsing, predicate
//!   compilation, join-graph resolution and caching, the statement
//!   assemblers, and result decomposition.
//!
//! Statement execution is out of scope: hand the SQL and parameters to the
//! database client of your choice.

pub use squill_core::{
    Criteria, CriteriaNode, Error, ForeignKey, GroupKind, PrebuiltPredicate, Registry, Relation,
    Result, Value, quote_ident,
};

pub use squill_statement::{
    Changes, Condition, ConflictAction, Conjunction, DecomposeSchema, DecomposeTo, Delete,
    DeleteOptions, DependentRecord, Generator, Insert, InsertOptions, InsertRecord, InsertValue,
    JoinCache, JoinDefinition, JoinSource, JoinSpec, Lock, LockStrength, LockedRows, NullsOrder,
    OnConflict, Select, SelectOptions, SortCriterion, SortDirection, Source, TableSource, Update,
    UpdateOptions, decompose, find_candidate_join_keys, is_pk_search, pk_criteria,
    record_from_json,
};

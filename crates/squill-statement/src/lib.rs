//! Criteria compilation and SQL statement assembly for Squill.
//!
//! `squill-statement` is the **compiler layer**. It turns criteria trees,
//! join specifications, and options into parameterized PostgreSQL text:
//!
//! - **Identifier parsing**: key expressions with JSON paths, casts, and
//!   operator suffixes resolve against a relation or join graph.
//! - **Predicate compilation**: criteria become a boolean expression plus
//!   an ordered parameter list, with strict placeholder numbering.
//! - **Join resolution**: nested join specifications become aliased join
//!   graphs with foreign-key auto-discovery and decomposition schemas,
//!   cached process-wide per registry snapshot.
//! - **Statement assembly**: SELECT, INSERT, UPDATE, and DELETE builders
//!   validate at construction and render with `format()`.
//! - **Decomposition**: flat joined rows fold back into nested records.
//!
//! Relation descriptors and the criteria data model come from
//! `squill-core`; most users access both through the `squill` facade.

pub mod cache;
pub mod decompose;
pub mod delete;
pub mod document;
pub mod insert;
pub mod join;
pub mod operators;
pub mod order_by;
pub mod parse_key;
pub mod predicate;
pub mod select;
pub mod source;
pub mod statement;
pub mod update;

pub use cache::{JoinCache, cache_key};
pub use decompose::{DecomposeSchema, DecomposeTo, decompose};
pub use delete::{Delete, DeleteOptions};
pub use insert::{
    ConflictAction, DependentRecord, Insert, InsertOptions, InsertRecord, InsertValue, OnConflict,
    record_from_json,
};
pub use join::{
    JoinDefinition, JoinMember, JoinSource, JoinSpec, find_candidate_join_keys, resolve_join,
};
pub use operators::{Mutator, Operation, find_operation};
pub use order_by::{NullsOrder, SortCriterion, SortDirection, full_attribute, order_by};
pub use parse_key::{Condition, JsonPathElement, parse, parse_with_default, with_appendix};
pub use predicate::{Conjunction, Generator, predicate};
pub use select::{Lock, LockStrength, LockedRows, Select, SelectOptions};
pub use source::{Source, TableSource};
pub use statement::{is_pk_search, pk_criteria};
pub use update::{Changes, Update, UpdateOptions};

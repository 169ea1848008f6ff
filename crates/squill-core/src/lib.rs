//! Core types for Squill.
//!
//! `squill-core` is the **data model layer**. It defines the types the
//! statement compiler consumes and produces:
//!
//! - **Values**: `Value`, the dynamically-typed SQL parameter.
//! - **Errors**: `Error`, raised synchronously at statement construction.
//! - **Relations**: `Relation` descriptors and the `Registry` that owns them.
//! - **Criteria**: the `Criteria` tree parsed from the object notation.
//!
//! Statement compilation lives in `squill-statement`; most users access both
//! through the `squill` facade crate.

pub mod criteria;
pub mod error;
pub mod identifiers;
pub mod registry;
pub mod relation;
pub mod value;

pub use criteria::{Criteria, CriteriaNode, GroupKind, PrebuiltPredicate};
pub use error::{Error, Result};
pub use identifiers::quote_ident;
pub use registry::Registry;
pub use relation::{ForeignKey, Relation};
pub use value::Value;

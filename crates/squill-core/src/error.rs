//! Error types for statement construction.
//!
//! Every failure the compiler can produce is raised synchronously while a
//! statement is being built, never at execution time. Genuine database
//! errors (constraint violations, type mismatches) belong to the external
//! executor and are not represented here.

use std::fmt;

/// Convenience alias for compiler results.
pub type Result<T> = std::result::Result<T, Error>;

/// The primary error type for statement construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Criteria, changes, or options have an invalid shape: a non-list
    /// `or`/`and` subgroup, an explicitly empty field list, a bad operator
    /// suffix, and the like.
    MalformedCriteria(String),

    /// A criteria key referenced a relation or alias that is not part of
    /// the active relation graph.
    UnknownRelation(String),

    /// A join specification referenced a relation the registry does not
    /// know about.
    UnknownJoinTarget(String),

    /// An alias or relation name appeared more than once in a join tree.
    DuplicateJoinAlias(String),

    /// No `on` mapping was given and no foreign key relates the two
    /// relations.
    NoImplicitJoinKey(String),

    /// No `on` mapping was given and more than one foreign key could
    /// supply the join keys.
    AmbiguousJoinKey(String),

    /// A joined relation has no primary key in the registry and the join
    /// definition did not provide one; decomposition needs a key to detect
    /// absent children.
    MissingExplicitPrimaryKey(String),

    /// A join-aware UPDATE or DELETE was given more than one root-level
    /// join target; the USING/FROM clause supports exactly one.
    UnsupportedMultiRelationJoin(String),

    /// Mutually exclusive options were combined (lock variants, onConflict
    /// variants, keyset paging with offset/limit).
    ConflictingOptions(String),

    /// Keyset pagination was requested without an order directive.
    MissingOrderForPagination,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedCriteria(msg) => write!(f, "{msg}"),
            Error::UnknownRelation(name) => {
                write!(f, "Unknown relation or alias {name}.")
            }
            Error::UnknownJoinTarget(name) => {
                write!(f, "Bad join definition: unknown database entity {name}.")
            }
            Error::DuplicateJoinAlias(alias) => {
                write!(f, "Bad join definition: {alias} is repeated.")
            }
            Error::NoImplicitJoinKey(name) => {
                write!(f, "An explicit 'on' mapping is required for {name}.")
            }
            Error::AmbiguousJoinKey(name) => {
                write!(
                    f,
                    "Ambiguous foreign keys for {name}. Define join keys explicitly."
                )
            }
            Error::MissingExplicitPrimaryKey(name) => {
                write!(f, "Missing explicit pk in join definition for {name}.")
            }
            Error::UnsupportedMultiRelationJoin(alias) => {
                write!(
                    f,
                    "Join UPDATE and DELETE statements support a single root-level join target; {alias} is one too many."
                )
            }
            Error::ConflictingOptions(msg) => write!(f, "{msg}"),
            Error::MissingOrderForPagination => {
                write!(
                    f,
                    "Keyset paging with page_length requires an explicit order directive"
                )
            }
        }
    }
}

impl std::error::Error for Error {}

//! Criteria trees.
//!
//! Criteria arrive from callers in a small object notation: a mapping from
//! key-expressions (`field`, `field >=`, `relation.field.jsonpath::cast`) to
//! values, with the reserved keys `or` and `and` holding lists of nested
//! criteria, and an alternative pre-built form splicing handwritten SQL.
//! That notation is parsed once at the boundary into the explicit tree
//! defined here; the compiler never sniffs runtime shapes again.

use serde_json::Value as Json;

use crate::error::{Error, Result};
use crate::value::Value;

/// A parsed criteria object.
#[derive(Debug, Clone, PartialEq, Hash)]
pub enum Criteria {
    /// An ordered conjunction of leaf conditions and boolean subgroups.
    Where(Vec<CriteriaNode>),
    /// A pre-built predicate fragment spliced into the generated SQL.
    Prebuilt(PrebuiltPredicate),
}

/// One entry of a criteria object.
#[derive(Debug, Clone, PartialEq, Hash)]
pub enum CriteriaNode {
    /// `key expression` → value.
    Leaf {
        /// The key expression, operator suffix included.
        key: String,
        /// The comparison value.
        value: Value,
    },
    /// An `or`/`and` subgroup of nested criteria.
    Group {
        /// Whether members are OR-ed or AND-ed together.
        kind: GroupKind,
        /// The subgroup members, each an independent criteria object.
        members: Vec<Criteria>,
    },
}

/// Boolean connective of a subgroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    /// Members are OR-ed together.
    Or,
    /// Members are AND-ed together.
    And,
}

impl GroupKind {
    /// The SQL connective.
    pub const fn connective(self) -> &'static str {
        match self {
            GroupKind::Or => " OR ",
            GroupKind::And => " AND ",
        }
    }
}

/// A handwritten, already-parameterized predicate fragment.
///
/// The fragment's placeholders are numbered from `$1`; the compiler
/// renumbers them by the statement's running offset before splicing. Nested
/// criteria in `criteria` are ANDed on after the fragment.
#[derive(Debug, Clone, PartialEq, Hash)]
pub struct PrebuiltPredicate {
    /// Raw predicate SQL with `$1`-based placeholders.
    pub conditions: String,
    /// Values for the fragment's own placeholders, in order.
    pub params: Vec<Value>,
    /// Additional criteria ANDed after the fragment.
    pub criteria: Option<Box<Criteria>>,
    /// Compile the nested criteria in document mode.
    pub is_document: bool,
}

impl Criteria {
    /// Criteria matching every row (`WHERE TRUE`).
    pub fn empty() -> Self {
        Criteria::Where(Vec::new())
    }

    /// Whether this criteria object contributes no conditions.
    pub fn is_empty(&self) -> bool {
        match self {
            Criteria::Where(nodes) => nodes.is_empty(),
            Criteria::Prebuilt(_) => false,
        }
    }

    /// Whether every node is a plain leaf (no subgroups, not pre-built).
    pub fn is_flat(&self) -> bool {
        match self {
            Criteria::Where(nodes) => nodes
                .iter()
                .all(|n| matches!(n, CriteriaNode::Leaf { .. })),
            Criteria::Prebuilt(_) => false,
        }
    }

    /// Leaf keys in order, if this is a flat criteria object.
    pub fn leaf_keys(&self) -> Vec<&str> {
        match self {
            Criteria::Where(nodes) => nodes
                .iter()
                .filter_map(|n| match n {
                    CriteriaNode::Leaf { key, .. } => Some(key.as_str()),
                    CriteriaNode::Group { .. } => None,
                })
                .collect(),
            Criteria::Prebuilt(_) => Vec::new(),
        }
    }

    /// Parse the object notation.
    ///
    /// - `or`/`and` keys introduce subgroups and must hold arrays;
    /// - an object carrying `conditions` is a pre-built fragment with
    ///   optional `params`, `where`, and `isDocument` members;
    /// - every other key is a leaf condition.
    ///
    /// # Errors
    ///
    /// `MalformedCriteria` if the input is not an object or a subgroup value
    /// is not an array.
    pub fn from_json(json: &Json) -> Result<Self> {
        let Json::Object(map) = json else {
            return Err(Error::MalformedCriteria(format!(
                "Criteria must be an object, got {json}."
            )));
        };

        if map.contains_key("conditions") {
            let conditions = map
                .get("conditions")
                .and_then(Json::as_str)
                .ok_or_else(|| {
                    Error::MalformedCriteria(
                        "Pre-built predicate conditions must be a string.".to_string(),
                    )
                })?
                .to_string();

            let params = match map.get("params") {
                Some(Json::Array(items)) => items.iter().map(Value::from_json).collect(),
                Some(other) => {
                    return Err(Error::MalformedCriteria(format!(
                        "Pre-built predicate params must be an array, got {other}."
                    )));
                }
                None => Vec::new(),
            };

            let criteria = match map.get("where") {
                Some(nested) => Some(Box::new(Criteria::from_json(nested)?)),
                None => None,
            };

            let is_document = map
                .get("isDocument")
                .and_then(Json::as_bool)
                .unwrap_or(false);

            return Ok(Criteria::Prebuilt(PrebuiltPredicate {
                conditions,
                params,
                criteria,
                is_document,
            }));
        }

        let mut nodes = Vec::with_capacity(map.len());

        for (key, value) in map {
            let kind = match key.as_str() {
                "or" => Some(GroupKind::Or),
                "and" => Some(GroupKind::And),
                _ => None,
            };

            match kind {
                Some(kind) => {
                    let Json::Array(items) = value else {
                        return Err(Error::MalformedCriteria(format!(
                            "The value of a '{key}' subgroup must be an array of criteria objects."
                        )));
                    };

                    let members = items
                        .iter()
                        .map(Criteria::from_json)
                        .collect::<Result<Vec<_>>>()?;

                    nodes.push(CriteriaNode::Group { kind, members });
                }
                None => nodes.push(CriteriaNode::Leaf {
                    key: key.clone(),
                    value: Value::from_json(value),
                }),
            }
        }

        Ok(Criteria::Where(nodes))
    }
}

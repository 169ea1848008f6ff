//! Helpers shared by the statement assemblers.

use squill_core::{Criteria, CriteriaNode, Error, Result, Value};

use crate::parse_key;
use crate::source::Source;

/// Whether every criteria key targets a primary key column.
///
/// Primary keys are always table columns, so pk searches force the table
/// generator even in document mode.
pub fn is_pk_search(source: &Source, criteria: &Criteria) -> bool {
    let pk = &source.relation().pk;

    if pk.is_empty() || criteria.is_empty() || !criteria.is_flat() {
        return false;
    }

    criteria
        .leaf_keys()
        .iter()
        .all(|key| pk.iter().any(|column| column == &key_field_token(key)))
}

/// The bare field token of a key expression: everything before whitespace,
/// JSON traversal, cast, or operator characters.
fn key_field_token(key: &str) -> String {
    let trimmed = key.trim_start();

    if let Some(quoted) = trimmed.strip_prefix('"') {
        return quoted.split('"').next().unwrap_or("").to_string();
    }

    trimmed
        .split(|c: char| {
            c.is_whitespace()
                || matches!(c, '.' | '[' | ':' | '=' | '<' | '>' | '!' | '~' | '@' | '&' | '|')
        })
        .next()
        .unwrap_or("")
        .to_string()
}

/// Rewrite a primitive value into criteria against the first primary key
/// column.
///
/// # Errors
///
/// `MalformedCriteria` when the relation has no primary key.
pub fn pk_criteria(source: &Source, value: Value) -> Result<Criteria> {
    let relation = source.relation();

    let pk = relation.pk.first().ok_or_else(|| {
        Error::MalformedCriteria(format!(
            "\"{}\" doesn't have a primary key.",
            relation.name
        ))
    })?;

    Ok(Criteria::Where(vec![CriteriaNode::Leaf {
        key: pk.clone(),
        value,
    }]))
}

/// Parse a RETURNING field list, defaulting to `*`.
pub fn parse_returning(fields: Option<&[String]>, source: &Source) -> Result<Vec<String>> {
    match fields {
        Some(fields) => fields
            .iter()
            .map(|field| parse_key::parse(field, source, true).map(|c| c.lhs))
            .collect(),
        None => Ok(vec!["*".to_string()]),
    }
}

//! The condition compiler.
//!
//! Walks a criteria tree and emits a single boolean SQL expression plus an
//! ordered parameter list. The compiler owns placeholder numbering: every
//! call takes the count of parameters already emitted and returns the new
//! count, so composed fragments (WHERE plus keyset pagination, join ON
//! mappings plus criteria) never collide.

use std::sync::LazyLock;

use regex::Regex;

use squill_core::{Criteria, CriteriaNode, Error, PrebuiltPredicate, Result, Value};

use crate::document;
use crate::parse_key::{self, Condition};
use crate::source::Source;

/// A compiled boolean expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Conjunction {
    /// The predicate SQL text.
    pub predicate: String,
    /// Parameters in placeholder order.
    pub params: Vec<Value>,
    /// Total parameters emitted so far, including the incoming offset.
    pub offset: usize,
}

/// How leaf conditions are interpreted.
#[derive(Debug, Clone, Copy)]
pub enum Generator<'a> {
    /// Ordinary relational columns.
    Table,
    /// Document mode: unqualified keys address the JSONB `body` column.
    Document,
    /// Join ON mode: bare keys resolve to the join target, bare values that
    /// name a column of a known relation become column references against
    /// the parent, and everything else is a constant.
    JoinOn {
        /// Alias of the relation being joined.
        target: &'a str,
        /// Alias of the relation being joined onto.
        parent: &'a str,
    },
}

/// Compile `criteria` into a predicate, starting placeholder numbering
/// after `offset` already-emitted parameters.
///
/// # Errors
///
/// `MalformedCriteria` for bad subgroup or key shapes; `UnknownRelation`
/// for unresolvable alias references.
pub fn predicate(
    source: &Source,
    criteria: &Criteria,
    offset: usize,
    generator: Generator<'_>,
) -> Result<Conjunction> {
    match criteria {
        Criteria::Prebuilt(prebuilt) => prebuilt_conjunction(source, prebuilt, offset),
        Criteria::Where(nodes) => {
            if nodes.is_empty() {
                return Ok(Conjunction {
                    predicate: "TRUE".to_string(),
                    params: Vec::new(),
                    offset,
                });
            }

            let mut fragments = Vec::with_capacity(nodes.len());
            let mut params = Vec::new();
            let mut running = offset;

            for node in nodes {
                match node {
                    CriteriaNode::Group { kind, members } => {
                        if members.is_empty() {
                            return Err(Error::MalformedCriteria(
                                "A subgroup must contain at least one criteria object."
                                    .to_string(),
                            ));
                        }

                        let mut member_fragments = Vec::with_capacity(members.len());

                        for member in members {
                            let sub = predicate(source, member, running, generator)?;
                            running = sub.offset;
                            params.extend(sub.params);
                            member_fragments.push(format!("({})", sub.predicate));
                        }

                        fragments.push(format!(
                            "({})",
                            member_fragments.join(kind.connective())
                        ));
                    }
                    CriteriaNode::Leaf { key, value } => {
                        let mut condition = match generator {
                            Generator::Table => parse_key::with_appendix(key, source, None)?,
                            Generator::Document => {
                                parse_key::with_appendix(&format!("body.{key}"), source, None)?
                            }
                            Generator::JoinOn { target, .. } => {
                                parse_key::with_appendix(key, source, Some(target))?
                            }
                        };

                        condition.offset = running + 1;
                        condition.value = Some(value.clone());

                        match generator {
                            Generator::Table => {
                                let stringify = !condition.json_elements.is_empty();
                                format_value(&mut condition, stringify);
                            }
                            Generator::Document => document::document_condition(&mut condition),
                            Generator::JoinOn { parent, .. } => {
                                join_on_value(&mut condition, source, parent);
                            }
                        }

                        running = condition.offset - 1;
                        fragments.push(format!(
                            "{} {} {}",
                            condition.lhs, condition.operator, condition.value_sql
                        ));
                        params.extend(condition.params);
                    }
                }
            }

            Ok(Conjunction {
                predicate: fragments.join(" AND "),
                params,
                offset: running,
            })
        }
    }
}

/// Fold the pending value into placeholder text, rewriting the operator
/// where the value's shape demands it.
///
/// Nulls compare with `IS`/`IS NOT` and bind nothing; arrays become
/// `IN`/`NOT IN` lists with one placeholder per element (or go through the
/// operator's mutator when it has one); scalars bind one placeholder.
/// `stringify` renders values to their text forms first, for comparisons
/// against text-typed JSON traversals.
pub(crate) fn format_value(condition: &mut Condition, stringify: bool) {
    let Some(value) = condition.value.take() else {
        return;
    };

    match value {
        Value::Null => {
            condition.operator = match condition.operator.as_str() {
                "=" => "IS".to_string(),
                "<>" => "IS NOT".to_string(),
                other => other.to_string(),
            };
            condition.value_sql = "null".to_string();
        }
        _ if condition.mutator.is_some() => {
            condition.value = Some(value);
            let mutator = condition.mutator.expect("mutator checked above");
            mutator(condition);
        }
        Value::Bool(b)
            if matches!(condition.operator.as_str(), "IS" | "IS NOT") =>
        {
            condition.value_sql = b.to_string();
        }
        Value::Array(items) => {
            condition.operator = match condition.operator.as_str() {
                "=" => "IN".to_string(),
                "<>" => "NOT IN".to_string(),
                other => other.to_string(),
            };

            let placeholders = items
                .iter()
                .map(|item| {
                    let bound = if stringify {
                        Value::Text(item.stringify())
                    } else {
                        item.clone()
                    };
                    condition.push_param(bound)
                })
                .collect::<Vec<_>>()
                .join(",");

            condition.value_sql = format!("({placeholders})");
        }
        other => {
            if stringify {
                let text = other.stringify();
                condition.value_sql = condition.push_param(Value::Text(text));
            } else {
                let cast = if condition.json_elements.is_empty() {
                    date_cast(&other, condition.target.column_type(&condition.field))
                } else {
                    None
                };

                let placeholder = condition.push_param(other);
                condition.value_sql = match cast {
                    Some(cast) => format!("{placeholder}{cast}"),
                    None => placeholder,
                };
            }
        }
    }
}

/// Date/time literals bind as text and need an engine cast matched to the
/// column's declared type.
fn date_cast(value: &Value, declared: Option<&str>) -> Option<&'static str> {
    if !matches!(value, Value::Timestamp(_)) {
        return None;
    }

    match declared {
        Some("date") => Some("::date"),
        Some("timestamp" | "timestamp without time zone") => Some("::timestamp"),
        Some("timestamptz" | "timestamp with time zone") => Some("::timestamptz"),
        _ => None,
    }
}

/// Join ON values that lex as a field reference and land on a real column
/// become column references; everything else is a constant.
fn join_on_value(condition: &mut Condition, source: &Source, parent: &str) {
    let reference_text = match &condition.value {
        Some(Value::Text(text)) => Some(text.clone()),
        _ => None,
    };

    if let Some(text) = reference_text {
        if let Ok(reference) = parse_key::parse_with_default(&text, source, true, Some(parent)) {
            if reference.target.has_column(&reference.field) {
                condition.value = None;
                condition.value_sql = reference.lhs;
                return;
            }
        }
    }

    let stringify = !condition.json_elements.is_empty();
    format_value(condition, stringify);
}

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d+)").expect("placeholder pattern compiles"));

/// Renumber `$n` placeholders in a pre-built fragment by `offset`.
fn renumber(conditions: &str, offset: usize) -> String {
    PLACEHOLDER
        .replace_all(conditions, |caps: &regex::Captures<'_>| {
            let n: usize = caps[1].parse().unwrap_or(0);
            format!("${}", n + offset)
        })
        .into_owned()
}

fn prebuilt_conjunction(
    source: &Source,
    prebuilt: &PrebuiltPredicate,
    offset: usize,
) -> Result<Conjunction> {
    let mut predicate_text = renumber(&prebuilt.conditions, offset);
    let mut params = prebuilt.params.clone();
    let mut running = offset + params.len();

    if let Some(nested) = &prebuilt.criteria {
        if !nested.is_empty() {
            let generator = if prebuilt.is_document {
                Generator::Document
            } else {
                Generator::Table
            };

            let sub = predicate(source, nested, running, generator)?;
            running = sub.offset;
            params.extend(sub.params);
            predicate_text = format!("{predicate_text} AND {}", sub.predicate);
        }
    }

    Ok(Conjunction {
        predicate: predicate_text,
        params,
        offset: running,
    })
}

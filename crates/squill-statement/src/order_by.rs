//! ORDER BY construction.
//!
//! Sort criteria name either a field (parsed, with JSON path and cast
//! support) or a raw expression passed through verbatim — the latter is a
//! deliberate, caller-trusted injection surface for computed orderings.
//! Keyset pagination reuses the same rendering to build its row-value
//! comparison.

use squill_core::{Error, Result, Value};

use crate::parse_key;
use crate::source::Source;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

/// NULLS FIRST/LAST placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    /// Sort nulls before non-null values.
    First,
    /// Sort nulls after non-null values.
    Last,
}

/// One ORDER BY term.
#[derive(Debug, Clone, Default)]
pub struct SortCriterion {
    /// Field reference, parsed and quoted.
    pub field: Option<String>,
    /// Raw SQL expression, emitted verbatim.
    pub expr: Option<String>,
    /// Sort direction; ascending when unset.
    pub direction: Option<SortDirection>,
    /// Null placement.
    pub nulls: Option<NullsOrder>,
    /// Cast type applied to the rendered attribute.
    pub cast: Option<String>,
    /// Last seen value of this attribute, for keyset pagination.
    pub last: Option<Value>,
}

impl SortCriterion {
    /// Sort by a field.
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            field: Some(name.into()),
            ..Self::default()
        }
    }

    /// Sort by a raw expression.
    pub fn expr(expr: impl Into<String>) -> Self {
        Self {
            expr: Some(expr.into()),
            ..Self::default()
        }
    }

    /// Sort descending.
    #[must_use]
    pub fn desc(mut self) -> Self {
        self.direction = Some(SortDirection::Desc);
        self
    }

    /// Sort ascending (the default).
    #[must_use]
    pub fn asc(mut self) -> Self {
        self.direction = Some(SortDirection::Asc);
        self
    }

    /// Place nulls first.
    #[must_use]
    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(NullsOrder::First);
        self
    }

    /// Place nulls last.
    #[must_use]
    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(NullsOrder::Last);
        self
    }

    /// Cast the sort attribute.
    #[must_use]
    pub fn cast(mut self, cast: impl Into<String>) -> Self {
        self.cast = Some(cast.into());
        self
    }

    /// Record the last seen value for keyset pagination.
    #[must_use]
    pub fn last(mut self, value: impl Into<Value>) -> Self {
        self.last = Some(value.into());
        self
    }
}

/// Render the sort attribute alone (no direction), as keyset pagination
/// row-value comparisons need it.
///
/// # Errors
///
/// `MalformedCriteria` when neither field nor expr is supplied, or the
/// field reference fails to parse.
pub fn full_attribute(
    criterion: &SortCriterion,
    source: &Source,
    use_body: bool,
) -> Result<String> {
    if let Some(expr) = &criterion.expr {
        return Ok(match &criterion.cast {
            Some(cast) => format!("({expr})::{cast}"),
            None => expr.clone(),
        });
    }

    let Some(field) = &criterion.field else {
        return Err(Error::MalformedCriteria(
            "Missing order field or expr.".to_string(),
        ));
    };

    // Ordering traverses JSON as-json unless a cast needs the text form.
    let as_text = criterion.cast.is_some();
    let condition = if use_body {
        parse_key::parse(&format!("body.{field}"), source, as_text)?
    } else {
        parse_key::parse(field, source, as_text)?
    };

    Ok(match &criterion.cast {
        Some(cast) => format!("({})::{cast}", condition.lhs),
        None => condition.lhs,
    })
}

/// Build an `ORDER BY` clause; empty input yields an empty string.
///
/// # Errors
///
/// Propagates [`full_attribute`] failures.
pub fn order_by(criteria: &[SortCriterion], source: &Source, use_body: bool) -> Result<String> {
    if criteria.is_empty() {
        return Ok(String::new());
    }

    let terms = criteria
        .iter()
        .map(|criterion| {
            let attribute = full_attribute(criterion, source, use_body)?;

            let mut term = format!(
                "{attribute} {}",
                match criterion.direction.unwrap_or_default() {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                }
            );

            if let Some(nulls) = criterion.nulls {
                term.push_str(match nulls {
                    NullsOrder::First => " NULLS FIRST",
                    NullsOrder::Last => " NULLS LAST",
                });
            }

            Ok(term)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(format!("ORDER BY {}", terms.join(",")))
}

//! Document-mode predicates.
//!
//! In document mode a relation is treated as a schemaless store: unqualified
//! criteria keys address fields of the JSONB `body` column. Equality tests
//! at depth one, and "contains" tests against arrays of objects, rewrite to
//! a `@>` containment predicate against the whole document — which a GIN
//! index on the body column can serve. Everything else compares the
//! traversed value as text, cast to the comparison value's type.

use serde_json::Value as Json;

use squill_core::Value;

use crate::parse_key::{Condition, JsonPathElement};
use crate::predicate::format_value;

/// Rewrite a parsed `body.<key>` condition for document semantics.
pub(crate) fn document_condition(condition: &mut Condition) {
    let is_array = matches!(condition.value, Some(Value::Array(_)));
    let contains_shape = condition
        .value
        .as_ref()
        .is_some_and(Value::is_object_array);

    if contains_shape
        || (condition.operator == "=" && condition.json_elements.len() == 1 && !is_array)
    {
        let value = condition.value.take().expect("leaf conditions carry a value");
        let param = containment_object(&condition.json_elements, value.to_json());

        condition.lhs = condition.path.clone();
        condition.operator = "@>".to_string();
        condition.value_sql = condition.push_param(Value::Text(param.to_string()));
    } else if matches!(condition.operator.as_str(), "IS" | "IS NOT") {
        // IS operations need no treatment; null and boolean literals emit
        // inline through the shared value formatting.
        format_value(condition, true);
    } else {
        // Comparisons read the field out of the body as text, so the left
        // side converts to the comparison value's type first.
        let cast = match condition.value.as_ref() {
            Some(Value::Bool(_)) => "::boolean",
            Some(Value::Int(_) | Value::Double(_)) => "::decimal",
            Some(Value::Timestamp(_)) => "::timestamptz",
            _ => "",
        };

        condition.lhs = format!("({}){cast}", condition.lhs);

        match condition.value.take() {
            Some(Value::Bool(b)) => condition.value_sql = b.to_string(),
            Some(Value::Int(n)) => condition.value_sql = n.to_string(),
            Some(Value::Double(n)) => condition.value_sql = n.to_string(),
            Some(Value::Timestamp(t)) => {
                condition.value_sql = condition.push_param(Value::Timestamp(t));
            }
            Some(value) => {
                condition.value = Some(value);
                if condition.mutator.is_some() {
                    let mutator = condition.mutator.expect("mutator checked above");
                    mutator(condition);
                } else {
                    format_value(condition, true);
                }
            }
            None => {}
        }
    }
}

/// Build the single-path JSON object compared with `@>`: the key path
/// nested outside-in around the comparison value. Index elements produce
/// arrays with the value at the given position.
fn containment_object(elements: &[JsonPathElement], leaf: Json) -> Json {
    elements.iter().rev().fold(leaf, |acc, element| {
        if element.index {
            let idx = element.text.parse::<usize>().unwrap_or(0);
            let mut items = vec![Json::Null; idx];
            items.push(acc);
            Json::Array(items)
        } else {
            let mut map = serde_json::Map::new();
            map.insert(element.text.clone(), acc);
            Json::Object(map)
        }
    })
}

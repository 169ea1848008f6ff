//! The operator table.
//!
//! Key expressions may end in an operator phrase (`price >=`, `name not
//! similar to`). The table below is the closed set of recognized phrases;
//! lookup happens on the whole whitespace-normalized trailing phrase, which
//! makes matching longest-match by construction — `~` can never shadow `~~*`
//! because the phrase is matched in its entirety, not prefix by prefix.

use squill_core::Value;

use crate::parse_key::Condition;

/// A value-transform hook attached to an operator.
///
/// Mutators rewrite the condition's pending value before emission; the array
/// operators use one to serialize a `Value::Array` into PostgreSQL
/// array-literal syntax bound as a single parameter.
pub type Mutator = fn(&mut Condition);

/// One entry of the operator table.
#[derive(Debug)]
pub struct Operation {
    /// Normalized lookup token (uppercase, single-spaced).
    pub token: &'static str,
    /// SQL operator text to emit.
    pub operator: &'static str,
    /// Optional value mutator.
    pub mutator: Option<Mutator>,
}

static OPERATIONS: &[Operation] = &[
    Operation { token: "=", operator: "=", mutator: None },
    Operation { token: "!", operator: "<>", mutator: None },
    Operation { token: "!=", operator: "<>", mutator: None },
    Operation { token: "<>", operator: "<>", mutator: None },
    Operation { token: "<", operator: "<", mutator: None },
    Operation { token: "<=", operator: "<=", mutator: None },
    Operation { token: ">", operator: ">", mutator: None },
    Operation { token: ">=", operator: ">=", mutator: None },
    Operation { token: "IS", operator: "IS", mutator: None },
    Operation { token: "IS NOT", operator: "IS NOT", mutator: None },
    Operation { token: "IS DISTINCT FROM", operator: "IS DISTINCT FROM", mutator: None },
    Operation { token: "IS NOT DISTINCT FROM", operator: "IS NOT DISTINCT FROM", mutator: None },
    Operation { token: "IN", operator: "IN", mutator: None },
    Operation { token: "NOT IN", operator: "NOT IN", mutator: None },
    Operation { token: "LIKE", operator: "LIKE", mutator: None },
    Operation { token: "NOT LIKE", operator: "NOT LIKE", mutator: None },
    Operation { token: "~~", operator: "LIKE", mutator: None },
    Operation { token: "!~~", operator: "NOT LIKE", mutator: None },
    Operation { token: "ILIKE", operator: "ILIKE", mutator: None },
    Operation { token: "NOT ILIKE", operator: "NOT ILIKE", mutator: None },
    Operation { token: "~~*", operator: "ILIKE", mutator: None },
    Operation { token: "!~~*", operator: "NOT ILIKE", mutator: None },
    Operation { token: "SIMILAR TO", operator: "SIMILAR TO", mutator: None },
    Operation { token: "NOT SIMILAR TO", operator: "NOT SIMILAR TO", mutator: None },
    Operation { token: "~", operator: "~", mutator: None },
    Operation { token: "!~", operator: "!~", mutator: None },
    Operation { token: "~*", operator: "~*", mutator: None },
    Operation { token: "!~*", operator: "!~*", mutator: None },
    Operation { token: "@>", operator: "@>", mutator: Some(array_literal) },
    Operation { token: "<@", operator: "<@", mutator: Some(array_literal) },
    Operation { token: "&&", operator: "&&", mutator: Some(array_literal) },
];

/// The default equality operation.
pub fn equality() -> &'static Operation {
    &OPERATIONS[0]
}

/// Look up an operator phrase, case-insensitively and ignoring extra
/// whitespace. Returns `None` for unrecognized phrases.
pub fn find_operation(phrase: &str) -> Option<&'static Operation> {
    let normalized = phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase();

    OPERATIONS.iter().find(|op| op.token == normalized)
}

/// Serialize an array value to PostgreSQL array-literal syntax, bound as a
/// single parameter. Non-array values fall through to ordinary binding.
fn array_literal(condition: &mut Condition) {
    match condition.value.take() {
        Some(Value::Array(items)) => {
            let literal = format!(
                "{{{}}}",
                items.iter().map(array_element).collect::<Vec<_>>().join(",")
            );
            condition.value_sql = condition.push_param(Value::Text(literal));
        }
        Some(other) => {
            condition.value_sql = condition.push_param(other);
        }
        None => {}
    }
}

fn array_element(value: &Value) -> String {
    let text = value.stringify();

    let needs_quoting = text.is_empty()
        || text.eq_ignore_ascii_case("null")
        || text
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '{' | '}' | ',' | '"' | '\\'));

    if needs_quoting {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_simple() {
        assert_eq!(find_operation(">=").unwrap().operator, ">=");
        assert_eq!(find_operation("<>").unwrap().operator, "<>");
    }

    #[test]
    fn test_find_is_case_insensitive() {
        assert_eq!(find_operation("LikE").unwrap().operator, "LIKE");
        assert_eq!(find_operation("not similar to").unwrap().operator, "NOT SIMILAR TO");
    }

    #[test]
    fn test_whole_phrase_matching_disambiguates_tildes() {
        assert_eq!(find_operation("~~*").unwrap().operator, "ILIKE");
        assert_eq!(find_operation("~*").unwrap().operator, "~*");
        assert_eq!(find_operation("~").unwrap().operator, "~");
    }

    #[test]
    fn test_whitespace_normalization() {
        assert_eq!(
            find_operation("  not \t similar \r\n to ").unwrap().operator,
            "NOT SIMILAR TO"
        );
    }

    #[test]
    fn test_unknown_phrase() {
        assert!(find_operation("resembles").is_none());
    }

    #[test]
    fn test_array_element_quoting() {
        assert_eq!(array_element(&Value::Text("hi".into())), "hi");
        assert_eq!(array_element(&Value::Int(5)), "5");
        assert_eq!(
            array_element(&Value::Text("has space".into())),
            "\"has space\""
        );
        assert_eq!(array_element(&Value::Text("a,b".into())), "\"a,b\"");
        assert_eq!(
            array_element(&Value::Text("say \"hi\"".into())),
            "\"say \\\"hi\\\"\""
        );
    }
}

//! The identifier parser.
//!
//! A key expression is `[schema.][relation.]field[.seg|[idx]]*[::cast]`,
//! optionally followed by a whitespace-delimited operator phrase. Segments
//! wrapped in double quotes are taken verbatim, so reserved words and
//! embedded structural characters are usable as field names. JSON traversal
//! depth picks the engine operator: one level uses `->`/`->>`, deeper paths
//! use `#>`/`#>>`; bracketed numeric segments are array indices and stay
//! unquoted in the traversal text.

use std::sync::Arc;

use squill_core::{Error, Relation, Result, Value, quote_ident};

use crate::operators::{self, Mutator};
use crate::source::Source;

/// One element of a JSON traversal path.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPathElement {
    /// The element text.
    pub text: String,
    /// Whether the element was bracketed (an array index).
    pub index: bool,
}

/// A parsed key expression, partway through becoming a predicate.
///
/// The parser fills the structural fields; the condition compiler assigns
/// `value` and `offset`, then folds the condition into SQL text.
#[derive(Debug, Clone)]
pub struct Condition {
    /// Schema name, when the expression was schema-qualified.
    pub schema: Option<String>,
    /// Resolved alias the field belongs to (join sources only).
    pub relation: Option<String>,
    /// The resolved relation descriptor the field belongs to.
    pub target: Arc<Relation>,
    /// The bare field name.
    pub field: String,
    /// The quoted field reference, alias-qualified for join sources.
    pub path: String,
    /// JSON traversal elements, outermost first.
    pub json_elements: Vec<JsonPathElement>,
    /// The full left-hand-side expression (traversal and cast applied).
    pub lhs: String,
    /// SQL operator to emit. Defaults to `=`; the compiler may rewrite it
    /// (null handling, array handling, document containment).
    pub operator: String,
    /// Optional operator value mutator.
    pub mutator: Option<Mutator>,
    /// The pending comparison value, consumed by the compiler.
    pub value: Option<Value>,
    /// The emitted right-hand-side SQL text.
    pub value_sql: String,
    /// Parameters accumulated for this condition.
    pub params: Vec<Value>,
    /// The next free placeholder number (1-based).
    pub offset: usize,
}

impl Condition {
    /// Bind a parameter and return its placeholder text.
    pub fn push_param(&mut self, value: Value) -> String {
        self.params.push(value);
        let placeholder = format!("${}", self.offset);
        self.offset += 1;
        placeholder
    }
}

#[derive(Debug)]
struct PathPart {
    text: String,
    index: bool,
}

#[derive(Debug)]
struct Lexed {
    parts: Vec<PathPart>,
    cast: Option<String>,
    appendix: String,
}

fn is_symbol(c: char) -> bool {
    matches!(
        c,
        '=' | '<' | '>' | '!' | '~' | '@' | '&' | '|' | '*' | '+' | '/' | '^' | '?' | '%' | '#'
    )
}

fn lex(expr: &str) -> Result<Lexed> {
    let cs: Vec<char> = expr.chars().collect();
    let len = cs.len();
    let mut i = 0;
    let mut parts = Vec::new();
    let mut cast = None;

    while i < len && cs[i].is_whitespace() {
        i += 1;
    }

    while i < len {
        match cs[i] {
            '"' => {
                i += 1;
                let start = i;
                while i < len && cs[i] != '"' {
                    i += 1;
                }
                if i >= len {
                    return Err(Error::MalformedCriteria(format!(
                        "Unterminated quoted identifier in key '{expr}'."
                    )));
                }
                parts.push(PathPart {
                    text: cs[start..i].iter().collect(),
                    index: false,
                });
                i += 1;
            }
            '[' => {
                i += 1;
                let start = i;
                while i < len && cs[i] != ']' {
                    i += 1;
                }
                if i >= len || start == i {
                    return Err(Error::MalformedCriteria(format!(
                        "Malformed array index in key '{expr}'."
                    )));
                }
                parts.push(PathPart {
                    text: cs[start..i].iter().collect(),
                    index: true,
                });
                i += 1;
            }
            '.' => {
                i += 1;
            }
            ':' => {
                if i + 1 >= len || cs[i + 1] != ':' {
                    return Err(Error::MalformedCriteria(format!(
                        "Malformed cast in key '{expr}'."
                    )));
                }
                i += 2;
                let start = i;
                while i < len && (cs[i].is_alphanumeric() || cs[i] == '_') {
                    i += 1;
                }
                if start == i {
                    return Err(Error::MalformedCriteria(format!(
                        "Malformed cast in key '{expr}'."
                    )));
                }
                cast = Some(cs[start..i].iter().collect());
                break;
            }
            c if c.is_whitespace() || is_symbol(c) => break,
            _ => {
                let start = i;
                while i < len {
                    let c = cs[i];
                    if c == '.'
                        || c == '"'
                        || c == '['
                        || c == ']'
                        || c == ':'
                        || c.is_whitespace()
                        || is_symbol(c)
                    {
                        break;
                    }
                    i += 1;
                }
                parts.push(PathPart {
                    text: cs[start..i].iter().collect(),
                    index: false,
                });
            }
        }
    }

    if parts.is_empty() {
        return Err(Error::MalformedCriteria(format!(
            "Empty field reference in key '{expr}'."
        )));
    }

    Ok(Lexed {
        parts,
        cast,
        appendix: cs[i.min(len)..].iter().collect::<String>().trim().to_string(),
    })
}

struct Resolved {
    schema: Option<String>,
    relation: Option<String>,
    target: Arc<Relation>,
    path: String,
    field: String,
    json: Vec<JsonPathElement>,
}

fn resolve(parts: Vec<PathPart>, source: &Source, default_alias: Option<&str>) -> Result<Resolved> {
    let mut split = None;

    if let Some(join) = source.join_source() {
        if parts.len() >= 3 && !parts[0].index && !parts[1].index {
            if let Some((alias, relation)) =
                join.resolve_qualified(&parts[0].text, &parts[1].text)
            {
                split = Some((
                    Some(parts[0].text.clone()),
                    alias.to_string(),
                    relation.clone(),
                    2,
                ));
            }
        }

        if split.is_none() && parts.len() >= 2 && !parts[0].index {
            if let Some((alias, relation)) = join.resolve_name(&parts[0].text) {
                split = Some((None, alias.to_string(), relation.clone(), 1));
            }
        }

        if split.is_none() {
            match default_alias {
                Some(alias) => {
                    let (alias, relation) = join.alias_relation(alias).ok_or_else(|| {
                        Error::UnknownRelation(alias.to_string())
                    })?;
                    split = Some((None, alias.to_string(), relation.clone(), 0));
                }
                None => {
                    split = Some((
                        Some(join.origin.schema.clone()),
                        join.origin_alias.clone(),
                        join.origin.clone(),
                        0,
                    ));
                }
            }
        }
    }

    match split {
        Some((schema, alias, target, skip)) => {
            let field = parts[skip].text.clone();
            let path = format!("{}.{}", quote_ident(&alias), quote_ident(&field));
            let json = parts[skip + 1..]
                .iter()
                .map(|p| JsonPathElement {
                    text: p.text.clone(),
                    index: p.index,
                })
                .collect();

            Ok(Resolved {
                schema,
                relation: Some(alias),
                target,
                path,
                field,
                json,
            })
        }
        None => {
            let field = parts[0].text.clone();
            let json = parts[1..]
                .iter()
                .map(|p| JsonPathElement {
                    text: p.text.clone(),
                    index: p.index,
                })
                .collect();

            Ok(Resolved {
                schema: None,
                relation: None,
                target: source.relation().clone(),
                path: quote_ident(&field),
                field,
                json,
            })
        }
    }
}

fn build_lhs(path: &str, json: &[JsonPathElement], cast: Option<&str>, as_text: bool) -> String {
    let as_text = as_text || cast.is_some();

    let base = match json.len() {
        0 => match cast {
            Some(cast) => return format!("{path}::{cast}"),
            None => path.to_string(),
        },
        1 => {
            let op = if as_text { "->>" } else { "->" };
            let element = &json[0];
            if element.index {
                format!("{path}{op}{}", element.text)
            } else {
                format!("{path}{op}'{}'", element.text)
            }
        }
        _ => {
            let op = if as_text { "#>>" } else { "#>" };
            let elements = json
                .iter()
                .map(|e| e.text.as_str())
                .collect::<Vec<_>>()
                .join(",");
            format!("{path}{op}'{{{elements}}}'")
        }
    };

    match cast {
        Some(cast) => format!("({base})::{cast}"),
        None => base,
    }
}

/// Parse a key expression without an operator suffix.
///
/// `as_text` picks the as-text JSON traversal operators; an explicit cast in
/// the expression forces as-text regardless.
///
/// # Errors
///
/// `MalformedCriteria` when the expression is malformed or carries trailing
/// text beyond the field reference.
pub fn parse(expr: &str, source: &Source, as_text: bool) -> Result<Condition> {
    parse_with_default(expr, source, as_text, None)
}

/// Like [`parse`], but unqualified references resolve to `default_alias`
/// instead of the origin. Join ON mappings use this to point values at the
/// parent relation.
pub fn parse_with_default(
    expr: &str,
    source: &Source,
    as_text: bool,
    default_alias: Option<&str>,
) -> Result<Condition> {
    let lexed = lex(expr)?;

    if !lexed.appendix.is_empty() {
        return Err(Error::MalformedCriteria(format!(
            "Unexpected trailing text '{}' in key '{expr}'.",
            lexed.appendix
        )));
    }

    build_condition(lexed, source, as_text, default_alias)
}

/// Parse a key expression with an optional trailing operator phrase.
///
/// The operator defaults to `=` when no suffix is present; an unrecognized
/// suffix is an error. JSON traversals parse as-text, matching comparison
/// semantics.
///
/// # Errors
///
/// `MalformedCriteria` for malformed expressions or unknown operators.
pub fn with_appendix(
    expr: &str,
    source: &Source,
    default_alias: Option<&str>,
) -> Result<Condition> {
    let lexed = lex(expr)?;

    let operation = if lexed.appendix.is_empty() {
        operators::equality()
    } else {
        operators::find_operation(&lexed.appendix).ok_or_else(|| {
            Error::MalformedCriteria(format!(
                "Unrecognized operator '{}' in key '{expr}'.",
                lexed.appendix
            ))
        })?
    };

    let mut condition = build_condition(lexed, source, true, default_alias)?;
    condition.operator = operation.operator.to_string();
    condition.mutator = operation.mutator;

    Ok(condition)
}

fn build_condition(
    lexed: Lexed,
    source: &Source,
    as_text: bool,
    default_alias: Option<&str>,
) -> Result<Condition> {
    let resolved = resolve(lexed.parts, source, default_alias)?;
    let lhs = build_lhs(
        &resolved.path,
        &resolved.json,
        lexed.cast.as_deref(),
        as_text,
    );

    Ok(Condition {
        schema: resolved.schema,
        relation: resolved.relation,
        target: resolved.target,
        field: resolved.field,
        path: resolved.path,
        json_elements: resolved.json,
        lhs,
        operator: "=".to_string(),
        mutator: None,
        value: None,
        value_sql: String::new(),
        params: Vec::new(),
        offset: 1,
    })
}

//! Join graph resolution.
//!
//! A join specification is a nested mapping of aliases to join definitions.
//! Resolution walks it depth-first against the registry, auto-discovering
//! foreign-key join conditions where none are given, rejecting repeated
//! aliases, and producing three artifacts: the ordered join-step list for
//! SQL emission, the ON-constant parameter list, and the decomposition
//! schema that folds flat result rows back into a record tree.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value as Json;

use squill_core::{
    Criteria, CriteriaNode, Error, Registry, Relation, Result, Value, quote_ident,
};

use crate::decompose::{DecomposeSchema, DecomposeTo};
use crate::predicate::{self, Generator};
use crate::source::Source;

/// A nested join specification.
#[derive(Debug, Clone, PartialEq, Hash, Default)]
pub struct JoinSpec {
    /// Explicit origin primary key, required when the origin relation (a
    /// view, say) has none of its own.
    pub pk: Option<Vec<String>>,
    /// Alias → definition entries, in declaration order.
    pub entries: Vec<(String, JoinDefinition)>,
}

/// One joined relation.
#[derive(Debug, Clone, PartialEq, Hash, Default)]
pub struct JoinDefinition {
    /// Target relation path (`name` or `schema.name`); defaults to the
    /// entry key.
    pub relation: Option<String>,
    /// Join type; a passthrough string defaulting to `INNER`.
    pub kind: Option<String>,
    /// ON criteria. Omitted: discovered from foreign keys.
    pub on: Option<Criteria>,
    /// Explicit primary key, required when the target has none.
    pub pk: Option<Vec<String>>,
    /// Decompose into an array (default) or a single object.
    pub decompose_to: Option<DecomposeTo>,
    /// Resolve and join this relation but omit it from decomposed output.
    pub omit: bool,
    /// Joins hanging off this relation.
    pub nested: Vec<(String, JoinDefinition)>,
}

impl JoinSpec {
    /// Shorthand for joining a single relation by name with discovered keys.
    pub fn relation(name: impl Into<String>) -> Self {
        Self {
            pk: None,
            entries: vec![(name.into(), JoinDefinition::default())],
        }
    }

    /// Parse the object notation: each key is an alias (or relation name);
    /// each value is `true`, a relation name, or a definition object whose
    /// unreserved keys are nested joins. A top-level `pk` key overrides the
    /// origin primary key.
    ///
    /// # Errors
    ///
    /// `MalformedCriteria` for shapes outside the notation.
    pub fn from_json(json: &Json) -> Result<Self> {
        match json {
            Json::String(name) => Ok(Self::relation(name.clone())),
            Json::Object(map) => {
                let mut pk = None;
                let mut entries = Vec::new();

                for (key, value) in map {
                    if key == "pk" {
                        pk = Some(pk_list(value)?);
                        continue;
                    }

                    entries.push((key.clone(), JoinDefinition::from_json(value)?));
                }

                Ok(Self { pk, entries })
            }
            _ => Err(Error::MalformedCriteria(format!(
                "A join specification must be an object or relation name, got {json}."
            ))),
        }
    }
}

impl JoinDefinition {
    fn from_json(json: &Json) -> Result<Self> {
        match json {
            Json::Bool(true) => Ok(Self::default()),
            Json::String(name) => Ok(Self {
                relation: Some(name.clone()),
                ..Self::default()
            }),
            Json::Object(map) => {
                let mut definition = Self::default();

                for (key, value) in map {
                    match key.as_str() {
                        "relation" => {
                            definition.relation =
                                Some(value.as_str().map(str::to_string).ok_or_else(|| {
                                    Error::MalformedCriteria(
                                        "A join relation must be a string.".to_string(),
                                    )
                                })?);
                        }
                        "type" => {
                            definition.kind =
                                Some(value.as_str().map(str::to_string).ok_or_else(|| {
                                    Error::MalformedCriteria(
                                        "A join type must be a string.".to_string(),
                                    )
                                })?);
                        }
                        "on" => definition.on = Some(Criteria::from_json(value)?),
                        "pk" => definition.pk = Some(pk_list(value)?),
                        "omit" => definition.omit = value.as_bool().unwrap_or(false),
                        "decomposeTo" => {
                            definition.decompose_to = Some(match value.as_str() {
                                Some("object") => DecomposeTo::Object,
                                Some("array") => DecomposeTo::Array,
                                _ => {
                                    return Err(Error::MalformedCriteria(
                                        "decomposeTo must be 'array' or 'object'.".to_string(),
                                    ));
                                }
                            });
                        }
                        _ => {
                            definition
                                .nested
                                .push((key.clone(), JoinDefinition::from_json(value)?));
                        }
                    }
                }

                Ok(definition)
            }
            _ => Err(Error::MalformedCriteria(format!(
                "A join definition must be an object, relation name, or true; got {json}."
            ))),
        }
    }
}

fn pk_list(json: &Json) -> Result<Vec<String>> {
    match json {
        Json::String(column) => Ok(vec![column.clone()]),
        Json::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    Error::MalformedCriteria("pk columns must be strings.".to_string())
                })
            })
            .collect(),
        _ => Err(Error::MalformedCriteria(
            "pk must be a column name or list of column names.".to_string(),
        )),
    }
}

/// A resolved join graph: the origin plus an ordered list of join steps.
#[derive(Debug, Clone)]
pub struct JoinSource {
    /// The origin relation.
    pub origin: Arc<Relation>,
    /// The origin's alias in emitted SQL (its bare name).
    pub origin_alias: String,
    /// The connection's current schema.
    pub current_schema: String,
    /// Join steps in declaration (pre-order) order.
    pub members: Vec<JoinMember>,
    /// Parameters bound by ON-mapping constants, in placeholder order.
    pub params: Vec<Value>,
    /// Number of ON parameters; statement predicates number after this.
    pub offset: usize,
    /// The generated decomposition schema.
    pub decompose: DecomposeSchema,
}

/// One join step.
#[derive(Debug, Clone)]
pub struct JoinMember {
    /// Alias in emitted SQL.
    pub alias: String,
    /// The joined relation.
    pub relation: Arc<Relation>,
    /// Join type keyword (`INNER`, `LEFT OUTER`, ...).
    pub kind: String,
    /// Delimited relation reference, with `AS` alias when required.
    pub relation_ref: String,
    /// Compiled ON predicate.
    pub on_sql: String,
    /// Whether this join hangs directly off the origin.
    pub root: bool,
}

impl JoinSource {
    pub(crate) fn alias_relation(&self, alias: &str) -> Option<(&str, &Arc<Relation>)> {
        if alias == self.origin_alias {
            return Some((&self.origin_alias, &self.origin));
        }

        self.members
            .iter()
            .find(|m| m.alias == alias)
            .map(|m| (m.alias.as_str(), &m.relation))
    }

    pub(crate) fn resolve_qualified(
        &self,
        schema: &str,
        name: &str,
    ) -> Option<(&str, &Arc<Relation>)> {
        if self.origin.schema == schema && self.origin.name == name {
            return Some((&self.origin_alias, &self.origin));
        }

        self.members
            .iter()
            .find(|m| m.relation.schema == schema && m.relation.name == name)
            .map(|m| (m.alias.as_str(), &m.relation))
    }

    pub(crate) fn resolve_name(&self, name: &str) -> Option<(&str, &Arc<Relation>)> {
        self.alias_relation(name).or_else(|| {
            self.members
                .iter()
                .find(|m| m.relation.name == name)
                .map(|m| (m.alias.as_str(), &m.relation))
        })
    }

    /// `(alias, column)` pairs in select-list order: origin first, then
    /// each join step's columns in declaration order.
    pub fn aliased_columns(&self) -> Vec<(String, String)> {
        let mut columns: Vec<(String, String)> = self
            .origin
            .columns
            .iter()
            .map(|c| (self.origin_alias.clone(), c.clone()))
            .collect();

        for member in &self.members {
            columns.extend(
                member
                    .relation
                    .columns
                    .iter()
                    .map(|c| (member.alias.clone(), c.clone())),
            );
        }

        columns
    }

    /// The aliased select list: `"alias"."col" AS "alias__col"`.
    pub fn select_list(&self) -> Vec<String> {
        self.aliased_columns()
            .into_iter()
            .map(|(alias, column)| {
                format!(
                    "{}.{} AS {}",
                    quote_ident(&alias),
                    quote_ident(&column),
                    quote_ident(&format!("{alias}__{column}"))
                )
            })
            .collect()
    }

    /// Number of root-level join steps.
    pub fn root_count(&self) -> usize {
        self.members.iter().filter(|m| m.root).count()
    }
}

/// Candidate join keys between a parent and a prospective join target,
/// derived from foreign-key metadata in both directions. Each candidate
/// pairs the constraint name with a ready-to-compile ON mapping whose bare
/// keys land on the target and whose values reference the parent.
pub fn find_candidate_join_keys(
    parent: &Relation,
    parent_alias: &str,
    target: &Relation,
) -> Vec<(String, Criteria)> {
    let mut candidates = Vec::new();

    for fk in &target.foreign_keys {
        if fk.references(parent) {
            let nodes = fk
                .columns
                .iter()
                .zip(&fk.referenced_columns)
                .map(|(column, referenced)| CriteriaNode::Leaf {
                    key: column.clone(),
                    value: Value::Text(referenced.clone()),
                })
                .collect();

            candidates.push((fk.constraint.clone(), Criteria::Where(nodes)));
        }
    }

    for fk in &parent.foreign_keys {
        if fk.references(target) {
            let nodes = fk
                .referenced_columns
                .iter()
                .zip(&fk.columns)
                .map(|(referenced, column)| CriteriaNode::Leaf {
                    key: referenced.clone(),
                    value: Value::Text(format!("{parent_alias}.{column}")),
                })
                .collect();

            candidates.push((fk.constraint.clone(), Criteria::Where(nodes)));
        }
    }

    candidates
}

/// Resolve a join specification against the registry.
///
/// # Errors
///
/// `UnknownJoinTarget`, `DuplicateJoinAlias`, `NoImplicitJoinKey`,
/// `AmbiguousJoinKey`, or `MissingExplicitPrimaryKey` per the join
/// invariants; `MalformedCriteria`/`UnknownRelation` from ON compilation.
pub fn resolve_join(
    registry: &Registry,
    origin: Arc<Relation>,
    spec: &JoinSpec,
) -> Result<JoinSource> {
    let origin_alias = origin.name.clone();

    let origin_pk = match &spec.pk {
        Some(pk) => pk.clone(),
        None if !origin.pk.is_empty() => origin.pk.clone(),
        None => return Err(Error::MissingExplicitPrimaryKey(origin.name.clone())),
    };

    let mut source = JoinSource {
        origin: origin.clone(),
        origin_alias: origin_alias.clone(),
        current_schema: registry.current_schema().to_string(),
        members: Vec::new(),
        params: Vec::new(),
        offset: 0,
        decompose: DecomposeSchema::default(),
    };

    let mut seen: HashSet<String> = HashSet::from([origin_alias.clone()]);
    let children = walk(
        registry,
        &mut source,
        &mut seen,
        &origin_alias,
        &origin,
        &spec.entries,
        true,
    )?;

    source.decompose = DecomposeSchema {
        pk: aliased_columns_of(&origin_alias, &origin_pk),
        columns: column_map(&origin_alias, &origin),
        children,
        omit: false,
        decompose_to: DecomposeTo::Array,
    };

    Ok(source)
}

fn walk(
    registry: &Registry,
    source: &mut JoinSource,
    seen: &mut HashSet<String>,
    parent_alias: &str,
    parent: &Arc<Relation>,
    entries: &[(String, JoinDefinition)],
    root: bool,
) -> Result<Vec<(String, DecomposeSchema)>> {
    let mut children = Vec::with_capacity(entries.len());

    for (key, definition) in entries {
        let relation_path = definition.relation.as_deref().unwrap_or(key);
        let target = registry
            .resolve(relation_path)
            .ok_or_else(|| Error::UnknownJoinTarget(relation_path.to_string()))?;

        // An explicit relation makes the key a plain alias; a bare
        // schema-qualified key aliases to the relation name alone.
        let alias = if definition.relation.is_some() {
            key.clone()
        } else {
            key.rsplit('.').next().unwrap_or(key).to_string()
        };

        if !seen.insert(alias.clone()) {
            return Err(Error::DuplicateJoinAlias(alias));
        }

        let pk = match &definition.pk {
            Some(pk) => pk.clone(),
            None if !target.pk.is_empty() => target.pk.clone(),
            None => return Err(Error::MissingExplicitPrimaryKey(alias)),
        };

        let kind = definition
            .kind
            .as_deref()
            .unwrap_or("INNER")
            .to_uppercase();

        let relation_ref = if target.schema == source.current_schema && alias == target.name {
            quote_ident(&target.name)
        } else {
            format!(
                "{} AS {}",
                target.delimited_name(&source.current_schema),
                quote_ident(&alias)
            )
        };

        let on_criteria = match &definition.on {
            Some(criteria) => criteria.clone(),
            None => {
                let mut candidates = find_candidate_join_keys(parent, parent_alias, &target);
                match candidates.len() {
                    0 => return Err(Error::NoImplicitJoinKey(key.clone())),
                    1 => candidates.remove(0).1,
                    _ => return Err(Error::AmbiguousJoinKey(key.clone())),
                }
            }
        };

        source.members.push(JoinMember {
            alias: alias.clone(),
            relation: target.clone(),
            kind,
            relation_ref,
            on_sql: String::new(),
            root,
        });

        // ON mappings may reference any alias declared so far, including
        // the one just added; compile against the partial graph.
        let partial = Source::Join(Arc::new(source.clone()));
        let conjunction = predicate::predicate(
            &partial,
            &on_criteria,
            source.offset,
            Generator::JoinOn {
                target: alias.as_str(),
                parent: parent_alias,
            },
        )?;

        source.offset = conjunction.offset;
        source.params.extend(conjunction.params);
        source
            .members
            .last_mut()
            .expect("member pushed above")
            .on_sql = conjunction.predicate;

        let grandchildren = walk(
            registry,
            source,
            seen,
            &alias,
            &target,
            &definition.nested,
            false,
        )?;

        children.push((
            alias.clone(),
            DecomposeSchema {
                pk: aliased_columns_of(&alias, &pk),
                columns: column_map(&alias, &target),
                children: grandchildren,
                omit: definition.omit,
                decompose_to: definition.decompose_to.unwrap_or_default(),
            },
        ));
    }

    Ok(children)
}

fn aliased_columns_of(alias: &str, columns: &[String]) -> Vec<String> {
    columns.iter().map(|c| format!("{alias}__{c}")).collect()
}

fn column_map(alias: &str, relation: &Relation) -> Vec<(String, String)> {
    relation
        .columns
        .iter()
        .map(|c| (format!("{alias}__{c}"), c.clone()))
        .collect()
}

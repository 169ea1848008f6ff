//! UPDATE statements.
//!
//! Join-aware updates mutate the origin only: the first join becomes the
//! `FROM` relation, deeper joins chain as `JOIN … ON …`, and the first
//! join's ON predicate is ANDed into the WHERE clause, since a `FROM` join
//! is an unconditional cross join needing its condition there.

use squill_core::{Criteria, Error, Result, Value, quote_ident};

use crate::predicate::{self, Generator};
use crate::source::Source;
use crate::statement;

/// The changes an UPDATE applies.
#[derive(Debug, Clone, Default)]
pub struct Changes {
    /// Column → new value, bound as parameters.
    pub fields: Vec<(String, Value)>,
    /// Column → raw SQL expression, emitted verbatim (caller-trusted).
    pub exprs: Vec<(String, String)>,
}

impl Changes {
    /// Empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column to a value.
    #[must_use]
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((column.into(), value.into()));
        self
    }

    /// Set a column to a raw SQL expression.
    #[must_use]
    pub fn set_expr(mut self, column: impl Into<String>, expr: impl Into<String>) -> Self {
        self.exprs.push((column.into(), expr.into()));
        self
    }

    /// Parse a JSON object of column/value changes.
    ///
    /// # Errors
    ///
    /// `MalformedCriteria` when the input is not an object.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(map) = json else {
            return Err(Error::MalformedCriteria(format!(
                "An update change map must be an object, got {json}."
            )));
        };

        Ok(Self {
            fields: map
                .iter()
                .map(|(key, value)| (key.clone(), Value::from_json(value)))
                .collect(),
            exprs: Vec::new(),
        })
    }
}

/// UPDATE options.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Emit `ONLY`, excluding subtable rows.
    pub only: bool,
    /// Compile criteria in document mode.
    pub document: bool,
    /// Expect a single affected row (execution hint; no SQL effect).
    pub single: bool,
    /// Restrict the RETURNING list.
    pub fields: Option<Vec<String>>,
}

/// A compiled UPDATE statement.
#[derive(Debug)]
pub struct Update {
    source: Source,
    only: bool,
    single: bool,
    changes: Vec<String>,
    predicate: String,
    returning: Vec<String>,
    params: Vec<Value>,
}

impl Update {
    /// Compile an UPDATE.
    ///
    /// # Errors
    ///
    /// `MalformedCriteria` for change-map collisions or criteria errors;
    /// `UnsupportedMultiRelationJoin` for join sources with more than one
    /// root-level join target.
    pub fn new(
        source: Source,
        changes: &Changes,
        criteria: &Criteria,
        options: UpdateOptions,
    ) -> Result<Self> {
        let relation = source.relation().clone();

        if let Some(join) = source.join_source() {
            if join.root_count() > 1 {
                let second = join
                    .members
                    .iter()
                    .filter(|m| m.root)
                    .nth(1)
                    .expect("counted above");
                return Err(Error::UnsupportedMultiRelationJoin(second.alias.clone()));
            }
        }

        for (column, _) in &changes.exprs {
            if changes.fields.iter().any(|(key, _)| key == column) {
                return Err(Error::MalformedCriteria(format!(
                    "The key '{column}' may not be defined in both the change map and the expression map."
                )));
            }
        }

        let generator = if options.document && !statement::is_pk_search(&source, criteria) {
            Generator::Document
        } else {
            Generator::Table
        };

        // join ON constants number first, then changes, then criteria
        let mut params = Vec::new();
        let mut offset = 0;
        if let Some(join) = source.join_source() {
            params.extend(join.params.iter().cloned());
            offset = join.offset;
        }

        let mut change_clauses = Vec::new();
        for (column, value) in &changes.fields {
            if !relation.has_column(column) {
                continue;
            }

            params.push(value.clone());
            offset += 1;
            change_clauses.push(format!("{} = ${offset}", quote_ident(column)));
        }

        for (column, expr) in &changes.exprs {
            change_clauses.push(format!("{} = {expr}", quote_ident(column)));
        }

        if change_clauses.is_empty() {
            return Err(Error::MalformedCriteria(
                "Update requires changes to apply.".to_string(),
            ));
        }

        let conjunction = predicate::predicate(&source, criteria, offset, generator)?;
        params.extend(conjunction.params);

        let returning = if source.is_join() {
            vec![format!("{}.*", source.delimited_name())]
        } else {
            statement::parse_returning(options.fields.as_deref(), &source)?
        };

        Ok(Self {
            source,
            only: options.only,
            single: options.single,
            changes: change_clauses,
            predicate: conjunction.predicate,
            returning,
            params,
        })
    }

    /// The ordered parameter list.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Whether a single affected row is expected.
    pub fn is_single(&self) -> bool {
        self.single
    }

    /// Render the SQL text.
    pub fn format(&self) -> String {
        let mut sql = String::from("UPDATE ");

        if self.only {
            sql.push_str("ONLY ");
        }

        sql.push_str(&self.source.delimited_name());
        sql.push_str(&format!(" SET {}", self.changes.join(", ")));

        match self.source.join_source().filter(|j| !j.members.is_empty()) {
            Some(join) => {
                let first = &join.members[0];

                sql.push_str(&format!(" FROM {}", first.relation_ref));

                for member in &join.members[1..] {
                    sql.push_str(&format!(
                        " {} JOIN {} ON {}",
                        member.kind, member.relation_ref, member.on_sql
                    ));
                }

                sql.push_str(&format!(
                    " WHERE {} AND ({})",
                    first.on_sql, self.predicate
                ));
            }
            None => sql.push_str(&format!(" WHERE {}", self.predicate)),
        }

        sql.push_str(&format!(" RETURNING {}", self.returning.join(", ")));

        tracing::trace!(sql = %sql, "generated UPDATE statement");

        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::JoinSpec;
    use crate::source::TableSource;
    use squill_core::{Registry, Relation};
    use serde_json::json;

    fn registry() -> Registry {
        let registry = Registry::new("public");
        registry.add(
            Relation::new(
                "public",
                "testsource",
                &["id", "field1", "field2", "body"],
            )
            .with_pk(&["id"]),
        );
        registry.add(
            Relation::new("public", "jointable1", &["id", "testsource_id", "val1"])
                .with_pk(&["id"]),
        );
        registry.add(
            Relation::new("public", "jointable2", &["id", "jointable1_id", "val2"])
                .with_pk(&["id"]),
        );
        registry
    }

    fn source() -> Source {
        let registry = registry();
        Source::Table(TableSource::new(
            registry.resolve("testsource").unwrap(),
            "public",
        ))
    }

    fn criteria(json: serde_json::Value) -> Criteria {
        Criteria::from_json(&json).unwrap()
    }

    #[test]
    fn test_basic_update() {
        let result = Update::new(
            source(),
            &Changes::new().set("field1", "value1"),
            &Criteria::empty(),
            UpdateOptions::default(),
        )
        .unwrap();

        assert_eq!(
            result.format(),
            "UPDATE \"testsource\" SET \"field1\" = $1 WHERE TRUE RETURNING *"
        );
        assert_eq!(result.params(), &[Value::Text("value1".into())]);
    }

    #[test]
    fn test_multiple_changes() {
        let result = Update::new(
            source(),
            &Changes::new().set("field1", "value1").set("field2", 2),
            &Criteria::empty(),
            UpdateOptions::default(),
        )
        .unwrap();

        assert_eq!(
            result.format(),
            "UPDATE \"testsource\" SET \"field1\" = $1, \"field2\" = $2 WHERE TRUE RETURNING *"
        );
    }

    #[test]
    fn test_ignores_nonexistent_columns() {
        let result = Update::new(
            source(),
            &Changes::new()
                .set("not_a_field", 0)
                .set("field1", "value1")
                .set("field2", 2),
            &Criteria::empty(),
            UpdateOptions::default(),
        )
        .unwrap();

        assert_eq!(
            result.format(),
            "UPDATE \"testsource\" SET \"field1\" = $1, \"field2\" = $2 WHERE TRUE RETURNING *"
        );
        assert_eq!(
            result.params(),
            &[Value::Text("value1".into()), Value::Int(2)]
        );
    }

    #[test]
    fn test_criteria_number_after_changes() {
        let result = Update::new(
            source(),
            &Changes::new().set("field1", "value1"),
            &criteria(json!({"field1": "value2"})),
            UpdateOptions::default(),
        )
        .unwrap();

        assert_eq!(
            result.format(),
            "UPDATE \"testsource\" SET \"field1\" = $1 WHERE \"field1\" = $2 RETURNING *"
        );
        assert_eq!(
            result.params(),
            &[Value::Text("value1".into()), Value::Text("value2".into())]
        );
    }

    #[test]
    fn test_document_criteria() {
        let result = Update::new(
            source(),
            &Changes::new().set("field1", "value1"),
            &criteria(json!({"thing": 1})),
            UpdateOptions {
                document: true,
                ..UpdateOptions::default()
            },
        )
        .unwrap();

        assert_eq!(
            result.format(),
            "UPDATE \"testsource\" SET \"field1\" = $1 WHERE \"body\" @> $2 RETURNING *"
        );
    }

    #[test]
    fn test_pk_search_forestalls_the_document_generator() {
        let result = Update::new(
            source(),
            &Changes::new().set("field1", "value1"),
            &criteria(json!({"id": 1})),
            UpdateOptions {
                document: true,
                ..UpdateOptions::default()
            },
        )
        .unwrap();

        assert_eq!(
            result.format(),
            "UPDATE \"testsource\" SET \"field1\" = $1 WHERE \"id\" = $2 RETURNING *"
        );
    }

    #[test]
    fn test_only() {
        let result = Update::new(
            source(),
            &Changes::new().set("field1", "value1"),
            &Criteria::empty(),
            UpdateOptions {
                only: true,
                ..UpdateOptions::default()
            },
        )
        .unwrap();

        assert_eq!(
            result.format(),
            "UPDATE ONLY \"testsource\" SET \"field1\" = $1 WHERE TRUE RETURNING *"
        );
    }

    #[test]
    fn test_restricts_returned_fields() {
        let result = Update::new(
            source(),
            &Changes::new().set("field1", "value1"),
            &criteria(json!({"field1": "value2"})),
            UpdateOptions {
                fields: Some(vec!["field1".into(), "field2".into()]),
                ..UpdateOptions::default()
            },
        )
        .unwrap();

        assert_eq!(
            result.format(),
            "UPDATE \"testsource\" SET \"field1\" = $1 WHERE \"field1\" = $2 RETURNING \"field1\", \"field2\""
        );
    }

    #[test]
    fn test_raw_expression_changes() {
        let result = Update::new(
            source(),
            &Changes::new().set_expr("field1", "\"field1\" + 1"),
            &Criteria::empty(),
            UpdateOptions::default(),
        )
        .unwrap();

        assert_eq!(
            result.format(),
            "UPDATE \"testsource\" SET \"field1\" = \"field1\" + 1 WHERE TRUE RETURNING *"
        );
    }

    #[test]
    fn test_change_map_collisions() {
        let err = Update::new(
            source(),
            &Changes::new()
                .set("field1", "value")
                .set_expr("field1", "\"field1\" + 1"),
            &Criteria::empty(),
            UpdateOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(err, Error::MalformedCriteria(_)));
    }

    #[test]
    fn test_join_update() {
        let registry = registry();
        let spec = JoinSpec::from_json(&json!({
            "jointable1": {
                "type": "INNER",
                "on": {"testsource_id": "id"},
                "jointable2": {"on": {"jointable1_id": "jointable1.id"}}
            }
        }))
        .unwrap();
        let source = Source::join(&registry, "testsource", &spec).unwrap();

        let result = Update::new(
            source,
            &Changes::new().set("field1", "changed"),
            &criteria(json!({"jointable2.id": 3})),
            UpdateOptions::default(),
        )
        .unwrap();

        assert_eq!(
            result.format(),
            concat!(
                "UPDATE \"testsource\" SET \"field1\" = $1",
                " FROM \"jointable1\"",
                " INNER JOIN \"jointable2\" ON \"jointable2\".\"jointable1_id\" = \"jointable1\".\"id\"",
                " WHERE \"jointable1\".\"testsource_id\" = \"testsource\".\"id\" AND (\"jointable2\".\"id\" = $2)",
                " RETURNING \"testsource\".*"
            )
        );
        assert_eq!(
            result.params(),
            &[Value::Text("changed".into()), Value::Int(3)]
        );
    }

    #[test]
    fn test_join_update_rejects_multiple_root_targets() {
        let registry = registry();
        let spec = JoinSpec::from_json(&json!({
            "jointable1": {"on": {"testsource_id": "id"}},
            "jointable2": {"on": {"jointable1_id": "jointable1.id"}}
        }))
        .unwrap();
        let source = Source::join(&registry, "testsource", &spec).unwrap();

        let err = Update::new(
            source,
            &Changes::new().set("field1", "changed"),
            &Criteria::empty(),
            UpdateOptions::default(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            Error::UnsupportedMultiRelationJoin("jointable2".to_string())
        );
    }
}

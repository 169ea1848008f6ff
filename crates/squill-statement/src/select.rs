//! SELECT statements.

use std::collections::HashSet;

use squill_core::{Criteria, Error, Result, Value, quote_ident};

use crate::decompose::DecomposeSchema;
use crate::order_by::{self, SortCriterion, SortDirection};
use crate::parse_key;
use crate::predicate::{self, Generator};
use crate::source::Source;
use crate::statement;

/// Row locking strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStrength {
    /// `FOR UPDATE`
    Update,
    /// `FOR NO KEY UPDATE`
    NoKeyUpdate,
    /// `FOR SHARE`
    Share,
    /// `FOR KEY SHARE`
    KeyShare,
}

impl LockStrength {
    const fn as_str(self) -> &'static str {
        match self {
            LockStrength::Update => "UPDATE",
            LockStrength::NoKeyUpdate => "NO KEY UPDATE",
            LockStrength::Share => "SHARE",
            LockStrength::KeyShare => "KEY SHARE",
        }
    }
}

/// Behavior when a locked row is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockedRows {
    /// `NOWAIT`
    NoWait,
    /// `SKIP LOCKED`
    SkipLocked,
}

impl LockedRows {
    const fn as_str(self) -> &'static str {
        match self {
            LockedRows::NoWait => "NOWAIT",
            LockedRows::SkipLocked => "SKIP LOCKED",
        }
    }
}

/// An explicit row lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lock {
    /// Lock strength.
    pub strength: LockStrength,
    /// Optional locked-rows behavior.
    pub locked_rows: Option<LockedRows>,
}

impl Lock {
    /// Lock with the given strength and default row behavior.
    pub fn new(strength: LockStrength) -> Self {
        Self {
            strength,
            locked_rows: None,
        }
    }

    /// Set the locked-rows behavior.
    #[must_use]
    pub fn locked_rows(mut self, locked_rows: LockedRows) -> Self {
        self.locked_rows = Some(locked_rows);
        self
    }
}

/// SELECT options.
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    /// Emit `ONLY`, excluding subtable rows.
    pub only: bool,
    /// Emit `DISTINCT`.
    pub distinct: bool,
    /// Treat the relation as a document store.
    pub document: bool,
    /// Expect a single result; forces `LIMIT 1`.
    pub single: bool,
    /// Restrict projected fields.
    pub fields: Option<Vec<String>>,
    /// Add raw projected expressions as `(alias, expression)` pairs. The
    /// expression text is caller-trusted and emitted verbatim.
    pub exprs: Option<Vec<(String, String)>>,
    /// Sort criteria.
    pub order: Option<Vec<SortCriterion>>,
    /// Route order fields through the document body.
    pub order_body: bool,
    /// Row offset.
    pub offset: Option<u64>,
    /// Row limit.
    pub limit: Option<u64>,
    /// Keyset pagination page size; requires `order`, conflicts with
    /// `offset`/`limit`.
    pub page_length: Option<u64>,
    /// Explicit row lock.
    pub lock: Option<Lock>,
    /// Legacy `FOR UPDATE` flag.
    pub for_update: bool,
    /// Legacy `FOR SHARE` flag.
    pub for_share: bool,
    /// Override the generated decomposition schema.
    pub decompose: Option<DecomposeSchema>,
}

/// A compiled SELECT statement.
#[derive(Debug)]
pub struct Select {
    source: Source,
    select_list: Vec<String>,
    only: bool,
    distinct: bool,
    single: bool,
    predicate: String,
    order: String,
    pagination: Option<String>,
    page_length: Option<u64>,
    offset_rows: Option<u64>,
    limit: Option<u64>,
    lock: Option<Lock>,
    params: Vec<Value>,
    decompose: Option<DecomposeSchema>,
}

impl Select {
    /// Compile a SELECT. All validation happens here; [`Select::format`]
    /// only renders.
    ///
    /// # Errors
    ///
    /// Criteria compilation errors, plus `ConflictingOptions`,
    /// `MissingOrderForPagination`, and `MalformedCriteria` for option
    /// misuse.
    pub fn new(source: Source, criteria: &Criteria, options: SelectOptions) -> Result<Self> {
        let lock = normalize_lock(&options)?;

        let generator = if options.document && !statement::is_pk_search(&source, criteria) {
            Generator::Document
        } else {
            Generator::Table
        };

        let select_list = build_select_list(&source, &options)?;

        // Join ON constants occupy the first placeholders; the predicate
        // and pagination number after them.
        let mut params = Vec::new();
        let mut offset = 0;
        if let Some(join) = source.join_source() {
            params.extend(join.params.iter().cloned());
            offset = join.offset;
        }

        let conjunction = predicate::predicate(&source, criteria, offset, generator)?;
        params.extend(conjunction.params);

        let order_criteria = options.order.as_deref().unwrap_or(&[]);
        let order = order_by::order_by(order_criteria, &source, options.order_body)?;

        let mut pagination = None;
        if options.page_length.is_some() {
            if order_criteria.is_empty() {
                return Err(Error::MissingOrderForPagination);
            }

            if options.offset.is_some() || options.limit.is_some() {
                return Err(Error::ConflictingOptions(
                    "Keyset paging cannot be used with offset and limit".to_string(),
                ));
            }

            if order_criteria[0].last.is_some() {
                let attributes = order_criteria
                    .iter()
                    .map(|criterion| order_by::full_attribute(criterion, &source, false))
                    .collect::<Result<Vec<_>>>()?
                    .join(",");

                let lasts = order_criteria
                    .iter()
                    .map(|criterion| {
                        criterion.last.clone().ok_or_else(|| {
                            Error::MalformedCriteria(
                                "Every order criterion must carry a last value for keyset paging."
                                    .to_string(),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                let placeholders = (0..lasts.len())
                    .map(|i| format!("${}", params.len() + i + 1))
                    .collect::<Vec<_>>()
                    .join(",");

                let comparison =
                    if order_criteria[0].direction == Some(SortDirection::Desc) {
                        "<"
                    } else {
                        ">"
                    };

                pagination = Some(format!("({attributes}) {comparison} ({placeholders})"));
                params.extend(lasts);
            }
        }

        let decompose = build_decompose(&source, &options);

        Ok(Self {
            source,
            select_list,
            only: options.only,
            distinct: options.distinct,
            single: options.single,
            predicate: conjunction.predicate,
            order,
            pagination,
            page_length: options.page_length,
            offset_rows: options.offset,
            limit: options.limit,
            lock,
            params,
            decompose,
        })
    }

    /// The ordered parameter list.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// The decomposition schema for joined or overridden reads.
    pub fn decompose_schema(&self) -> Option<&DecomposeSchema> {
        self.decompose.as_ref()
    }

    /// Render the SQL text.
    pub fn format(&self) -> String {
        let mut sql = String::from("SELECT ");

        if self.distinct {
            sql.push_str("DISTINCT ");
        }

        sql.push_str(&self.select_list.join(","));
        sql.push_str(" FROM ");

        if self.only {
            sql.push_str("ONLY ");
        }

        sql.push_str(&self.source.delimited_name());

        if let Some(join) = self.source.join_source() {
            for member in &join.members {
                sql.push_str(&format!(
                    " {} JOIN {} ON {}",
                    member.kind, member.relation_ref, member.on_sql
                ));
            }
        }

        sql.push_str(&format!(" WHERE {}", self.predicate));

        if let Some(pagination) = &self.pagination {
            sql.push_str(&format!(" AND {pagination}"));
        }

        if !self.order.is_empty() {
            sql.push(' ');
            sql.push_str(&self.order);
        }

        if let Some(lock) = &self.lock {
            sql.push_str(&format!(" FOR {}", lock.strength.as_str()));
            if let Some(locked_rows) = lock.locked_rows {
                sql.push_str(&format!(" {}", locked_rows.as_str()));
            }
        }

        if let Some(page_length) = self.page_length {
            sql.push_str(&format!(" FETCH FIRST {page_length} ROWS ONLY"));
        }

        if let Some(offset) = self.offset_rows {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        if self.single {
            sql.push_str(" LIMIT 1");
        } else if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        tracing::trace!(sql = %sql, "generated SELECT statement");

        sql
    }
}

fn normalize_lock(options: &SelectOptions) -> Result<Option<Lock>> {
    let specified = usize::from(options.for_update)
        + usize::from(options.for_share)
        + usize::from(options.lock.is_some());

    if specified > 1 {
        return Err(Error::ConflictingOptions(
            "The \"for_update\", \"for_share\" and \"lock\" options are mutually exclusive"
                .to_string(),
        ));
    }

    if options.for_update {
        Ok(Some(Lock::new(LockStrength::Update)))
    } else if options.for_share {
        Ok(Some(Lock::new(LockStrength::Share)))
    } else {
        Ok(options.lock)
    }
}

fn build_select_list(source: &Source, options: &SelectOptions) -> Result<Vec<String>> {
    let mut list = Vec::new();

    if let Some(fields) = &options.fields {
        for field in fields {
            if options.document {
                // document fields alias back to their logical names
                let condition = parse_key::parse(&format!("body.{field}"), source, true)?;
                list.push(format!("{} AS {}", condition.lhs, quote_ident(field)));
            } else {
                list.push(parse_key::parse(field, source, true)?.lhs);
            }
        }
    }

    if let Some(exprs) = &options.exprs {
        for (alias, expr) in exprs {
            list.push(format!("{expr} AS {}", quote_ident(alias)));
        }
    }

    if list.is_empty() {
        if options.fields.is_none() && options.exprs.is_none() {
            return Ok(match source.join_source() {
                Some(join) => join.select_list(),
                None => vec!["*".to_string()],
            });
        }

        return Err(Error::MalformedCriteria(
            "At least one of fields or exprs, if supplied, must define a field or expression to select."
                .to_string(),
        ));
    }

    if options.document {
        // document queries always need the id to address records
        list.insert(0, quote_ident("id"));
    }

    Ok(list)
}

fn build_decompose(source: &Source, options: &SelectOptions) -> Option<DecomposeSchema> {
    if let Some(decompose) = &options.decompose {
        return Some(decompose.clone());
    }

    let join = source.join_source()?;
    let mut schema = join.decompose.clone();

    // restricted expression projections narrow the schema to what the
    // statement actually returns
    if options.fields.is_none() {
        if let Some(exprs) = &options.exprs {
            let aliases: HashSet<&str> = exprs.iter().map(|(alias, _)| alias.as_str()).collect();
            filter_schema(&mut schema, &aliases);
        }
    }

    Some(schema)
}

fn filter_schema(schema: &mut DecomposeSchema, aliases: &HashSet<&str>) {
    let pk = schema.pk.clone();
    schema
        .columns
        .retain(|(flat, _)| aliases.contains(flat.as_str()) || pk.contains(flat));

    for (_, child) in &mut schema.children {
        filter_schema(child, aliases);
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
                "mytable",
                &["id", "field", "col1", "col2", "body", "timestamp", "timestamptz", "date"],
            )
            .with_pk(&["id"])
            .with_column_type("timestamp", "timestamp without time zone")
            .with_column_type("timestamptz", "timestamp with time zone")
            .with_column_type("date", "date"),
        );
        registry.add(
            Relation::new("public", "jointable1", &["id", "mytable_id", "val1"]).with_pk(&["id"]),
        );
        registry.add(
            Relation::new("public", "jointable2", &["id", "jointable1_id", "val2"])
                .with_pk(&["id"]),
        );
        registry.add(
            Relation::new("myschema", "jointable3", &["id", "mytable_id", "val3"])
                .with_pk(&["id"]),
        );
        registry
    }

    fn table_source() -> Source {
        let registry = registry();
        Source::Table(TableSource::new(
            registry.resolve("mytable").unwrap(),
            "public",
        ))
    }

    fn empty() -> Criteria {
        Criteria::empty()
    }

    fn select(options: SelectOptions) -> Select {
        Select::new(table_source(), &empty(), options).unwrap()
    }

    #[test]
    fn test_basic_select() {
        let result = select(SelectOptions::default());
        assert_eq!(result.format(), "SELECT * FROM \"mytable\" WHERE TRUE");
        assert!(result.params().is_empty());
    }

    #[test]
    fn test_criteria() {
        let criteria = Criteria::from_json(&json!({"field": "val"})).unwrap();
        let result = Select::new(table_source(), &criteria, SelectOptions::default()).unwrap();
        assert_eq!(
            result.format(),
            "SELECT * FROM \"mytable\" WHERE \"field\" = $1"
        );
        assert_eq!(result.params(), &[Value::Text("val".into())]);
    }

    #[test]
    fn test_field_lists() {
        let result = select(SelectOptions {
            fields: Some(vec!["col1".into(), "col2".into()]),
            ..SelectOptions::default()
        });
        assert_eq!(
            result.format(),
            "SELECT \"col1\",\"col2\" FROM \"mytable\" WHERE TRUE"
        );
    }

    #[test]
    fn test_json_fields() {
        let result = select(SelectOptions {
            fields: Some(vec![
                "field.element".into(),
                "field.array[0]".into(),
                "field.array[1].nested[2].element".into(),
            ]),
            ..SelectOptions::default()
        });
        assert_eq!(
            result.format(),
            "SELECT \"field\"->>'element',\"field\"#>>'{array,0}',\"field\"#>>'{array,1,nested,2,element}' FROM \"mytable\" WHERE TRUE"
        );
    }

    #[test]
    fn test_document_fields_add_id_and_aliases() {
        let result = select(SelectOptions {
            document: true,
            fields: Some(vec!["one".into(), "two".into()]),
            ..SelectOptions::default()
        });
        assert_eq!(
            result.format(),
            "SELECT \"id\",\"body\"->>'one' AS \"one\",\"body\"->>'two' AS \"two\" FROM \"mytable\" WHERE TRUE"
        );
    }

    #[test]
    fn test_exprs() {
        let result = select(SelectOptions {
            exprs: Some(vec![
                ("colsum".into(), "col1 + col2".into()),
                ("coldiff".into(), "col1 - col2".into()),
            ]),
            ..SelectOptions::default()
        });
        assert_eq!(
            result.format(),
            "SELECT col1 + col2 AS \"colsum\",col1 - col2 AS \"coldiff\" FROM \"mytable\" WHERE TRUE"
        );
    }

    #[test]
    fn test_empty_projection_errors() {
        let err = Select::new(
            table_source(),
            &empty(),
            SelectOptions {
                fields: Some(vec![]),
                exprs: Some(vec![]),
                ..SelectOptions::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedCriteria(_)));

        let err = Select::new(
            table_source(),
            &empty(),
            SelectOptions {
                fields: Some(vec![]),
                ..SelectOptions::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedCriteria(_)));
    }

    #[test]
    fn test_distinct_and_only() {
        let result = select(SelectOptions {
            distinct: true,
            ..SelectOptions::default()
        });
        assert_eq!(result.format(), "SELECT DISTINCT * FROM \"mytable\" WHERE TRUE");

        let result = select(SelectOptions {
            only: true,
            ..SelectOptions::default()
        });
        assert_eq!(result.format(), "SELECT * FROM ONLY \"mytable\" WHERE TRUE");
    }

    #[test]
    fn test_locks() {
        let result = select(SelectOptions {
            for_update: true,
            ..SelectOptions::default()
        });
        assert_eq!(result.format(), "SELECT * FROM \"mytable\" WHERE TRUE FOR UPDATE");

        let result = select(SelectOptions {
            for_share: true,
            ..SelectOptions::default()
        });
        assert_eq!(result.format(), "SELECT * FROM \"mytable\" WHERE TRUE FOR SHARE");

        let result = select(SelectOptions {
            lock: Some(Lock::new(LockStrength::NoKeyUpdate)),
            ..SelectOptions::default()
        });
        assert_eq!(
            result.format(),
            "SELECT * FROM \"mytable\" WHERE TRUE FOR NO KEY UPDATE"
        );

        let result = select(SelectOptions {
            lock: Some(Lock::new(LockStrength::Update).locked_rows(LockedRows::SkipLocked)),
            ..SelectOptions::default()
        });
        assert_eq!(
            result.format(),
            "SELECT * FROM \"mytable\" WHERE TRUE FOR UPDATE SKIP LOCKED"
        );
    }

    #[test]
    fn test_conflicting_lock_options() {
        let err = Select::new(
            table_source(),
            &empty(),
            SelectOptions {
                for_update: true,
                lock: Some(Lock::new(LockStrength::Share)),
                ..SelectOptions::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::ConflictingOptions(_)));
    }

    #[test]
    fn test_lock_precedes_limit() {
        let result = select(SelectOptions {
            for_update: true,
            limit: Some(1),
            ..SelectOptions::default()
        });
        assert_eq!(
            result.format(),
            "SELECT * FROM \"mytable\" WHERE TRUE FOR UPDATE LIMIT 1"
        );
    }

    #[test]
    fn test_offset_and_limit() {
        let result = select(SelectOptions {
            offset: Some(10),
            limit: Some(10),
            ..SelectOptions::default()
        });
        assert_eq!(
            result.format(),
            "SELECT * FROM \"mytable\" WHERE TRUE OFFSET 10 LIMIT 10"
        );
    }

    #[test]
    fn test_single_overrides_limit() {
        let result = select(SelectOptions {
            single: true,
            limit: Some(10),
            ..SelectOptions::default()
        });
        assert_eq!(result.format(), "SELECT * FROM \"mytable\" WHERE TRUE LIMIT 1");
    }

    #[test]
    fn test_keyset_pagination() {
        let result = select(SelectOptions {
            page_length: Some(10),
            order: Some(vec![
                SortCriterion::field("col1").last(123),
                SortCriterion::field("col2").last(456),
            ]),
            ..SelectOptions::default()
        });

        assert_eq!(
            result.format(),
            "SELECT * FROM \"mytable\" WHERE TRUE AND (\"col1\",\"col2\") > ($1,$2) ORDER BY \"col1\" ASC,\"col2\" ASC FETCH FIRST 10 ROWS ONLY"
        );
        assert_eq!(result.params(), &[Value::Int(123), Value::Int(456)]);
    }

    #[test]
    fn test_keyset_pagination_reverses_for_descending_order() {
        let result = select(SelectOptions {
            page_length: Some(10),
            order: Some(vec![
                SortCriterion::field("col1").desc().last(123),
                SortCriterion::field("col2").asc().last(456),
            ]),
            ..SelectOptions::default()
        });

        assert_eq!(
            result.format(),
            "SELECT * FROM \"mytable\" WHERE TRUE AND (\"col1\",\"col2\") < ($1,$2) ORDER BY \"col1\" DESC,\"col2\" ASC FETCH FIRST 10 ROWS ONLY"
        );
    }

    #[test]
    fn test_keyset_pagination_starts_from_the_beginning() {
        let result = select(SelectOptions {
            page_length: Some(10),
            order: Some(vec![
                SortCriterion::field("col1"),
                SortCriterion::field("col2"),
            ]),
            ..SelectOptions::default()
        });

        assert_eq!(
            result.format(),
            "SELECT * FROM \"mytable\" WHERE TRUE ORDER BY \"col1\" ASC,\"col2\" ASC FETCH FIRST 10 ROWS ONLY"
        );
        assert!(result.params().is_empty());
    }

    #[test]
    fn test_keyset_pagination_with_prebuilt_predicates() {
        let criteria = Criteria::from_json(&json!({
            "conditions": "col2 = $1",
            "params": [1]
        }))
        .unwrap();

        let result = Select::new(
            table_source(),
            &criteria,
            SelectOptions {
                page_length: Some(10),
                order: Some(vec![SortCriterion::field("col1").last(5)]),
                ..SelectOptions::default()
            },
        )
        .unwrap();

        assert_eq!(
            result.format(),
            "SELECT * FROM \"mytable\" WHERE col2 = $1 AND (\"col1\") > ($2) ORDER BY \"col1\" ASC FETCH FIRST 10 ROWS ONLY"
        );
        assert_eq!(result.params(), &[Value::Int(1), Value::Int(5)]);
    }

    #[test]
    fn test_keyset_pagination_applies_cast_types() {
        let criteria = Criteria::from_json(&json!({"col2": "value2"})).unwrap();
        let result = Select::new(
            table_source(),
            &criteria,
            SelectOptions {
                page_length: Some(10),
                order: Some(vec![SortCriterion::field("col1").cast("int").last(5)]),
                ..SelectOptions::default()
            },
        )
        .unwrap();

        assert_eq!(
            result.format(),
            "SELECT * FROM \"mytable\" WHERE \"col2\" = $1 AND ((\"col1\")::int) > ($2) ORDER BY (\"col1\")::int ASC FETCH FIRST 10 ROWS ONLY"
        );
    }

    #[test]
    fn test_keyset_pagination_in_document_mode() {
        let criteria = Criteria::from_json(&json!({"col2": "value2"})).unwrap();
        let result = Select::new(
            table_source(),
            &criteria,
            SelectOptions {
                document: true,
                page_length: Some(10),
                order: Some(vec![SortCriterion::field("col1").cast("int").last(5)]),
                ..SelectOptions::default()
            },
        )
        .unwrap();

        assert_eq!(
            result.format(),
            "SELECT * FROM \"mytable\" WHERE \"body\" @> $1 AND ((\"col1\")::int) > ($2) ORDER BY (\"col1\")::int ASC FETCH FIRST 10 ROWS ONLY"
        );
        assert_eq!(
            result.params()[0],
            Value::Text("{\"col2\":\"value2\"}".into())
        );
    }

    #[test]
    fn test_keyset_pagination_requires_an_order() {
        let err = Select::new(
            table_source(),
            &empty(),
            SelectOptions {
                page_length: Some(10),
                ..SelectOptions::default()
            },
        )
        .unwrap_err();
        assert_eq!(err, Error::MissingOrderForPagination);
    }

    #[test]
    fn test_keyset_pagination_conflicts_with_offset_and_limit() {
        for options in [
            SelectOptions {
                page_length: Some(10),
                order: Some(vec![SortCriterion::field("col1")]),
                offset: Some(10),
                ..SelectOptions::default()
            },
            SelectOptions {
                page_length: Some(10),
                order: Some(vec![SortCriterion::field("col1")]),
                limit: Some(10),
                ..SelectOptions::default()
            },
        ] {
            let err = Select::new(table_source(), &empty(), options).unwrap_err();
            assert_eq!(
                err,
                Error::ConflictingOptions(
                    "Keyset paging cannot be used with offset and limit".to_string()
                )
            );
        }
    }

    #[test]
    fn test_assembles_join_clauses() {
        let registry = registry();
        let spec = JoinSpec::from_json(&json!({
            "jointable1": {
                "type": "INNER",
                "on": {"mytable_id": "id"},
                "jt2": {
                    "type": "INNER",
                    "relation": "jointable2",
                    "on": {"jointable1_id": "jointable1.id"}
                }
            },
            "myschema.jointable3": {"type": "LEFT OUTER", "on": {"mytable_id": "id"}}
        }))
        .unwrap();
        let source = Source::join(&registry, "mytable", &spec).unwrap();

        let result = Select::new(source, &empty(), SelectOptions::default()).unwrap();

        assert_eq!(
            result.format(),
            concat!(
                "SELECT \"mytable\".\"id\" AS \"mytable__id\",",
                "\"mytable\".\"field\" AS \"mytable__field\",",
                "\"mytable\".\"col1\" AS \"mytable__col1\",",
                "\"mytable\".\"col2\" AS \"mytable__col2\",",
                "\"mytable\".\"body\" AS \"mytable__body\",",
                "\"mytable\".\"timestamp\" AS \"mytable__timestamp\",",
                "\"mytable\".\"timestamptz\" AS \"mytable__timestamptz\",",
                "\"mytable\".\"date\" AS \"mytable__date\",",
                "\"jointable1\".\"id\" AS \"jointable1__id\",",
                "\"jointable1\".\"mytable_id\" AS \"jointable1__mytable_id\",",
                "\"jointable1\".\"val1\" AS \"jointable1__val1\",",
                "\"jt2\".\"id\" AS \"jt2__id\",",
                "\"jt2\".\"jointable1_id\" AS \"jt2__jointable1_id\",",
                "\"jt2\".\"val2\" AS \"jt2__val2\",",
                "\"jointable3\".\"id\" AS \"jointable3__id\",",
                "\"jointable3\".\"mytable_id\" AS \"jointable3__mytable_id\",",
                "\"jointable3\".\"val3\" AS \"jointable3__val3\"",
                " FROM \"mytable\"",
                " INNER JOIN \"jointable1\" ON \"jointable1\".\"mytable_id\" = \"mytable\".\"id\"",
                " INNER JOIN \"jointable2\" AS \"jt2\" ON \"jt2\".\"jointable1_id\" = \"jointable1\".\"id\"",
                " LEFT OUTER JOIN \"myschema\".\"jointable3\" AS \"jointable3\" ON \"jointable3\".\"mytable_id\" = \"mytable\".\"id\"",
                " WHERE TRUE"
            )
        );
    }

    #[test]
    fn test_join_criteria_default_to_the_origin() {
        let registry = registry();
        let spec =
            JoinSpec::from_json(&json!({"jointable1": {"on": {"mytable_id": "id"}}})).unwrap();
        let source = Source::join(&registry, "mytable", &spec).unwrap();

        let criteria = Criteria::from_json(&json!({"id": 3})).unwrap();
        let result = Select::new(source, &criteria, SelectOptions::default()).unwrap();

        assert!(result.format().ends_with("WHERE \"mytable\".\"id\" = $1"));
        assert_eq!(result.params(), &[Value::Int(3)]);
    }

    #[test]
    fn test_join_decompose_schema_present() {
        let registry = registry();
        let spec =
            JoinSpec::from_json(&json!({"jointable1": {"on": {"mytable_id": "id"}}})).unwrap();
        let source = Source::join(&registry, "mytable", &spec).unwrap();

        let result = Select::new(source, &empty(), SelectOptions::default()).unwrap();
        let schema = result.decompose_schema().unwrap();
        assert_eq!(schema.pk, vec!["mytable__id"]);
    }

    #[test]
    fn test_exprs_narrow_the_decompose_schema() {
        let registry = registry();
        let spec =
            JoinSpec::from_json(&json!({"jointable1": {"on": {"mytable_id": "id"}}})).unwrap();
        let source = Source::join(&registry, "mytable", &spec).unwrap();

        let result = Select::new(
            source,
            &empty(),
            SelectOptions {
                exprs: Some(vec![
                    ("mytable__id".into(), "\"mytable\".\"id\"".into()),
                    ("jointable1__id".into(), "\"jointable1\".\"id\"".into()),
                ]),
                ..SelectOptions::default()
            },
        )
        .unwrap();

        let schema = result.decompose_schema().unwrap();
        assert_eq!(schema.columns, vec![("mytable__id".into(), "id".into())]);
        assert_eq!(
            schema.children[0].1.columns,
            vec![("jointable1__id".into(), "id".into())]
        );
    }

    #[test]
    fn test_date_criteria_cast_by_column_type() {
        let criteria = Criteria::Where(vec![
            squill_core::CriteriaNode::Leaf {
                key: "date".into(),
                value: Value::Timestamp("2025-02-03".into()),
            },
            squill_core::CriteriaNode::Leaf {
                key: "timestamp".into(),
                value: Value::Timestamp("2025-02-03 04:05:06".into()),
            },
            squill_core::CriteriaNode::Leaf {
                key: "timestamptz".into(),
                value: Value::Timestamp("2025-02-03 04:05:06+00".into()),
            },
        ]);

        let result = Select::new(table_source(), &criteria, SelectOptions::default()).unwrap();
        assert_eq!(
            result.format(),
            "SELECT * FROM \"mytable\" WHERE \"date\" = $1::date AND \"timestamp\" = $2::timestamp AND \"timestamptz\" = $3::timestamptz"
        );
    }

    #[test]
    fn test_document_pk_search_forestalls_the_document_generator() {
        let criteria = Criteria::from_json(&json!({"id": 1})).unwrap();
        let result = Select::new(
            table_source(),
            &criteria,
            SelectOptions {
                document: true,
                ..SelectOptions::default()
            },
        )
        .unwrap();

        assert_eq!(
            result.format(),
            "SELECT * FROM \"mytable\" WHERE \"id\" = $1"
        );
    }
}

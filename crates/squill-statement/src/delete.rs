//! DELETE statements.
//!
//! Join-aware deletes mirror UPDATE: the first join becomes the `USING`
//! relation with its ON predicate ANDed into the WHERE clause, deeper joins
//! chain as `JOIN … ON …`, and only the origin's rows are deleted and
//! returned.

use squill_core::{Criteria, Error, Result, Value};

use crate::predicate::{self, Generator};
use crate::source::Source;
use crate::statement;

/// DELETE options.
#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    /// Emit `ONLY`, excluding subtable rows.
    pub only: bool,
    /// Compile criteria in document mode.
    pub document: bool,
    /// Expect a single affected row (execution hint; no SQL effect).
    pub single: bool,
    /// Restrict the RETURNING list.
    pub fields: Option<Vec<String>>,
}

/// A compiled DELETE statement.
#[derive(Debug)]
pub struct Delete {
    source: Source,
    only: bool,
    single: bool,
    predicate: String,
    returning: Vec<String>,
    params: Vec<Value>,
}

impl Delete {
    /// Compile a DELETE.
    ///
    /// # Errors
    ///
    /// Criteria compilation errors; `UnsupportedMultiRelationJoin` for join
    /// sources with more than one root-level join target.
    pub fn new(source: Source, criteria: &Criteria, options: DeleteOptions) -> Result<Self> {
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

        let generator = if options.document && !statement::is_pk_search(&source, criteria) {
            Generator::Document
        } else {
            Generator::Table
        };

        let mut params = Vec::new();
        let mut offset = 0;
        if let Some(join) = source.join_source() {
            params.extend(join.params.iter().cloned());
            offset = join.offset;
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
        let mut sql = String::from("DELETE FROM ");

        if self.only {
            sql.push_str("ONLY ");
        }

        sql.push_str(&self.source.delimited_name());

        match self.source.join_source().filter(|j| !j.members.is_empty()) {
            Some(join) => {
                let first = &join.members[0];

                sql.push_str(&format!(" USING {}", first.relation_ref));

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

        tracing::trace!(sql = %sql, "generated DELETE statement");

        sql
    }
}

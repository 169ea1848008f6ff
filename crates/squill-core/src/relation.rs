//! Relation descriptors.
//!
//! A `Relation` describes one addressable table or view: its columns, its
//! primary key, declared column types (used only for date/time literal
//! casting), and its foreign keys (used only for implicit join-key
//! discovery). Descriptors are immutable once loaded; the registry owns
//! them and the compiler only reads.

use std::collections::HashMap;

use crate::identifiers::quote_ident;

/// One addressable table, view, or materialized view.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    /// Schema the relation lives in.
    pub schema: String,
    /// Relation name.
    pub name: String,
    /// Column names, in declaration order.
    pub columns: Vec<String>,
    /// Primary key column names. Empty for relations without a key (views),
    /// which disables pk searches and requires explicit join pks.
    pub pk: Vec<String>,
    /// Declared column types, where known.
    pub column_types: HashMap<String, String>,
    /// Foreign keys originating from this relation.
    pub foreign_keys: Vec<ForeignKey>,
}

/// A foreign-key constraint, as reported by the schema registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Constraint name.
    pub constraint: String,
    /// Referencing columns on the owning relation.
    pub columns: Vec<String>,
    /// Schema of the referenced relation.
    pub referenced_schema: String,
    /// Name of the referenced relation.
    pub referenced_relation: String,
    /// Referenced columns, positionally matched with `columns`.
    pub referenced_columns: Vec<String>,
}

impl Relation {
    /// Create a relation descriptor with no pk, types, or foreign keys.
    pub fn new(schema: impl Into<String>, name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: columns.iter().map(|&c| c.to_string()).collect(),
            pk: Vec::new(),
            column_types: HashMap::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Set the primary key columns.
    #[must_use]
    pub fn with_pk(mut self, pk: &[&str]) -> Self {
        self.pk = pk.iter().map(|&c| c.to_string()).collect();
        self
    }

    /// Declare a column's type. Only date/time types influence compilation.
    #[must_use]
    pub fn with_column_type(mut self, column: &str, declared: &str) -> Self {
        self.column_types
            .insert(column.to_string(), declared.to_string());
        self
    }

    /// Attach a foreign key.
    #[must_use]
    pub fn with_foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// The schema-qualified name, e.g. `myschema.mytable`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// The delimited SQL reference: `"mytable"` when the relation lives in
    /// the connection's current schema, `"myschema"."mytable"` otherwise.
    pub fn delimited_name(&self, current_schema: &str) -> String {
        if self.schema == current_schema {
            quote_ident(&self.name)
        } else {
            format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
        }
    }

    /// Whether `column` is one of this relation's columns.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// The declared type of `column`, if known.
    pub fn column_type(&self, column: &str) -> Option<&str> {
        self.column_types.get(column).map(String::as_str)
    }
}

impl ForeignKey {
    /// Create a foreign key constraint description.
    pub fn new(
        constraint: impl Into<String>,
        columns: &[&str],
        referenced_schema: impl Into<String>,
        referenced_relation: impl Into<String>,
        referenced_columns: &[&str],
    ) -> Self {
        Self {
            constraint: constraint.into(),
            columns: columns.iter().map(|&c| c.to_string()).collect(),
            referenced_schema: referenced_schema.into(),
            referenced_relation: referenced_relation.into(),
            referenced_columns: referenced_columns.iter().map(|&c| c.to_string()).collect(),
        }
    }

    /// Whether this key references the given relation.
    pub fn references(&self, relation: &Relation) -> bool {
        self.referenced_schema == relation.schema && self.referenced_relation == relation.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimited_name_current_schema() {
        let rel = Relation::new("public", "mytable", &["id"]);
        assert_eq!(rel.delimited_name("public"), "\"mytable\"");
    }

    #[test]
    fn test_delimited_name_other_schema() {
        let rel = Relation::new("myschema", "jointable3", &["id"]);
        assert_eq!(rel.delimited_name("public"), "\"myschema\".\"jointable3\"");
    }

    #[test]
    fn test_column_lookup() {
        let rel = Relation::new("public", "t", &["id", "val"])
            .with_pk(&["id"])
            .with_column_type("created_at", "timestamp with time zone");

        assert!(rel.has_column("val"));
        assert!(!rel.has_column("nope"));
        assert_eq!(
            rel.column_type("created_at"),
            Some("timestamp with time zone")
        );
        assert_eq!(rel.column_type("id"), None);
    }

    #[test]
    fn test_fk_references() {
        let alpha = Relation::new("public", "alpha", &["id"]).with_pk(&["id"]);
        let fk = ForeignKey::new("beta_alpha_id_fkey", &["alpha_id"], "public", "alpha", &["id"]);
        assert!(fk.references(&alpha));

        let other = Relation::new("sch", "alpha", &["id"]);
        assert!(!fk.references(&other));
    }
}

//! INSERT statements.
//!
//! Multi-record inserts take the union of keys across all records, in
//! first-seen order, binding an explicit null for keys a record lacks so
//! column alignment holds. Deep inserts write dependent (junction) records
//! in the same statement through one CTE per dependent record, each
//! selecting the parent's generated primary key into the dependent's
//! foreign-key columns.

use squill_core::{Error, Result, Value, quote_ident};

use crate::source::Source;

/// A single field of an insert record.
#[derive(Debug, Clone)]
pub enum InsertValue {
    /// An ordinary column value.
    Column(Value),
    /// Dependent records for a related table, written via deep insert.
    /// `Value::Default` entries mark the foreign-key slots that receive the
    /// parent's generated primary key.
    Dependents(Vec<DependentRecord>),
}

impl From<Value> for InsertValue {
    fn from(value: Value) -> Self {
        InsertValue::Column(value)
    }
}

impl From<&str> for InsertValue {
    fn from(value: &str) -> Self {
        InsertValue::Column(Value::Text(value.to_string()))
    }
}

impl From<String> for InsertValue {
    fn from(value: String) -> Self {
        InsertValue::Column(Value::Text(value))
    }
}

impl From<i64> for InsertValue {
    fn from(value: i64) -> Self {
        InsertValue::Column(Value::Int(value))
    }
}

impl From<i32> for InsertValue {
    fn from(value: i32) -> Self {
        InsertValue::Column(Value::Int(i64::from(value)))
    }
}

impl From<f64> for InsertValue {
    fn from(value: f64) -> Self {
        InsertValue::Column(Value::Double(value))
    }
}

impl From<bool> for InsertValue {
    fn from(value: bool) -> Self {
        InsertValue::Column(Value::Bool(value))
    }
}

/// An insert record: ordered field/value pairs.
pub type InsertRecord = Vec<(String, InsertValue)>;

/// A dependent record in a deep insert.
pub type DependentRecord = Vec<(String, Value)>;

/// Parse a JSON object into an insert record of plain column values.
///
/// # Errors
///
/// `MalformedCriteria` when the input is not an object.
pub fn record_from_json(json: &serde_json::Value) -> Result<InsertRecord> {
    let serde_json::Value::Object(map) = json else {
        return Err(Error::MalformedCriteria(format!(
            "An insert record must be an object, got {json}."
        )));
    };

    Ok(map
        .iter()
        .map(|(key, value)| (key.clone(), InsertValue::Column(Value::from_json(value))))
        .collect())
}

/// How to resolve a conflicting insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAction {
    /// `DO NOTHING`
    Ignore,
    /// `DO UPDATE SET` every inserted column not excluded.
    Update,
}

/// ON CONFLICT configuration.
#[derive(Debug, Clone, Default)]
pub struct OnConflict {
    /// The conflict action.
    pub action: Option<ConflictAction>,
    /// Conflict target columns.
    pub target: Vec<String>,
    /// Columns excluded from the update action.
    pub exclude: Vec<String>,
}

/// INSERT options.
#[derive(Debug, Clone, Default)]
pub struct InsertOptions {
    /// Restrict the RETURNING list.
    pub fields: Option<Vec<String>>,
    /// ON CONFLICT behavior.
    pub on_conflict: Option<OnConflict>,
    /// Legacy spelling of `on_conflict` with an ignore action.
    pub on_conflict_ignore: bool,
    /// Legacy spelling of `on_conflict` with an update action targeting
    /// the given columns.
    pub on_conflict_update: Option<Vec<String>>,
    /// Write dependent records through CTEs.
    pub deep_insert: bool,
}

/// A compiled INSERT statement.
#[derive(Debug)]
pub struct Insert {
    source: Source,
    single: bool,
    columns: Vec<String>,
    value_rows: Vec<String>,
    on_conflict: Option<String>,
    junctions: Vec<String>,
    returning: Vec<String>,
    params: Vec<Value>,
}

impl Insert {
    /// Compile an INSERT for one or more records.
    ///
    /// # Errors
    ///
    /// `MalformedCriteria` for empty input, deep inserts over multiple
    /// records, or non-array dependents; `ConflictingOptions` for
    /// overspecified ON CONFLICT options.
    pub fn new(source: Source, records: &[InsertRecord], options: InsertOptions) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::MalformedCriteria(
                "Insert requires at least one record.".to_string(),
            ));
        }

        let relation = source.relation().clone();
        let single = records.len() == 1;

        // union of keys across all records, first-seen order
        let mut columns: Vec<String> = Vec::new();
        let mut junction_keys: Vec<String> = Vec::new();

        for record in records {
            for (key, value) in record {
                if relation.has_column(key) {
                    if !columns.contains(key) {
                        columns.push(key.clone());
                    }
                } else if !junction_keys.contains(key) {
                    if options.deep_insert && matches!(value, InsertValue::Column(_)) {
                        return Err(Error::MalformedCriteria(
                            "Dependent records in a deep or multi-table insert must be supplied as arrays."
                                .to_string(),
                        ));
                    }

                    junction_keys.push(key.clone());
                }
            }
        }

        if columns.is_empty() {
            return Err(Error::MalformedCriteria(format!(
                "No record defines any column of \"{}\".",
                relation.name
            )));
        }

        if options.deep_insert && !junction_keys.is_empty() && records.len() > 1 {
            return Err(Error::MalformedCriteria(
                "Multi-table or deep insert is only supported for single records.".to_string(),
            ));
        }

        let mut params = Vec::new();
        let mut value_rows = Vec::with_capacity(records.len());

        for record in records {
            let placeholders = columns
                .iter()
                .map(|column| {
                    let value = record
                        .iter()
                        .find(|(key, _)| key == column)
                        .and_then(|(_, value)| match value {
                            InsertValue::Column(value) => Some(value.clone()),
                            InsertValue::Dependents(_) => None,
                        })
                        .unwrap_or(Value::Null);

                    params.push(value);
                    format!("${}", params.len())
                })
                .collect::<Vec<_>>()
                .join(", ");

            value_rows.push(format!("({placeholders})"));
        }

        let on_conflict = compile_on_conflict(&options, &columns)?;

        let mut junctions = Vec::new();
        if options.deep_insert {
            for (index, key) in junction_keys.iter().enumerate() {
                let dependents = records[0]
                    .iter()
                    .find(|(record_key, _)| record_key == key)
                    .and_then(|(_, value)| match value {
                        InsertValue::Dependents(dependents) => Some(dependents),
                        InsertValue::Column(_) => None,
                    });

                let Some(dependents) = dependents else {
                    continue;
                };

                for (record_index, dependent) in dependents.iter().enumerate() {
                    junctions.push(junction_cte(
                        key,
                        index,
                        record_index,
                        dependent,
                        &relation.pk,
                        &mut params,
                    )?);
                }
            }
        }

        let returning = crate::statement::parse_returning(options.fields.as_deref(), &source)?;

        Ok(Self {
            source,
            single,
            columns,
            value_rows,
            on_conflict,
            junctions,
            returning,
            params,
        })
    }

    /// The ordered parameter list.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Whether a single record is being written.
    pub fn is_single(&self) -> bool {
        self.single
    }

    /// Render the SQL text.
    pub fn format(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        let mut base = format!(
            "INSERT INTO {} ({columns}) VALUES {}",
            self.source.delimited_name(),
            self.value_rows.join(", ")
        );

        if let Some(on_conflict) = &self.on_conflict {
            base.push_str(on_conflict);
        }

        let sql = if self.junctions.is_empty() {
            format!("{base} RETURNING {}", self.returning.join(", "))
        } else {
            format!(
                "WITH inserted AS ({base} RETURNING *), {} SELECT * FROM inserted",
                self.junctions.join(", ")
            )
        };

        tracing::trace!(sql = %sql, "generated INSERT statement");

        sql
    }
}

fn compile_on_conflict(options: &InsertOptions, columns: &[String]) -> Result<Option<String>> {
    let specified = usize::from(options.on_conflict.is_some())
        + usize::from(options.on_conflict_ignore)
        + usize::from(options.on_conflict_update.is_some());

    if specified > 1 {
        return Err(Error::ConflictingOptions(
            "The \"on_conflict_ignore\", \"on_conflict_update\", and \"on_conflict\" options are mutually exclusive"
                .to_string(),
        ));
    }

    let normalized = if options.on_conflict_ignore {
        OnConflict {
            action: Some(ConflictAction::Ignore),
            ..OnConflict::default()
        }
    } else if let Some(target) = &options.on_conflict_update {
        OnConflict {
            action: Some(ConflictAction::Update),
            target: target.clone(),
            exclude: Vec::new(),
        }
    } else if let Some(on_conflict) = &options.on_conflict {
        on_conflict.clone()
    } else {
        return Ok(None);
    };

    let target = if normalized.target.is_empty() {
        String::new()
    } else {
        format!(
            " ({})",
            normalized
                .target
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        )
    };

    match normalized.action {
        None => Err(Error::ConflictingOptions(
            "onConflict must specify an action of ignore or update".to_string(),
        )),
        Some(ConflictAction::Ignore) => Ok(Some(format!(" ON CONFLICT{target} DO NOTHING"))),
        Some(ConflictAction::Update) => {
            if normalized.target.is_empty() {
                return Err(Error::ConflictingOptions(
                    "onConflict update requires a conflict target".to_string(),
                ));
            }

            let assignments = columns
                .iter()
                .filter(|column| {
                    !normalized.target.contains(column) && !normalized.exclude.contains(column)
                })
                .map(|column| {
                    let quoted = quote_ident(column);
                    format!("{quoted} = EXCLUDED.{quoted}")
                })
                .collect::<Vec<_>>()
                .join(", ");

            Ok(Some(format!(
                " ON CONFLICT{target} DO UPDATE SET {assignments}"
            )))
        }
    }
}

fn junction_cte(
    key: &str,
    index: usize,
    record_index: usize,
    dependent: &DependentRecord,
    parent_pk: &[String],
    params: &mut Vec<Value>,
) -> Result<String> {
    // fill slots first, then the dependent's own values
    let fill_keys: Vec<&String> = dependent
        .iter()
        .filter(|(_, value)| matches!(value, Value::Default))
        .map(|(key, _)| key)
        .collect();

    if fill_keys.is_empty() {
        return Err(Error::MalformedCriteria(format!(
            "Dependent records for {key} must mark the foreign-key columns receiving the parent key."
        )));
    }

    if fill_keys.len() > parent_pk.len() {
        return Err(Error::MalformedCriteria(format!(
            "Dependent records for {key} mark more foreign-key columns than the parent has primary key columns."
        )));
    }

    let mut columns: Vec<String> = fill_keys.iter().map(|k| quote_ident(k)).collect();
    let mut select_list: Vec<String> = parent_pk
        .iter()
        .take(fill_keys.len())
        .map(|c| quote_ident(c))
        .collect();

    for (dependent_key, value) in dependent {
        if matches!(value, Value::Default) {
            continue;
        }

        columns.push(quote_ident(dependent_key));
        params.push(value.clone());
        select_list.push(format!("${}", params.len()));
    }

    let relation = key
        .split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".");

    Ok(format!(
        "q_{index}_{record_index} AS (INSERT INTO {relation} ({}) SELECT {} FROM inserted)",
        columns.join(", "),
        select_list.join(", ")
    ))
}

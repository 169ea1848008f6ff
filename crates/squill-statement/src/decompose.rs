//! Result decomposition.
//!
//! Joined SELECTs return flat rows with `alias__column` names; the
//! decomposition schema generated alongside the join graph describes how to
//! fold those rows back into a tree of nested records. Children repeat once
//! per matching row of a one-to-many join, so records merge by primary-key
//! identity rather than appending blindly.

use std::collections::HashMap;

use serde_json::{Map, Value as Json};

/// Whether a child node decomposes into an array of records or a single
/// object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DecomposeTo {
    /// Collect matching child records into an array.
    #[default]
    Array,
    /// Attach the single matching child record directly.
    Object,
}

/// One node of a decomposition schema, mirroring the join specification.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecomposeSchema {
    /// Aliased primary-key columns; all-null detects an absent child row.
    pub pk: Vec<String>,
    /// Flat column name → output property name, in output order.
    pub columns: Vec<(String, String)>,
    /// Child nodes keyed by output property.
    pub children: Vec<(String, DecomposeSchema)>,
    /// Consume this node for its children's sake but omit it from output;
    /// its children attach to the nearest non-omitted ancestor.
    pub omit: bool,
    /// Array (default) or single-object output.
    pub decompose_to: DecomposeTo,
}

impl DecomposeSchema {
    /// Start a schema node from its aliased pk columns.
    pub fn new(pk: &[&str]) -> Self {
        Self {
            pk: pk.iter().map(|&c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Map a flat column to an output property.
    #[must_use]
    pub fn with_column(mut self, flat: &str, property: &str) -> Self {
        self.columns.push((flat.to_string(), property.to_string()));
        self
    }

    /// Attach a child node under `property`.
    #[must_use]
    pub fn with_child(mut self, property: &str, child: DecomposeSchema) -> Self {
        self.children.push((property.to_string(), child));
        self
    }

    /// Mark this node as omitted from output.
    #[must_use]
    pub fn omitted(mut self) -> Self {
        self.omit = true;
        self
    }

    /// Decompose to a single object instead of an array.
    #[must_use]
    pub fn to_object(mut self) -> Self {
        self.decompose_to = DecomposeTo::Object;
        self
    }
}

#[derive(Default)]
struct Accumulator {
    order: Vec<String>,
    records: HashMap<String, Record>,
}

#[derive(Default)]
struct Record {
    fields: Map<String, Json>,
    children: HashMap<String, Accumulator>,
}

/// Fold flat rows into nested records per the decomposition schema.
pub fn decompose(schema: &DecomposeSchema, rows: &[Map<String, Json>]) -> Vec<Json> {
    let mut accumulator = Accumulator::default();

    for row in rows {
        accept(schema, row, &mut accumulator);
    }

    output(schema, accumulator)
}

fn accept(schema: &DecomposeSchema, row: &Map<String, Json>, accumulator: &mut Accumulator) {
    let pk_values: Vec<&Json> = schema
        .pk
        .iter()
        .map(|column| row.get(column).unwrap_or(&Json::Null))
        .collect();

    if pk_values.iter().all(|v| v.is_null()) {
        return;
    }

    let key = serde_json::to_string(&pk_values).unwrap_or_default();

    if !accumulator.records.contains_key(&key) {
        let mut fields = Map::new();
        for (flat, property) in &schema.columns {
            fields.insert(
                property.clone(),
                row.get(flat).cloned().unwrap_or(Json::Null),
            );
        }

        accumulator.order.push(key.clone());
        accumulator.records.insert(
            key.clone(),
            Record {
                fields,
                children: HashMap::new(),
            },
        );
    }

    let record = accumulator
        .records
        .get_mut(&key)
        .expect("record inserted above");
    descend(schema, row, record);
}

fn descend(schema: &DecomposeSchema, row: &Map<String, Json>, record: &mut Record) {
    for (property, child) in &schema.children {
        if child.omit {
            let present = child
                .pk
                .iter()
                .any(|column| !row.get(column).unwrap_or(&Json::Null).is_null());

            if present {
                descend(child, row, record);
            }
        } else {
            let child_accumulator = record.children.entry(property.clone()).or_default();
            accept(child, row, child_accumulator);
        }
    }
}

fn output(schema: &DecomposeSchema, mut accumulator: Accumulator) -> Vec<Json> {
    let order = std::mem::take(&mut accumulator.order);

    order
        .into_iter()
        .filter_map(|key| accumulator.records.remove(&key))
        .map(|mut record| {
            let mut object = std::mem::take(&mut record.fields);

            for (property, child) in effective_children(schema) {
                let value = match record.children.remove(property) {
                    Some(child_accumulator) => {
                        let items = output(child, child_accumulator);
                        match child.decompose_to {
                            DecomposeTo::Array => Json::Array(items),
                            DecomposeTo::Object => items.into_iter().next().unwrap_or(Json::Null),
                        }
                    }
                    None => match child.decompose_to {
                        DecomposeTo::Array => Json::Array(Vec::new()),
                        DecomposeTo::Object => Json::Null,
                    },
                };

                object.insert(property.clone(), value);
            }

            Json::Object(object)
        })
        .collect()
}

/// Children visible in output: omitted nodes are replaced by their own
/// children, recursively.
fn effective_children(schema: &DecomposeSchema) -> Vec<(&String, &DecomposeSchema)> {
    let mut visible = Vec::new();

    for (property, child) in &schema.children {
        if child.omit {
            visible.extend(effective_children(child));
        } else {
            visible.push((property, child));
        }
    }

    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Json) -> Map<String, Json> {
        match value {
            Json::Object(map) => map,
            _ => panic!("row fixtures are objects"),
        }
    }

    fn alpha_beta_schema() -> DecomposeSchema {
        DecomposeSchema::new(&["alpha__id"])
            .with_column("alpha__id", "id")
            .with_column("alpha__val", "val")
            .with_child(
                "beta",
                DecomposeSchema::new(&["beta__id"])
                    .with_column("beta__id", "id")
                    .with_column("beta__alpha_id", "alpha_id"),
            )
    }

    #[test]
    fn test_dedups_repeated_parents() {
        let schema = alpha_beta_schema();
        let rows = vec![
            row(json!({"alpha__id": 3, "alpha__val": "three", "beta__id": 3, "beta__alpha_id": 3})),
            row(json!({"alpha__id": 3, "alpha__val": "three", "beta__id": 4, "beta__alpha_id": 3})),
        ];

        let result = decompose(&schema, &rows);

        assert_eq!(
            result,
            vec![json!({
                "id": 3,
                "val": "three",
                "beta": [
                    {"id": 3, "alpha_id": 3},
                    {"id": 4, "alpha_id": 3}
                ]
            })]
        );
    }

    #[test]
    fn test_dedups_repeated_children() {
        let schema = alpha_beta_schema();
        let rows = vec![
            row(json!({"alpha__id": 1, "alpha__val": "one", "beta__id": 9, "beta__alpha_id": 1})),
            row(json!({"alpha__id": 1, "alpha__val": "one", "beta__id": 9, "beta__alpha_id": 1})),
        ];

        let result = decompose(&schema, &rows);
        let Json::Object(first) = &result[0] else {
            panic!("expected an object");
        };
        assert_eq!(first["beta"], json!([{"id": 9, "alpha_id": 1}]));
    }

    #[test]
    fn test_absent_children_yield_empty_arrays() {
        let schema = alpha_beta_schema();
        let rows = vec![row(
            json!({"alpha__id": 4, "alpha__val": "four", "beta__id": null, "beta__alpha_id": null}),
        )];

        let result = decompose(&schema, &rows);
        assert_eq!(result, vec![json!({"id": 4, "val": "four", "beta": []})]);
    }

    #[test]
    fn test_decompose_to_object() {
        let schema = DecomposeSchema::new(&["alpha__id"])
            .with_column("alpha__id", "id")
            .with_child(
                "beta",
                DecomposeSchema::new(&["beta__id"])
                    .with_column("beta__id", "id")
                    .to_object(),
            );

        let rows = vec![row(json!({"alpha__id": 2, "beta__id": 2}))];
        let result = decompose(&schema, &rows);

        assert_eq!(result, vec![json!({"id": 2, "beta": {"id": 2}})]);
    }

    #[test]
    fn test_omitted_nodes_graft_children_onto_ancestors() {
        let schema = DecomposeSchema::new(&["alpha__id"])
            .with_column("alpha__id", "id")
            .with_column("alpha__val", "val")
            .with_child(
                "alpha_zeta",
                DecomposeSchema::new(&["alpha_zeta__alpha_id", "alpha_zeta__zeta_id"])
                    .with_column("alpha_zeta__alpha_id", "alpha_id")
                    .with_column("alpha_zeta__zeta_id", "zeta_id")
                    .omitted()
                    .with_child(
                        "zeta",
                        DecomposeSchema::new(&["zeta__id"])
                            .with_column("zeta__id", "id")
                            .with_column("zeta__val", "val"),
                    ),
            );

        let rows = vec![
            row(json!({
                "alpha__id": 1, "alpha__val": "one",
                "alpha_zeta__alpha_id": 1, "alpha_zeta__zeta_id": 1,
                "zeta__id": 1, "zeta__val": "alpha one"
            })),
            row(json!({
                "alpha__id": 1, "alpha__val": "one",
                "alpha_zeta__alpha_id": 1, "alpha_zeta__zeta_id": 2,
                "zeta__id": 2, "zeta__val": "alpha one again"
            })),
            row(json!({
                "alpha__id": 3, "alpha__val": "three",
                "alpha_zeta__alpha_id": null, "alpha_zeta__zeta_id": null,
                "zeta__id": null, "zeta__val": null
            })),
        ];

        let result = decompose(&schema, &rows);

        assert_eq!(
            result,
            vec![
                json!({
                    "id": 1,
                    "val": "one",
                    "zeta": [
                        {"id": 1, "val": "alpha one"},
                        {"id": 2, "val": "alpha one again"}
                    ]
                }),
                json!({"id": 3, "val": "three", "zeta": []})
            ]
        );
    }

    #[test]
    fn test_deep_nesting() {
        let schema = DecomposeSchema::new(&["alpha__id"])
            .with_column("alpha__id", "id")
            .with_child(
                "beta",
                DecomposeSchema::new(&["beta__id"])
                    .with_column("beta__id", "id")
                    .with_child(
                        "gamma",
                        DecomposeSchema::new(&["gamma__id"]).with_column("gamma__id", "id"),
                    ),
            );

        let rows = vec![
            row(json!({"alpha__id": 2, "beta__id": 2, "gamma__id": 2})),
            row(json!({"alpha__id": 2, "beta__id": 2, "gamma__id": 3})),
        ];

        let result = decompose(&schema, &rows);

        assert_eq!(
            result,
            vec![json!({
                "id": 2,
                "beta": [{"id": 2, "gamma": [{"id": 2}, {"id": 3}]}]
            })]
        );
    }
}

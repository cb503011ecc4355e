//! The trial table: raw trial fields plus the four normalized columns.

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ValidationError;
use crate::logging::{info, obj, warn, Domain};
use crate::trial::{
    parse_trials, ExcludedTrial, FieldMap, IncompleteTrialPolicy, DERIVED_COLUMNS,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialRow {
    /// Position of the trial in the document's trials array.
    pub index: usize,
    /// Raw fields in document order followed by the derived columns.
    pub fields: FieldMap,
}

impl TrialRow {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.fields.get(column).and_then(Value::as_f64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrialTable {
    pub columns: Vec<String>,
    pub rows: Vec<TrialRow>,
    pub excluded: Vec<ExcludedTrial>,
}

impl TrialTable {
    /// Build with the default policy: any malformed trial fails the build.
    pub fn build(raw: &[FieldMap]) -> Result<Self, ValidationError> {
        Self::build_with(raw, IncompleteTrialPolicy::Fatal)
    }

    pub fn build_with(
        raw: &[FieldMap],
        policy: IncompleteTrialPolicy,
    ) -> Result<Self, ValidationError> {
        let parsed = parse_trials(raw, policy).map_err(|err| {
            warn(
                Domain::Table,
                "validation_failed",
                obj(&[
                    ("issues", json!(err.issues.len())),
                    ("records", json!(err.records())),
                ]),
            );
            err
        })?;

        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::with_capacity(parsed.records.len());
        for record in &parsed.records {
            for key in record.fields.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
            let mut fields = record.fields.clone();
            for (name, value) in record.derive().named() {
                fields.insert(name.to_string(), json!(value));
            }
            rows.push(TrialRow {
                index: record.index,
                fields,
            });
        }
        // A raw field sharing a derived column's name is overwritten on every
        // row, so it only appears once, in the derived position.
        columns.retain(|c| !DERIVED_COLUMNS.contains(&c.as_str()));
        columns.extend(DERIVED_COLUMNS.iter().map(|c| c.to_string()));

        for excluded in &parsed.excluded {
            warn(
                Domain::Table,
                "trial_excluded",
                obj(&[
                    ("index", json!(excluded.index)),
                    ("missing", json!(excluded.missing)),
                ]),
            );
        }
        info(
            Domain::Table,
            "table_built",
            obj(&[
                ("rows", json!(rows.len())),
                ("columns", json!(columns.len())),
                ("excluded", json!(parsed.excluded.len())),
            ]),
        );

        Ok(Self {
            columns,
            rows,
            excluded: parsed.excluded,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> &[TrialRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// Rows where both columns are numeric, as (x, y) pairs.
    pub fn pairs(&self, x: &str, y: &str) -> Vec<(f64, f64)> {
        self.rows
            .iter()
            .filter_map(|r| Some((r.number(x)?, r.number(y)?)))
            .collect()
    }

    /// Records-oriented JSON: one object per row.
    pub fn to_records(&self) -> Value {
        Value::Array(
            self.rows
                .iter()
                .map(|r| Value::Object(r.fields.clone()))
                .collect(),
        )
    }
}

//! Typed trial records.
//!
//! A trial arrives as an untyped field map. It is parsed exactly once into a
//! [`TrialRecord`], and every problem found is reported with the record's
//! position so a bad document fails with one complete error instead of a
//! late division failure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FieldIssue, Problem, ValidationError};

pub type FieldMap = Map<String, Value>;

pub const ENDOWMENT: &str = "endowment";
pub const I_FIRST_ORDER_EXPECTATION: &str = "I_1ST_ORDER_EXPECTATION";
pub const I_CHOICE: &str = "I_CHOICE";
pub const T_SECOND_ORDER_EXPECTATION: &str = "T_2ND_ORDER_EXPECTATION";
pub const T_CHOICE: &str = "T_CHOICE";

pub const REQUIRED_FIELDS: [&str; 5] = [
    ENDOWMENT,
    I_FIRST_ORDER_EXPECTATION,
    I_CHOICE,
    T_SECOND_ORDER_EXPECTATION,
    T_CHOICE,
];

pub const INVESTOR_EXPECTATION: &str = "Investor Expectation";
pub const INVESTOR_BEHAVIOR: &str = "Investor Behavior";
pub const TRUSTEE_EXPECTATION: &str = "Trustee Expectation";
pub const TRUSTEE_BEHAVIOR: &str = "Trustee Behavior";

pub const DERIVED_COLUMNS: [&str; 4] = [
    INVESTOR_EXPECTATION,
    INVESTOR_BEHAVIOR,
    TRUSTEE_EXPECTATION,
    TRUSTEE_BEHAVIOR,
];

/// Amount sent by the investor is multiplied by this before the trustee
/// decides what to return.
pub const TRUST_MULTIPLIER: f64 = 4.0;

/// What to do with trials that lack one or more required fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncompleteTrialPolicy {
    /// Any incomplete trial fails the whole build.
    #[default]
    Fatal,
    /// Incomplete trials are dropped and reported.
    Exclude,
}

impl IncompleteTrialPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "fatal" => Some(Self::Fatal),
            "exclude" => Some(Self::Exclude),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecord {
    /// Position in the document's trials array.
    pub index: usize,
    pub endowment: f64,
    pub first_order_expectation: f64,
    pub first_party_choice: f64,
    pub second_order_expectation: f64,
    pub second_party_choice: f64,
    /// Every raw field, required ones included, in document order.
    pub fields: FieldMap,
}

/// The four normalized percentages for one trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedColumns {
    pub investor_expectation: f64,
    pub investor_behavior: f64,
    pub trustee_expectation: f64,
    pub trustee_behavior: f64,
}

impl DerivedColumns {
    pub fn named(&self) -> [(&'static str, f64); 4] {
        [
            (INVESTOR_EXPECTATION, self.investor_expectation),
            (INVESTOR_BEHAVIOR, self.investor_behavior),
            (TRUSTEE_EXPECTATION, self.trustee_expectation),
            (TRUSTEE_BEHAVIOR, self.trustee_behavior),
        ]
    }
}

impl TrialRecord {
    /// Parse one raw trial. Returns every issue found, not just the first.
    pub fn from_fields(index: usize, fields: &FieldMap) -> Result<Self, Vec<FieldIssue>> {
        let mut issues = Vec::new();
        let mut values = [f64::NAN; REQUIRED_FIELDS.len()];
        for (slot, field) in values.iter_mut().zip(REQUIRED_FIELDS) {
            match number(fields.get(field)) {
                Ok(v) => *slot = v,
                Err(problem) => issues.push(FieldIssue {
                    record: index,
                    field,
                    problem,
                }),
            }
        }
        let [
            endowment,
            first_order_expectation,
            first_party_choice,
            second_order_expectation,
            second_party_choice,
        ] = values;

        // NaN (unreadable endowment) is already reported above
        if endowment <= 0.0 {
            issues.push(FieldIssue {
                record: index,
                field: ENDOWMENT,
                problem: Problem::NonPositiveEndowment { value: endowment },
            });
        }

        if !issues.is_empty() {
            return Err(issues);
        }

        let record = Self {
            index,
            endowment,
            first_order_expectation,
            first_party_choice,
            second_order_expectation,
            second_party_choice,
            fields: fields.clone(),
        };

        // Extreme magnitudes overflow to infinity, which would serialize as null.
        if !(endowment * TRUST_MULTIPLIER).is_finite() {
            issues.push(FieldIssue {
                record: index,
                field: ENDOWMENT,
                problem: Problem::NonFinite,
            });
        }
        for (column, value) in record.derive().named() {
            if !value.is_finite() {
                issues.push(FieldIssue {
                    record: index,
                    field: column,
                    problem: Problem::NonFinite,
                });
            }
        }

        if issues.is_empty() {
            Ok(record)
        } else {
            Err(issues)
        }
    }

    pub fn derive(&self) -> DerivedColumns {
        let trustee_pool = self.endowment * TRUST_MULTIPLIER;
        DerivedColumns {
            investor_expectation: self.first_order_expectation / self.endowment * 100.0,
            investor_behavior: self.first_party_choice / self.endowment * 100.0,
            trustee_expectation: self.second_order_expectation / trustee_pool * 100.0,
            trustee_behavior: self.second_party_choice / trustee_pool * 100.0,
        }
    }
}

fn number(value: Option<&Value>) -> Result<f64, Problem> {
    match value {
        None => Err(Problem::Missing),
        Some(Value::Number(n)) => n.as_f64().ok_or(Problem::NotNumeric { found: "number" }),
        Some(other) => Err(Problem::NotNumeric {
            found: json_kind(other),
        }),
    }
}

pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

/// A trial dropped under [`IncompleteTrialPolicy::Exclude`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedTrial {
    pub index: usize,
    pub missing: Vec<&'static str>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedTrials {
    pub records: Vec<TrialRecord>,
    pub excluded: Vec<ExcludedTrial>,
}

/// Parse every raw trial, collecting all issues across the array.
///
/// Under `Exclude`, a trial whose only problems are missing fields is dropped
/// and reported. Non-numeric values and non-positive endowments are fatal
/// under either policy.
pub fn parse_trials(
    raw: &[FieldMap],
    policy: IncompleteTrialPolicy,
) -> Result<ParsedTrials, ValidationError> {
    let mut parsed = ParsedTrials::default();
    let mut issues = Vec::new();

    for (index, fields) in raw.iter().enumerate() {
        match TrialRecord::from_fields(index, fields) {
            Ok(record) => parsed.records.push(record),
            Err(found) => {
                let missing: Vec<&'static str> = found
                    .iter()
                    .filter(|i| i.problem == Problem::Missing)
                    .map(|i| i.field)
                    .collect();
                let only_missing = missing.len() == found.len();
                if policy == IncompleteTrialPolicy::Exclude && only_missing {
                    parsed.excluded.push(ExcludedTrial { index, missing });
                } else {
                    issues.extend(found);
                }
            }
        }
    }

    if issues.is_empty() {
        Ok(parsed)
    } else {
        Err(ValidationError { issues })
    }
}

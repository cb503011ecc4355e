//! The fetched group document, parsed at the store boundary.

use serde::Serialize;
use serde_json::Value;

use crate::error::DocumentError;
use crate::trial::FieldMap;

pub const GROUP_ID: &str = "groupId";
pub const INVESTOR_NAME: &str = "I_name";
pub const TRUSTEE_NAME: &str = "T_name";
pub const CURRENT_STATE: &str = "currentState";
pub const CURRENT_TRIAL: &str = "currentTrial";
pub const TRIALS: &str = "trials";

/// Scalar labels shown in the sidebar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub group_id: String,
    pub investor_name: String,
    pub trustee_name: String,
    pub current_state: String,
    pub current_trial: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupDocument {
    pub summary: GroupSummary,
    pub trials: Vec<FieldMap>,
    /// The whole document as fetched.
    pub raw: FieldMap,
}

impl GroupDocument {
    pub fn from_fields(raw: FieldMap) -> Result<Self, DocumentError> {
        let summary = GroupSummary {
            group_id: label(&raw, GROUP_ID)?,
            investor_name: label(&raw, INVESTOR_NAME)?,
            trustee_name: label(&raw, TRUSTEE_NAME)?,
            current_state: label(&raw, CURRENT_STATE)?,
            current_trial: label(&raw, CURRENT_TRIAL)?,
        };

        let trials = match raw.get(TRIALS) {
            None => return Err(DocumentError::MissingField(TRIALS)),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Value::Object(fields) => Ok(fields.clone()),
                    _ => Err(DocumentError::TrialNotMap { index }),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(DocumentError::WrongType {
                    field: TRIALS,
                    expected: "an array",
                })
            }
        };

        Ok(Self {
            summary,
            trials,
            raw,
        })
    }
}

/// Strings are shown as-is; numbers and booleans by their JSON text.
fn label(raw: &FieldMap, field: &'static str) -> Result<String, DocumentError> {
    match raw.get(field) {
        None => Err(DocumentError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(v.to_string()),
        Some(_) => Err(DocumentError::WrongType {
            field,
            expected: "a string or number",
        }),
    }
}

//! Error types.
//!
//! Every failure is fatal for the page load that hit it: there is no
//! degraded rendering and nothing is retried.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failures reading a document from a store.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("document {collection}/{document} does not exist")]
    NotFound { collection: String, document: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid credentials: {0}")]
    Credentials(String),

    #[error("invalid store configuration: {0}")]
    Config(String),

    #[error("document store returned status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed document payload: {0}")]
    Decode(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The fetched document does not have the group shape.
#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    #[error("group document is missing field `{0}`")]
    MissingField(&'static str),

    #[error("group document field `{field}` should be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("trial {index} is not a map of fields")]
    TrialNotMap { index: usize },
}

/// What is wrong with one field of one trial record.
#[derive(Debug, Clone, PartialEq)]
pub enum Problem {
    Missing,
    NotNumeric { found: &'static str },
    NonPositiveEndowment { value: f64 },
    /// A derived ratio, or the trustee's pool, overflows to infinity.
    NonFinite,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::Missing => write!(f, "missing"),
            Problem::NotNumeric { found } => write!(f, "expected a number, found {}", found),
            Problem::NonPositiveEndowment { value } => {
                write!(f, "endowment must be positive, got {}", value)
            }
            Problem::NonFinite => write!(f, "value is out of range and not finite"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldIssue {
    /// Position of the record in the document's trials array.
    pub record: usize,
    pub field: &'static str,
    pub problem: Problem,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trial {} field `{}`: {}", self.record, self.field, self.problem)
    }
}

/// All problems found across the whole trials array.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn records(&self) -> Vec<usize> {
        let mut records: Vec<usize> = self.issues.iter().map(|i| i.record).collect();
        records.dedup();
        records
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} invalid trial field(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "; {}", issue)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Anything that aborts `load_and_build`.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_every_issue() {
        let err = ValidationError {
            issues: vec![
                FieldIssue {
                    record: 0,
                    field: "I_CHOICE",
                    problem: Problem::Missing,
                },
                FieldIssue {
                    record: 2,
                    field: "endowment",
                    problem: Problem::NonPositiveEndowment { value: 0.0 },
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("2 invalid trial field(s)"));
        assert!(msg.contains("trial 0 field `I_CHOICE`: missing"));
        assert!(msg.contains("endowment must be positive, got 0"));
        assert_eq!(err.records(), vec![0, 2]);
    }
}

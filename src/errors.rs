//! Error types for the trade journal.
//!
//! Validation problems are collected into a single [`ValidationError`] so a
//! caller can show every offending field at once instead of the first one.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// One violated field, optionally tied to a target position in the input list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_index: Option<usize>,
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target_index {
            Some(i) => write!(f, "targets[{}].{}: {}", i, self.field, self.message),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

/// Structured, non-fail-fast validation error.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[error("{}", describe_issues(.issues))]
pub struct ValidationError {
    issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, target_index: Option<usize>, field: &str, message: impl Into<String>) {
        self.issues.push(FieldIssue {
            target_index,
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    /// Whether any issue names `field`.
    pub fn references(&self, field: &str) -> bool {
        self.issues.iter().any(|i| i.field == field)
    }

    /// Issues recorded against one target position.
    pub fn issues_for_target(&self, index: usize) -> Vec<&FieldIssue> {
        self.issues
            .iter()
            .filter(|i| i.target_index == Some(index))
            .collect()
    }

    pub fn merge(&mut self, other: ValidationError) {
        self.issues.extend(other.issues);
    }

    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

fn describe_issues(issues: &[FieldIssue]) -> String {
    let mut out = format!("{} issue(s)", issues.len());
    for issue in issues {
        out.push_str("; ");
        out.push_str(&issue.to_string());
    }
    out
}

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Trade not found: {0}")]
    TradeNotFound(i64),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JournalError {
    /// The structured validation issues, if this is a validation failure.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(v) => Some(v),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, JournalError>;

// ⚠️ Sync Errors - rejections and store failures
//
// Every variant is terminal for the sync that raised it. Input rejections are
// raised before the first store write; store failures propagate as-is.

use crate::entities::CustomerType;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single failed field constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: &str, message: &str) -> Self {
        Violation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Customer sync errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Incoming record failed required-field validation.
    #[error("{}", join_violations(.0))]
    Validation(Vec<Violation>),

    /// Matched record is of the other customer type.
    #[error("Existing customer for external id {external_id} is a {existing}, not a {incoming}")]
    TypeMismatch {
        external_id: String,
        existing: CustomerType,
        incoming: CustomerType,
    },

    /// Record matched by company number already belongs to another external id.
    #[error(
        "Existing customer for company number {company_number} doesn't match external id \
         {incoming_external_id}, instead found {existing_external_id}"
    )]
    ExternalIdConflict {
        company_number: String,
        incoming_external_id: String,
        existing_external_id: String,
    },

    /// Record store failure.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl SyncError {
    /// True for errors caused by the incoming data rather than the store.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, SyncError::Store(_))
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            SyncError::Validation(violations) => violations,
            _ => &[],
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

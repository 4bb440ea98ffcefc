//! Error types for the casebook core.
//!
//! Three families are kept apart because callers recover from them differently:
//! - [`ValidationError`]: a guard failed; the operation was blocked and nothing changed.
//! - [`RepositoryError`]: the remote store failed; state is untouched so the caller can retry.
//! - [`CaseError::InvalidPath`] / [`CaseError::InvalidValue`]: a caller addressed a field that
//!   does not exist or passed a value of the wrong kind. These are defects, not runtime conditions.

use std::fmt;

/// A guard condition that was not met.
///
/// The display text is the message shown to the author, so each variant names exactly one
/// unmet condition.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Veuillez sélectionner un cas clinique ou en créer un nouveau.")]
    MissingWorkingCopy,
    #[error("Veuillez saisir un titre pour le cas d'école.")]
    MissingTitle,
    #[error("Veuillez saisir le nom de l'école.")]
    MissingSchoolName,
    #[error("Veuillez saisir le nom de la classe.")]
    MissingClassName,
    #[error("Veuillez saisir une raison pour le rejet.")]
    MissingRejectionReason,
    #[error("Veuillez cocher au moins un élément rejeté.")]
    MissingRejectedRegions,
}

/// Uniform failure reported by a repository client.
///
/// Status codes are carried for display only; the core never branches on them.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RepositoryError {
    pub message: String,
    pub status_code: Option<u16>,
}

impl RepositoryError {
    pub fn new(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            message: message.into(),
            status_code,
        }
    }

    /// A failure that never reached the remote store (connection refused, timeout, ...).
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(message, None)
    }

    /// A non-2xx answer, rendered the way the remote store's clients display it.
    pub fn http(status_code: u16, reason: &str) -> Self {
        Self::new(format!("HTTP {status_code}: {reason}"), Some(status_code))
    }
}

/// The action attempted when a workflow refused a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkflowAction {
    Select,
    Edit,
    Schedule,
    Advance,
    Back,
    Submit,
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowAction::Select => "select a base case",
            WorkflowAction::Edit => "edit the working copy",
            WorkflowAction::Schedule => "edit the schedule",
            WorkflowAction::Advance => "advance",
            WorkflowAction::Back => "go back",
            WorkflowAction::Submit => "submit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    #[error("invalid patch path: {0}")]
    InvalidPath(String),
    #[error("invalid value for {path}: {reason}")]
    InvalidValue { path: String, reason: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("cannot {action} in the {step} step")]
    InvalidTransition {
        step: String,
        action: WorkflowAction,
    },
    #[error("clinical case not found: {0}")]
    NotFound(String),
    #[error("case document mismatch at {path}: {source}")]
    Deserialization {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize case: {0}")]
    Serialization(serde_json::Error),
}

pub type CaseResult<T> = std::result::Result<T, CaseError>;

/// Result type for repository contracts.
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

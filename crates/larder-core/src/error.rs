//! Error taxonomy shared by every larder operation.
//!
//! Callers match on [`LarderError`] to decide how to react: validation and
//! permission failures are reported back to the member, conflicts and
//! external-service failures can be retried, storage failures cannot be
//! handled locally.

use larder_db::models::{ApprovalStatus, MemberRole};
use uuid::Uuid;

/// Errors returned by the domain layer.
#[derive(Debug, thiserror::Error)]
pub enum LarderError {
    /// Input was malformed or violated a domain rule.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The acting member's role does not allow the operation.
    #[error("{member} ({role}) is not allowed to {action}")]
    Permission {
        member: String,
        role: MemberRole,
        action: String,
    },

    /// Another writer holds the entity, or its state changed underneath us.
    #[error("conflict on {key}: {message}")]
    Conflict { key: String, message: String },

    /// The requested status change is not an edge of the approval graph.
    #[error("cannot {action} {entity} {id}: it is {status}")]
    InvalidTransition {
        entity: &'static str,
        id: Uuid,
        status: ApprovalStatus,
        action: &'static str,
    },

    /// Not enough approved recipes to produce a plan at all.
    #[error("insufficient data for {key}: {message}")]
    InsufficientData { key: String, message: String },

    /// An ingestion, notification or task-sync collaborator failed.
    #[error("{service} failed: {message}")]
    ExternalService { service: String, message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Result alias used across the crate.
pub type Result<T, E = LarderError> = std::result::Result<T, E>;

impl LarderError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// A recipe title clash: the key names the existing recipe.
    pub fn is_duplicate_recipe(&self) -> bool {
        matches!(self, Self::Conflict { key, .. } if key.starts_with("recipe:"))
    }

    /// Short advice for the member, if retrying can help.
    pub fn retry_hint(&self) -> Option<&'static str> {
        match self {
            _ if self.is_duplicate_recipe() => {
                Some("rename the recipe, or save it as a new version to keep both")
            }
            Self::Conflict { .. } => Some("another update is in progress; try again shortly"),
            Self::ExternalService { .. } => Some("the service may be unavailable; retry later"),
            Self::InsufficientData { .. } => Some("add or approve more recipes, then regenerate"),
            _ => None,
        }
    }

    /// Whether the same call may succeed if repeated unchanged.
    pub fn is_retryable(&self) -> bool {
        !self.is_duplicate_recipe()
            && matches!(self, Self::Conflict { .. } | Self::ExternalService { .. })
    }
}

//! Error taxonomy shared by the services.

use thiserror::Error;

use crate::ids::{ActorId, ContentId, IdentityId};

/// Error taxonomy shared by every service.
#[derive(Debug, Error)]
pub enum PulseError {
    /// Malformed input, rejected before any side effect.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Missing actor, content, curator, task, ...
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// Offending id.
        id: String,
    },

    /// Exclusive identity assignment violated.
    #[error("identity assignment conflict: actor {actor} / identity {identity}")]
    AlreadyAssigned {
        /// Actor side.
        actor: ActorId,
        /// Identity side.
        identity: IdentityId,
    },

    /// Content already has a curated queue item.
    #[error("content already queued: {0}")]
    AlreadyQueued(ContentId),

    /// Identity/curator/notification source unreachable.
    #[error("external dependency failed: {0}")]
    ExternalDependency(String),

    /// A task's target action failed.
    #[error("task execution failed: {0}")]
    TaskExecution(String),

    /// Actor exhausted its reactivation budget.
    #[error("actor {0} exhausted reactivation attempts")]
    ReactivationExhausted(ActorId),

    /// Persistence failure.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl PulseError {
    /// Shorthand for [`PulseError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result alias used across the workspace.
pub type Result<T, E = PulseError> = std::result::Result<T, E>;

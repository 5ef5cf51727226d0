use crate::remote::RemoteError;
use crate::types::EntityKind;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MutationError {
    /// Rejected before anything was applied (blank name, blank title).
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The target no longer exists locally; nothing was applied.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// The target was created locally and still waits for its authoritative id.
    #[error("{kind} {id} is still being created")]
    Provisional { kind: EntityKind, id: String },

    #[error("Rejected by server: {0}")]
    RemoteRejected(String),

    #[error("Server unreachable: {0}")]
    RemoteUnreachable(String),
}

impl MutationError {
    /// Remote failures are rolled back and shown to the user; everything else
    /// is handled locally.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            MutationError::RemoteRejected(_) | MutationError::RemoteUnreachable(_)
        )
    }

    pub(crate) fn not_found(kind: EntityKind, id: &str) -> Self {
        MutationError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<RemoteError> for MutationError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Rejected(m) => MutationError::RemoteRejected(m),
            RemoteError::Unreachable(m) => MutationError::RemoteUnreachable(m),
        }
    }
}

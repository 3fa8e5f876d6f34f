use millgate_storage::StorageError;
use millgate_types::{Identity, Stage};
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-layer errors.
///
/// Only genuinely out-of-order signals and unknown identifiers reach
/// callers. Degradable collaborator failures (role lookups, notification
/// dispatch) never surface here; they are logged and folded into audit
/// metadata instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Unknown identifier. Always reported, never retried.
    #[error("not found: {0}")]
    NotFound(String),

    /// A completion or violation signal that does not match the stored
    /// record, paired with the process's current stage and owner.
    #[error("invalid transition: {detail} (current stage {stage}, owner {owner:?})")]
    InvalidTransition {
        detail: String,
        stage: Stage,
        owner: Option<Identity>,
    },

    /// An outbound collaborator could not be reached where degradation
    /// was impossible.
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// A stored record violates a lifecycle invariant. Fatal to that
    /// process only; sweeps continue past it.
    #[error("corruption: {0}")]
    Corruption(String),

    /// The storage backend itself failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StorageError> for EngineError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(msg) => Self::NotFound(msg),
            // Transition conflicts are re-read and reported with fresh
            // stage and owner context at the coordinator's call sites; a
            // conflict or invariant trip reaching this blanket mapping
            // means the record itself no longer holds.
            StorageError::Conflict(msg) | StorageError::InvariantViolation(msg) => {
                Self::Corruption(msg)
            }
            StorageError::Serialization(msg) | StorageError::Backend(msg) => Self::Storage(msg),
        }
    }
}

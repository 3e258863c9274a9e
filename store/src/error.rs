use pocket_types::ProofState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("invalid proof state transition for {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: String,
        from: ProofState,
        to: ProofState,
    },

    #[error("storage backend error: {0}")]
    Backend(String),
}

use crate::types::DbId;

/// Domain-level error type shared across the workspace.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An entity was looked up by ID and not found.
    #[error("{entity} with id {id} not found")]
    NotFound {
        /// Human-readable entity name (e.g. `"model file"`).
        entity: &'static str,
        /// The ID that was looked up.
        id: DbId,
    },

    /// Input failed a validation rule.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

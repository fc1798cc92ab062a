//! Error types for the reconciliation core and its collaborators

use thiserror::Error;

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, ReconcileError>;

#[derive(Error, Debug)]
pub enum ReconcileError {

    // =============================
    // Collaborator Errors
    // =============================

    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Malformed collaborator response: {0}")]
    CollaboratorResponse(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    // =============================
    // Core Errors
    // =============================

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("A matching run is already in progress")]
    RunInProgress,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Base64 decode error: {0}")]
    DecodeError(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ReconcileError {
    /// Errors that the matching run absorbs into a degraded result
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            ReconcileError::CollaboratorUnavailable(_)
                | ReconcileError::CollaboratorResponse(_)
                | ReconcileError::LlmError(_)
                | ReconcileError::SerializationError(_)
                | ReconcileError::HttpError(_)
        )
    }
}

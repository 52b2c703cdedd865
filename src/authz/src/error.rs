//! Error types for the authorization engine

use thiserror::Error;

/// Authorization engine errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Role table source exceeds the configured capacity
    #[error("Role table capacity exceeded: {limit} entries allowed, {requested} supplied")]
    RoleCapacity { limit: usize, requested: usize },

    /// Role name appears more than once in the table source
    #[error("Duplicate role in table source: {0}")]
    DuplicateRole(String),

    /// Verification exchange failed (transport error, non-2xx status)
    #[error("Verification failed: {0}")]
    Verification(String),

    /// Verified token carried no usable claims
    #[error("Invalid claims: {0}")]
    InvalidClaims(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;

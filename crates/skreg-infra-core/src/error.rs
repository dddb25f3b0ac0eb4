//! Error types for skreg infrastructure declarations.

use thiserror::Error;

/// Errors raised while declaring resources or resolving their outputs.
///
/// The type is `Clone` because a single failure is observed by every
/// consumer of a shared deferred value.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("duplicate resource: {0}")]
    DuplicateResource(String),

    #[error("unknown resource: {0}")]
    UnknownResource(String),

    #[error("cycle detected in dependencies: {0}")]
    CycleDetected(String),

    #[error("missing output '{key}' on {urn}")]
    MissingOutput { urn: String, key: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("certificate generation failed: {0}")]
    Certificate(String),

    #[error("provisioning failed for {urn}: {message}")]
    Provisioning { urn: String, message: String },

    #[error("provider '{0}' not yet implemented")]
    NotImplemented(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

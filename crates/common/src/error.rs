//! Common error types shared across crates.

use thiserror::Error;

/// Errors produced while deriving keys, sealing/opening envelopes, or
/// expanding a dump.
///
/// None of these are recovered into degraded output: a dump that fails to
/// open is unusable, never re-interpreted as plaintext.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Key material was requested but no master key is configured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The container is malformed or carries an unsupported version/algorithm.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// The supplied content key is not valid base64 or not 32 bytes long.
    #[error("invalid content key")]
    InvalidKey,

    /// AEAD authentication failed. Deliberately carries no detail: a wrong key
    /// and a tampered ciphertext look the same to the caller.
    #[error("decryption failed")]
    DecryptionFailure,

    /// Decompression or JSON parsing failed after the payload was recovered.
    #[error("corrupt dump: {0}")]
    CorruptDump(String),
}

/// Top-level service error type.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::NotFound`] → 404
/// - [`ServiceError::Unauthorized`] → 401
/// - [`ServiceError::Forbidden`] → 403
/// - [`ServiceError::Configuration`] → 500
/// - [`ServiceError::Storage`] → 500
/// - [`ServiceError::Internal`] → 500
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request shape is not served under the current encryption policy.
    #[error("not found")]
    NotFound,

    /// The caller did not present credentials for a key request.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller is not entitled to this collection's content key.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The deployment is misconfigured (e.g. encryption enabled without a master key).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The storage backend failed for a reason other than absence.
    #[error("storage error: {0}")]
    Storage(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::NotFound => 404,
            ServiceError::Unauthorized(_) => 401,
            ServiceError::Forbidden(_) => 403,
            ServiceError::Configuration(_) => 500,
            ServiceError::Storage(_) => 500,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code used in [`crate::protocol::ErrorResponse`].
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound => "not_found",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::Configuration(_) => "configuration_error",
            ServiceError::Storage(_) => "storage_error",
            ServiceError::Internal(_) => "internal_error",
        }
    }
}

impl From<CodecError> for ServiceError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Configuration(msg) => ServiceError::Configuration(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

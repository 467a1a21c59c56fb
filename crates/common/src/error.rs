//! Error taxonomy shared by the encryption engine and its callers.

use thiserror::Error;

use crate::protocol::Record;

/// Errors produced by the field encryption engine.
///
/// Variants map to stable machine-readable codes so that monitoring can tell
/// "corrupt data" apart from "wrong tenant key used":
/// - [`FieldCryptError::Configuration`] → `configuration_error`
/// - [`FieldCryptError::InvalidArgument`] → `invalid_argument`
/// - [`FieldCryptError::MalformedEnvelope`] → `malformed_envelope`
/// - [`FieldCryptError::Decryption`] → `decryption_error`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldCryptError {
    /// The master secret is missing or malformed. The deployment must be fixed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The caller passed an unusable argument, such as an empty tenant id.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A token does not parse as three non-empty hex segments.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Authentication failed: the data was tampered with or belongs to another tenant.
    #[error("decryption failed: {0}")]
    Decryption(String),
}

impl FieldCryptError {
    /// Returns the stable code used in logs and metrics for this error.
    pub fn code(&self) -> &'static str {
        match self {
            FieldCryptError::Configuration(_) => "configuration_error",
            FieldCryptError::InvalidArgument(_) => "invalid_argument",
            FieldCryptError::MalformedEnvelope(_) => "malformed_envelope",
            FieldCryptError::Decryption(_) => "decryption_error",
        }
    }

    /// Returns `true` when the error is evidence about the stored data rather
    /// than about the deployment or the call site.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            FieldCryptError::MalformedEnvelope(_) | FieldCryptError::Decryption(_)
        )
    }
}

/// A batch decryption that stopped on one field.
///
/// `partial` is the returned copy with every field handled before `field`
/// already decrypted; `field` itself and anything after it keep their stored
/// values.
#[derive(Debug, Clone, Error)]
#[error("field `{field}`: {source}")]
pub struct FieldFailure {
    /// Name of the field whose decryption failed. Empty when the call was
    /// rejected before any field was read.
    pub field: String,
    /// The underlying engine error.
    #[source]
    pub source: FieldCryptError,
    /// The record copy as it stood when processing stopped.
    pub partial: Record,
}

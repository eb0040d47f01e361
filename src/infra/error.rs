//! Error types for image parsing and signature verification.
//! Every rejection is a distinct variant so callers can report why an image failed.

use thiserror::Error;

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Comprehensive error types for verification operations
#[derive(Error, Debug, miette::Diagnostic)]
pub enum VerifyError {
    #[error("Truncated input: {what} needs {needed} bytes, buffer has {actual}")]
    TruncatedInput {
        what: &'static str,
        needed: u64,
        actual: u64,
    },

    #[error("Out of bounds: {what} at offset {offset:#x} (+{len:#x}) exceeds buffer of {size:#x} bytes")]
    OutOfBounds {
        what: &'static str,
        offset: u64,
        len: u64,
        size: u64,
    },

    #[error("Integer overflow: {0}")]
    IntegerOverflow(String),

    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("Malformed section: {0}")]
    MalformedSection(String),

    #[error("Unknown public key (sha256 {0})")]
    #[diagnostic(help("add the key to the trusted keys of the configuration or pass --trusted-key"))]
    UnknownPublicKey(String),

    #[error("Signature mismatch: {0}")]
    SignatureMismatch(String),

    #[error("Allocation failure: {0}")]
    AllocationFailure(String),

    #[error("Cryptographic error: {0}")]
    CryptographicError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl VerifyError {
    /// Short, stable tag naming the failure class (used in reports and logs).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            VerifyError::TruncatedInput { .. } => "truncated-input",
            VerifyError::OutOfBounds { .. } => "out-of-bounds",
            VerifyError::IntegerOverflow(_) => "integer-overflow",
            VerifyError::MalformedHeader(_) => "malformed-header",
            VerifyError::MalformedSection(_) => "malformed-section",
            VerifyError::UnknownPublicKey(_) => "unknown-public-key",
            VerifyError::SignatureMismatch(_) => "signature-mismatch",
            VerifyError::AllocationFailure(_) => "allocation-failure",
            VerifyError::CryptographicError(_) => "cryptographic-error",
            VerifyError::IoError(_) => "io-error",
            VerifyError::ConfigurationError(_) => "configuration-error",
        }
    }
}

impl From<std::io::Error> for VerifyError {
    fn from(error: std::io::Error) -> Self {
        VerifyError::IoError(error.to_string())
    }
}

impl From<openssl::error::ErrorStack> for VerifyError {
    fn from(error: openssl::error::ErrorStack) -> Self {
        VerifyError::CryptographicError(error.to_string())
    }
}

impl From<std::collections::TryReserveError> for VerifyError {
    fn from(error: std::collections::TryReserveError) -> Self {
        VerifyError::AllocationFailure(error.to_string())
    }
}

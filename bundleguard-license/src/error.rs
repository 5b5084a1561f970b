//! Error types for the licensing module.

use thiserror::Error;

/// Licensing-specific errors.
///
/// Verification outcomes are not errors; see [`crate::Verdict`].
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Token text does not split into five non-empty fields.
    #[error("invalid license token format: {0}")]
    InvalidTokenFormat(String),

    /// Expiry text matches neither accepted layout.
    #[error("invalid expiry '{0}': expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS")]
    InvalidExpiry(String),

    /// Expiry field is not a hexadecimal Unix timestamp.
    #[error("invalid expiry encoding: {0}")]
    InvalidExpiryEncoding(String),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
